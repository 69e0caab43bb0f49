use std::fmt::Display;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::wire::{get_f32s, put_f32s, ByteSerialize};

/// Accelerometer, gyroscope and fused orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionData {
    /// m/s²
    pub acc_x: f32,
    pub acc_y: f32,
    pub acc_z: f32,
    /// deg/s
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
    /// °C
    pub temperature: f32,
    /// Fused orientation in degrees.
    pub pitch: f32,
    pub roll: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PressureData {
    /// hPa
    pub pressure: f32,
    /// Barometric altitude in meters.
    pub altitude: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerData {
    pub voltage_base: f32,
    pub voltage_rocket: f32,
}

/// GPS position with a UTC date and time. All zeros when there is no fix.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionData {
    pub latitude: f32,
    pub longitude: f32,
    pub altitude: f32,
    pub day: i32,
    pub month: i32,
    pub year: i32,
    pub hour: i32,
    pub minute: i32,
    pub second: i32,
}

/// The sensor snapshot broadcast from the flight unit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryRecord {
    pub motion: MotionData,
    pub pressure: PressureData,
    pub power: PowerData,
    pub position: PositionData,
    /// Device milliseconds at sampling time.
    pub timestamp: f32,
}

pub const TELEMETRY_RECORD_SIZE: usize = <TelemetryRecord as ByteSerialize>::SIZE;

impl ByteSerialize for MotionData {
    const SIZE: usize = 9 * 4;

    fn write_to(&self, buf: &mut BytesMut) {
        put_f32s(
            buf,
            &[
                self.acc_x,
                self.acc_y,
                self.acc_z,
                self.gyro_x,
                self.gyro_y,
                self.gyro_z,
                self.temperature,
                self.pitch,
                self.roll,
            ],
        );
    }

    fn read_from(buf: &mut Bytes) -> Self {
        let [acc_x, acc_y, acc_z, gyro_x, gyro_y, gyro_z, temperature, pitch, roll] =
            get_f32s::<9>(buf);
        MotionData {
            acc_x,
            acc_y,
            acc_z,
            gyro_x,
            gyro_y,
            gyro_z,
            temperature,
            pitch,
            roll,
        }
    }
}

impl ByteSerialize for PressureData {
    const SIZE: usize = 2 * 4;

    fn write_to(&self, buf: &mut BytesMut) {
        put_f32s(buf, &[self.pressure, self.altitude]);
    }

    fn read_from(buf: &mut Bytes) -> Self {
        let [pressure, altitude] = get_f32s::<2>(buf);
        PressureData { pressure, altitude }
    }
}

impl ByteSerialize for PowerData {
    const SIZE: usize = 2 * 4;

    fn write_to(&self, buf: &mut BytesMut) {
        put_f32s(buf, &[self.voltage_base, self.voltage_rocket]);
    }

    fn read_from(buf: &mut Bytes) -> Self {
        let [voltage_base, voltage_rocket] = get_f32s::<2>(buf);
        PowerData {
            voltage_base,
            voltage_rocket,
        }
    }
}

impl ByteSerialize for PositionData {
    const SIZE: usize = 3 * 4 + 6 * 4;

    fn write_to(&self, buf: &mut BytesMut) {
        put_f32s(buf, &[self.latitude, self.longitude, self.altitude]);
        for field in [
            self.day,
            self.month,
            self.year,
            self.hour,
            self.minute,
            self.second,
        ] {
            buf.put_i32_le(field);
        }
    }

    fn read_from(buf: &mut Bytes) -> Self {
        let [latitude, longitude, altitude] = get_f32s::<3>(buf);
        PositionData {
            latitude,
            longitude,
            altitude,
            day: buf.get_i32_le(),
            month: buf.get_i32_le(),
            year: buf.get_i32_le(),
            hour: buf.get_i32_le(),
            minute: buf.get_i32_le(),
            second: buf.get_i32_le(),
        }
    }
}

impl ByteSerialize for TelemetryRecord {
    const SIZE: usize = MotionData::SIZE
        + PressureData::SIZE
        + PowerData::SIZE
        + PositionData::SIZE
        + 4;

    fn write_to(&self, buf: &mut BytesMut) {
        self.motion.write_to(buf);
        self.pressure.write_to(buf);
        self.power.write_to(buf);
        self.position.write_to(buf);
        buf.put_f32_le(self.timestamp);
    }

    fn read_from(buf: &mut Bytes) -> Self {
        TelemetryRecord {
            motion: MotionData::read_from(buf),
            pressure: PressureData::read_from(buf),
            power: PowerData::read_from(buf),
            position: PositionData::read_from(buf),
            timestamp: buf.get_f32_le(),
        }
    }
}

impl Display for TelemetryRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = &self.motion;
        write!(
            f,
            "acc=({:.2}, {:.2}, {:.2}) m/s² gyro=({:.2}, {:.2}, {:.2}) deg/s \
             pitch={:.2}° roll={:.2}° temp={:.2}°C \
             pressure={:.2}hPa altitude={:.2}m t={}ms",
            m.acc_x,
            m.acc_y,
            m.acc_z,
            m.gyro_x,
            m.gyro_y,
            m.gyro_z,
            m.pitch,
            m.roll,
            m.temperature,
            self.pressure.pressure,
            self.pressure.altitude,
            self.timestamp as u32
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    fn sample_record() -> TelemetryRecord {
        TelemetryRecord {
            motion: MotionData {
                acc_x: 0.12,
                acc_y: -9.81,
                acc_z: 1.5,
                gyro_x: 12.5,
                gyro_y: -3.25,
                gyro_z: 0.001,
                temperature: 24.7,
                pitch: 45.0,
                roll: -17.3,
            },
            pressure: PressureData {
                pressure: 1009.42,
                altitude: 32.1,
            },
            power: PowerData {
                voltage_base: 4.02,
                voltage_rocket: 3.71,
            },
            position: PositionData {
                latitude: -15.7939,
                longitude: -47.8828,
                altitude: 1172.0,
                day: 14,
                month: 7,
                year: 2025,
                hour: 13,
                minute: 5,
                second: 59,
            },
            timestamp: 123_456.0,
        }
    }

    #[test]
    fn record_size_is_fixed() {
        assert_eq!(TELEMETRY_RECORD_SIZE, 92);
        assert_eq!(sample_record().as_bytes().len(), TELEMETRY_RECORD_SIZE);
        assert_eq!(
            TelemetryRecord::default().as_bytes().len(),
            TELEMETRY_RECORD_SIZE
        );
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let record = sample_record();
        let decoded = TelemetryRecord::from_bytes(&record.as_bytes()).unwrap();

        assert_eq!(decoded, record);
        assert_eq!(decoded.motion.gyro_z.to_bits(), record.motion.gyro_z.to_bits());
        assert_eq!(decoded.timestamp.to_bits(), record.timestamp.to_bits());
        assert_eq!(decoded.position.year, 2025);
    }

    #[test]
    fn negative_zero_survives() {
        let mut record = TelemetryRecord::default();
        record.motion.roll = -0.0;
        let decoded = TelemetryRecord::from_bytes(&record.as_bytes()).unwrap();
        assert_eq!(decoded.motion.roll.to_bits(), (-0.0f32).to_bits());
    }

    #[test]
    fn fields_sit_at_documented_offsets() {
        let bytes = sample_record().as_bytes();
        let f32_at = |offset: usize| {
            f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
        };
        let i32_at = |offset: usize| {
            i32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
        };

        assert_eq!(f32_at(0), 0.12);
        assert_eq!(f32_at(28), 45.0);
        assert_eq!(f32_at(36), 1009.42);
        assert_eq!(f32_at(48), 3.71);
        assert_eq!(f32_at(52), -15.7939);
        assert_eq!(i32_at(64), 14);
        assert_eq!(i32_at(72), 2025);
        assert_eq!(i32_at(84), 59);
        assert_eq!(f32_at(88), 123_456.0);
    }

    #[test]
    fn rejects_wrong_lengths() {
        let bytes = sample_record().as_bytes();
        let mut longer = bytes.to_vec();
        longer.push(0);

        for buffer in [&[][..], &bytes[..bytes.len() - 1], &longer[..]] {
            assert_eq!(
                TelemetryRecord::from_bytes(buffer),
                Err(DecodeError::SizeMismatch {
                    expected: TELEMETRY_RECORD_SIZE,
                    actual: buffer.len(),
                })
            );
        }
    }
}
