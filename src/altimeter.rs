//! BMP280 barometric altimeter.

use embedded_hal::i2c::I2c;

use crate::{
    config::AltimeterConfig,
    error::SensorError,
    sensors::{barometric_altitude, PressureReading, PressureSensor},
};

pub const BMP280_PRIMARY_ADDRESS: u8 = 0x76;
pub const BMP280_SECONDARY_ADDRESS: u8 = 0x77;
pub const BMP280_CHIP_ID: u8 = 0x58;

const REG_CALIBRATION: u8 = 0x88;
const REG_CHIP_ID: u8 = 0xD0;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_PRESS_MSB: u8 = 0xF7;

/// Temperature x2, pressure x16, normal mode.
const CTRL_MEAS: u8 = (0b010 << 5) | (0b101 << 2) | 0b11;
/// 500 ms standby, IIR filter x16.
const CONFIG: u8 = (0b100 << 5) | (0b100 << 2);

/// Reported by the data registers before the first conversion completes.
const ADC_SKIPPED: i32 = 0x80000;

/// Factory trimming parameters, `dig_T1..dig_P9` in the datasheet.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Calibration {
    t1: u16,
    t2: i16,
    t3: i16,
    p1: u16,
    p: [i16; 8],
}

impl Calibration {
    fn from_registers(raw: &[u8; 24]) -> Self {
        let word = |i: usize| u16::from_le_bytes([raw[i * 2], raw[i * 2 + 1]]);
        let mut p = [0i16; 8];
        for (n, coefficient) in p.iter_mut().enumerate() {
            *coefficient = word(4 + n) as i16;
        }

        Calibration {
            t1: word(0),
            t2: word(1) as i16,
            t3: word(2) as i16,
            p1: word(3),
            p,
        }
    }

    /// Returns `t_fine` and the temperature in °C.
    fn compensate_temperature(&self, adc_t: i32) -> (i32, f32) {
        let t1 = self.t1 as i32;
        let var1 = (((adc_t >> 3) - (t1 << 1)) * self.t2 as i32) >> 11;
        let var2 = (((((adc_t >> 4) - t1) * ((adc_t >> 4) - t1)) >> 12) * self.t3 as i32) >> 14;
        let t_fine = var1 + var2;

        (t_fine, ((t_fine * 5 + 128) >> 8) as f32 / 100.0)
    }

    /// Pressure in Pa, 64 bit integer path.
    fn compensate_pressure(&self, adc_p: i32, t_fine: i32) -> Option<f32> {
        let [p2, p3, p4, p5, p6, p7, p8, p9] = self.p.map(i64::from);

        let mut var1 = t_fine as i64 - 128000;
        let mut var2 = var1 * var1 * p6;
        var2 += (var1 * p5) << 17;
        var2 += p4 << 35;
        var1 = ((var1 * var1 * p3) >> 8) + ((var1 * p2) << 12);
        var1 = (((1i64 << 47) + var1) * self.p1 as i64) >> 33;
        if var1 == 0 {
            return None;
        }

        let mut p = 1_048_576 - adc_p as i64;
        p = (((p << 31) - var2) * 3125) / var1;
        var1 = (p9 * (p >> 13) * (p >> 13)) >> 25;
        var2 = (p8 * p) >> 19;
        p = ((p + var1 + var2) >> 8) + (p7 << 4);

        Some(p as f32 / 256.0)
    }
}

pub struct Altimeter<I2C> {
    i2c: I2C,
    address: u8,
    calibration: Calibration,
    sea_level_pressure: f32,
}

impl<I2C: I2c> Altimeter<I2C> {
    /// Probes 0x76 then 0x77, loads the calibration and starts continuous
    /// conversion.
    pub fn new(mut i2c: I2C, config: AltimeterConfig) -> Result<Self, SensorError> {
        let address = [BMP280_PRIMARY_ADDRESS, BMP280_SECONDARY_ADDRESS]
            .into_iter()
            .find(|address| probe(&mut i2c, *address))
            .ok_or(SensorError::NotDetected)?;

        let mut raw = [0u8; 24];
        i2c.write_read(address, &[REG_CALIBRATION], &mut raw)
            .map_err(|_| SensorError::Bus)?;
        i2c.write(address, &[REG_CONFIG, CONFIG])
            .map_err(|_| SensorError::Bus)?;
        i2c.write(address, &[REG_CTRL_MEAS, CTRL_MEAS])
            .map_err(|_| SensorError::Bus)?;

        log::info!("BMP280 found at {:#04x}", address);

        Ok(Altimeter {
            i2c,
            address,
            calibration: Calibration::from_registers(&raw),
            sea_level_pressure: config.sea_level_hpa,
        })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Temperature in °C and the compensated pressure reading.
    pub fn measure(&mut self) -> Result<(f32, PressureReading), SensorError> {
        let mut data = [0u8; 6];
        self.i2c
            .write_read(self.address, &[REG_PRESS_MSB], &mut data)
            .map_err(|_| SensorError::Bus)?;

        let adc_p = raw20(data[0], data[1], data[2]);
        let adc_t = raw20(data[3], data[4], data[5]);
        if adc_p == ADC_SKIPPED || adc_t == ADC_SKIPPED {
            return Err(SensorError::Timeout);
        }

        let (t_fine, temperature) = self.calibration.compensate_temperature(adc_t);
        let pressure = self
            .calibration
            .compensate_pressure(adc_p, t_fine)
            .ok_or(SensorError::Bus)?
            / 100.0;

        let reading = PressureReading {
            pressure,
            altitude: barometric_altitude(pressure, self.sea_level_pressure),
        };
        Ok((temperature, reading))
    }
}

impl<I2C: I2c> PressureSensor for Altimeter<I2C> {
    fn read_pressure(&mut self) -> Result<PressureReading, SensorError> {
        self.measure().map(|(_, reading)| reading)
    }
}

fn probe<I2C: I2c>(i2c: &mut I2C, address: u8) -> bool {
    let mut id = [0u8];
    matches!(
        i2c.write_read(address, &[REG_CHIP_ID], &mut id),
        Ok(()) if id[0] == BMP280_CHIP_ID
    )
}

fn raw20(msb: u8, lsb: u8, xlsb: u8) -> i32 {
    ((msb as i32) << 12) | ((lsb as i32) << 4) | ((xlsb as i32) >> 4)
}
