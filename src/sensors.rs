use crate::{error::SensorError, telemetry::PositionData};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionReading {
    /// m/s²
    pub accel: [f32; 3],
    /// deg/s
    pub gyro: [f32; 3],
    /// °C
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PressureReading {
    /// hPa
    pub pressure: f32,
    /// m
    pub altitude: f32,
}

pub trait MotionSensor {
    fn read_motion(&mut self) -> Result<MotionReading, SensorError>;
}

pub trait PressureSensor {
    fn read_pressure(&mut self) -> Result<PressureReading, SensorError>;
}

pub trait VoltageSensor {
    /// Volts at the battery, after the divider is accounted for.
    fn read_voltage(&mut self) -> Result<f32, SensorError>;
}

/// Satellite position. `None` means no fix yet.
pub trait PositionSource {
    fn position(&mut self) -> Option<PositionData>;
}

/// Stand-in for hardware that failed to come up. Every read fails, so the
/// record keeps its previous values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Absent;

impl MotionSensor for Absent {
    fn read_motion(&mut self) -> Result<MotionReading, SensorError> {
        Err(SensorError::NotDetected)
    }
}

impl PressureSensor for Absent {
    fn read_pressure(&mut self) -> Result<PressureReading, SensorError> {
        Err(SensorError::NotDetected)
    }
}

impl VoltageSensor for Absent {
    fn read_voltage(&mut self) -> Result<f32, SensorError> {
        Err(SensorError::NotDetected)
    }
}

impl PositionSource for Absent {
    fn position(&mut self) -> Option<PositionData> {
        None
    }
}

/// Everything the flight unit samples.
pub struct SensorSuite {
    pub motion: Box<dyn MotionSensor>,
    pub pressure: Box<dyn PressureSensor>,
    pub voltage: Box<dyn VoltageSensor>,
    pub position: Box<dyn PositionSource>,
}

/// International barometric formula.
pub fn barometric_altitude(pressure_hpa: f32, sea_level_hpa: f32) -> f32 {
    44330.0 * (1.0 - (pressure_hpa / sea_level_hpa).powf(0.1903))
}
