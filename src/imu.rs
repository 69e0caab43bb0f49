//! MPU6050 accelerometer and gyroscope.

use embedded_hal::i2c::I2c;

use crate::{
    error::SensorError,
    sensors::{MotionReading, MotionSensor},
};

pub const MPU6050_ADDRESS: u8 = 0x68;
const WHO_AM_I_VALUE: u8 = 0x68;

const REG_CONFIG: u8 = 0x1A;
const REG_GYRO_CONFIG: u8 = 0x1B;
const REG_ACCEL_CONFIG: u8 = 0x1C;
const REG_ACCEL_XOUT_H: u8 = 0x3B;
const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_WHO_AM_I: u8 = 0x75;

/// Wake up, clock from the X gyro PLL.
const PWR_CLOCK_PLL_X: u8 = 0x01;
/// DLPF_CFG 4: 21 Hz accel, 20 Hz gyro.
const DLPF_21_HZ: u8 = 0x04;
/// FS_SEL 1: ±500 °/s.
const GYRO_RANGE_500: u8 = 0x08;
/// AFS_SEL 2: ±8 g.
const ACCEL_RANGE_8G: u8 = 0x10;

const ACCEL_LSB_PER_G: f32 = 4096.0;
const GYRO_LSB_PER_DPS: f32 = 65.5;
const STANDARD_GRAVITY: f32 = 9.80665;

pub struct Imu<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> Imu<I2C> {
    pub fn new(mut i2c: I2C) -> Result<Self, SensorError> {
        let mut id = [0u8];
        match i2c.write_read(MPU6050_ADDRESS, &[REG_WHO_AM_I], &mut id) {
            Ok(()) if id[0] == WHO_AM_I_VALUE => {}
            _ => return Err(SensorError::NotDetected),
        }

        for (register, value) in [
            (REG_PWR_MGMT_1, PWR_CLOCK_PLL_X),
            (REG_ACCEL_CONFIG, ACCEL_RANGE_8G),
            (REG_GYRO_CONFIG, GYRO_RANGE_500),
            (REG_CONFIG, DLPF_21_HZ),
        ] {
            i2c.write(MPU6050_ADDRESS, &[register, value])
                .map_err(|_| SensorError::Bus)?;
        }

        log::info!("MPU6050 ready");
        Ok(Imu { i2c })
    }
}

impl<I2C: I2c> MotionSensor for Imu<I2C> {
    fn read_motion(&mut self) -> Result<MotionReading, SensorError> {
        let mut data = [0u8; 14];
        self.i2c
            .write_read(MPU6050_ADDRESS, &[REG_ACCEL_XOUT_H], &mut data)
            .map_err(|_| SensorError::Bus)?;

        let word = |i: usize| i16::from_be_bytes([data[i * 2], data[i * 2 + 1]]) as f32;

        Ok(MotionReading {
            accel: [0, 1, 2].map(|i| word(i) / ACCEL_LSB_PER_G * STANDARD_GRAVITY),
            gyro: [4, 5, 6].map(|i| word(i) / GYRO_LSB_PER_DPS),
            temperature: word(3) / 340.0 + 36.53,
        })
    }
}
