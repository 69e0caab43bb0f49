pub mod altimeter;
pub mod battery;
pub mod checksum;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
#[cfg(target_os = "espidf")]
pub mod espnow;
pub mod flight;
pub mod flight_unit;
pub mod fusion;
pub mod gps;
pub mod ground_unit;
pub mod imu;
pub mod link;
pub mod scheduler;
pub mod sensors;
pub mod shared;
pub mod sim;
pub mod storage;
pub mod telemetry;
pub mod wire;
