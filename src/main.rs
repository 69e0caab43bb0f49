use std::time::Duration;

/// Lets the idle task run between loop iterations.
const LOOP_YIELD: Duration = Duration::from_millis(10);

#[cfg(target_os = "espidf")]
fn main() {
    use std::sync::Mutex;

    use embedded_hal_bus::i2c::MutexDevice;
    use esp_idf_hal::{
        gpio::{Gpio0, Gpio1},
        i2c::{I2cConfig, I2cDriver},
        peripherals::Peripherals,
        prelude::*,
        uart::{config::Config as UartConfig, UartDriver, UART2},
    };
    use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
    use rocket_telemetry::{
        altimeter::Altimeter,
        battery::Battery,
        clock::SystemClock,
        config::{Config, LOG_DIRECTORY},
        espnow::{start_wifi, EspNowRadio},
        flight_unit::FlightUnit,
        gps::Gps,
        imu::Imu,
        sensors::{Absent, MotionSensor, PressureSensor, SensorSuite, VoltageSensor},
        storage::CsvFlightLog,
    };

    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();
    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("Num cpus: {}", num_cpus::get());

    let config = Config::default();
    let peripherals = Peripherals::take().expect("Failed to obtain peripherals");

    // IMU and altimeter share the bus
    let i2c_config = I2cConfig::new().baudrate(400.kHz().into());
    let i2c_driver = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        &i2c_config,
    )
    .expect("Failed to obtain I2C Driver");
    let i2c_bus: &'static Mutex<I2cDriver<'static>> = Box::leak(Box::new(Mutex::new(i2c_driver)));

    let motion: Box<dyn MotionSensor> = match Imu::new(MutexDevice::new(i2c_bus)) {
        Ok(imu) => Box::new(imu),
        Err(e) => {
            log::error!("MPU6050: {}", e);
            Box::new(Absent)
        }
    };

    let pressure: Box<dyn PressureSensor> =
        match Altimeter::new(MutexDevice::new(i2c_bus), config.altimeter) {
            Ok(altimeter) => Box::new(altimeter),
            Err(e) => {
                log::error!("BMP280: {}", e);
                Box::new(Absent)
            }
        };

    let voltage: Box<dyn VoltageSensor> =
        match Battery::new(peripherals.adc1, peripherals.pins.gpio35, config.power) {
            Ok(battery) => Box::new(battery),
            Err(e) => {
                log::error!("battery ADC: {}", e);
                Box::new(Absent)
            }
        };

    let gps_uart = UartDriver::new::<UART2>(
        peripherals.uart2,
        peripherals.pins.gpio17,
        peripherals.pins.gpio16,
        Option::<Gpio0>::None,
        Option::<Gpio1>::None,
        &UartConfig::default().baudrate(Hertz(9600)),
    )
    .expect("Failed to obtain GPS UART");

    let sensors = SensorSuite {
        motion,
        pressure,
        voltage,
        position: Box::new(Gps::new(gps_uart)),
    };

    let sys_loop = EspSystemEventLoop::take().expect("Failed to take system event loop");
    let nvs = EspDefaultNvsPartition::take().expect("Failed to take NVS partition");
    let _wifi = start_wifi(peripherals.modem, sys_loop, nvs, config.link.channel)
        .expect("Failed to start wifi");

    // TODO: mount the SD card (SPI, CS on gpio5) at LOG_DIRECTORY; until then
    // start-flight leaves the unit in PreFlight.
    let mut unit = FlightUnit::new(
        &config,
        SystemClock::new(),
        sensors,
        EspNowRadio::new(),
        CsvFlightLog::new(LOG_DIRECTORY),
    )
    .expect("Failed to start ESP-NOW");

    loop {
        unit.tick();
        std::thread::sleep(LOOP_YIELD);
    }
}

/// Scripted flight against the simulated sensors, with the ground unit
/// in-process on the other end of a loopback radio.
#[cfg(not(target_os = "espidf"))]
fn main() {
    use rocket_telemetry::{
        clock::{Clock, SystemClock},
        command::CommandKind,
        config::{env_u32, Config},
        flight_unit::FlightUnit,
        ground_unit::GroundUnit,
        sim::{FlightProfile, LoopbackRadio, SimulatedSensors},
        storage::CsvFlightLog,
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Num cpus: {}", num_cpus::get());

    let config = Config::default().with_env_overrides();
    let run_ms = env_u32("ROCKET_SIM_SECONDS").unwrap_or(10).max(3).saturating_mul(1000);

    let clock = SystemClock::new();
    let (rocket_radio, ground_radio) = LoopbackRadio::pair();
    let sensors = SimulatedSensors::new(clock, FlightProfile::default()).suite();

    let mut unit = FlightUnit::new(
        &config,
        clock,
        sensors,
        rocket_radio,
        CsvFlightLog::new(std::env::temp_dir()),
    )
    .expect("loopback radio always starts");
    let mut ground =
        GroundUnit::new(&config, clock, ground_radio, None).expect("loopback radio always starts");

    let mut launched = false;
    let mut landed = false;

    while clock.now_ms() < run_ms {
        let now_ms = clock.now_ms();
        if !launched && now_ms >= 1_000 {
            launched = ground.send_command(CommandKind::StartFlight).is_ok();
        }
        if !landed && now_ms >= run_ms - 1_000 {
            landed = ground.send_command(CommandKind::EndFlight).is_ok();
        }

        unit.link().radio().deliver();
        unit.tick();

        ground.link().radio().deliver();
        ground.tick();
        if let Some(record) = ground.fresh() {
            log::info!("ground: {}", record);
        }

        std::thread::sleep(LOOP_YIELD);
    }

    log::info!(
        "finished in {:?}, link {:?}, logs in {}",
        unit.state(),
        unit.link().stats(),
        unit.machine().log().directory().display()
    );
}
