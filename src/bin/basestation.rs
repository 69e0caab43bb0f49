use std::{sync::mpsc, time::Duration};

const LOOP_YIELD: Duration = Duration::from_millis(10);

/// Prints every fresh record once.
fn report<R, C>(ground: &rocket_telemetry::ground_unit::GroundUnit<R, C>)
where
    R: rocket_telemetry::link::Radio,
    C: rocket_telemetry::clock::Clock,
{
    if let Some(record) = ground.fresh() {
        log::info!("{}", record);
    }
}

#[cfg(target_os = "espidf")]
fn read_input(uart_driver: &esp_idf_hal::uart::UartDriver) -> String {
    use esp_idf_hal::delay::NON_BLOCK;

    let mut result = String::new();

    loop {
        let mut buf = [0_u8; 1];
        let count = uart_driver.read(&mut buf, NON_BLOCK).unwrap_or(0);

        if count != 0 {
            match buf[0] {
                b'\n' | b'\r' => {
                    if !result.is_empty() {
                        return result;
                    }
                }
                byte => result.push(byte as char),
            }
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(target_os = "espidf")]
fn main() {
    use esp_idf_hal::{
        gpio::{Gpio0, Gpio1},
        peripherals::Peripherals,
        uart::{config::Config as UartConfig, UartDriver, UART0},
        units::Hertz,
    };
    use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
    use rocket_telemetry::{
        battery::Battery,
        clock::SystemClock,
        config::{Config, BAUD_RATE},
        espnow::{start_wifi, EspNowRadio},
        ground_unit::GroundUnit,
        sensors::VoltageSensor,
    };

    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    esp_idf_svc::log::EspLogger::initialize_default();

    let config = Config::default();
    let peripherals = Peripherals::take().expect("Failed to obtain peripherals");

    let uart_driver = UartDriver::new::<UART0>(
        peripherals.uart0,
        peripherals.pins.gpio1,
        peripherals.pins.gpio3,
        Option::<Gpio0>::None,
        Option::<Gpio1>::None,
        &UartConfig::default().baudrate(Hertz(BAUD_RATE)),
    )
    .expect("Failed to obtain console UART");

    let (sender, receiver) = mpsc::channel();
    std::thread::spawn(move || loop {
        let line = read_input(&uart_driver);
        if sender.send(line).is_err() {
            break;
        }
    });

    let voltage: Option<Box<dyn VoltageSensor>> =
        match Battery::new(peripherals.adc1, peripherals.pins.gpio35, config.power) {
            Ok(battery) => Some(Box::new(battery)),
            Err(e) => {
                log::error!("battery ADC: {}", e);
                None
            }
        };

    let sys_loop = EspSystemEventLoop::take().expect("Failed to take system event loop");
    let nvs = EspDefaultNvsPartition::take().expect("Failed to take NVS partition");
    let _wifi = start_wifi(peripherals.modem, sys_loop, nvs, config.link.channel)
        .expect("Failed to start wifi");

    let mut ground = GroundUnit::new(&config, SystemClock::new(), EspNowRadio::new(), voltage)
        .expect("Failed to start ESP-NOW");

    log::info!("type launch, arrival, abort, reset, noop or status");

    loop {
        if let Ok(line) = receiver.try_recv() {
            ground.handle_console_line(&line);
        }
        ground.tick();
        report(&ground);
        std::thread::sleep(LOOP_YIELD);
    }
}

/// Operator console on stdin, flying a simulated rocket in-process.
#[cfg(not(target_os = "espidf"))]
fn main() {
    use std::io::BufRead;

    use rocket_telemetry::{
        clock::SystemClock,
        config::Config,
        flight_unit::FlightUnit,
        ground_unit::GroundUnit,
        sim::{FlightProfile, LoopbackRadio, MemoryFlightLog, SimulatedSensors},
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::default().with_env_overrides();
    let clock = SystemClock::new();
    let (rocket_radio, ground_radio) = LoopbackRadio::pair();

    let mut rocket = FlightUnit::new(
        &config,
        clock,
        SimulatedSensors::new(clock, FlightProfile::default()).suite(),
        rocket_radio,
        MemoryFlightLog::new(),
    )
    .expect("loopback radio always starts");
    let mut ground =
        GroundUnit::new(&config, clock, ground_radio, None).expect("loopback radio always starts");

    let (sender, receiver) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });

    log::info!("type launch, arrival, abort, reset, noop or status; ctrl-d quits");

    loop {
        match receiver.try_recv() {
            Ok(line) => {
                ground.handle_console_line(&line);
            }
            Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }

        rocket.link().radio().deliver();
        rocket.tick();

        ground.link().radio().deliver();
        ground.tick();
        report(&ground);

        std::thread::sleep(LOOP_YIELD);
    }

    log::info!("rocket finished in {:?}", rocket.state());
}
