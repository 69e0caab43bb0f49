use rocket_telemetry::{
    clock::{Clock, ManualClock},
    command::{CommandKind, CommandRecord},
    config::Config,
    flight::FlightState,
    flight_unit::FlightUnit,
    ground_unit::GroundUnit,
    sim::{FlightProfile, LoopbackRadio, MemoryFlightLog, SimulatedSensors, GROUND_UNIT_MAC},
    wire::ByteSerialize,
};

type Rocket = FlightUnit<LoopbackRadio, MemoryFlightLog, ManualClock>;
type Base = GroundUnit<LoopbackRadio, ManualClock>;

struct Range {
    clock: ManualClock,
    rocket: Rocket,
    ground: Base,
    log: MemoryFlightLog,
}

impl Range {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let clock = ManualClock::new(0);
        let config = Config::default();
        let (rocket_radio, ground_radio) = LoopbackRadio::pair();
        let log = MemoryFlightLog::new();

        let rocket = FlightUnit::new(
            &config,
            clock.clone(),
            SimulatedSensors::new(clock.clone(), FlightProfile::default()).suite(),
            rocket_radio,
            log.clone(),
        )
        .unwrap();
        let ground = GroundUnit::new(&config, clock.clone(), ground_radio, None).unwrap();

        Range {
            clock,
            rocket,
            ground,
            log,
        }
    }

    /// Runs both units in 10 ms steps up to `end_ms`.
    fn run_until(&mut self, end_ms: u32) {
        while self.clock.now_ms() < end_ms {
            self.clock.advance(10);
            self.step();
        }
    }

    fn step(&mut self) {
        self.rocket.link().radio().deliver();
        self.rocket.tick();
        self.ground.link().radio().deliver();
        self.ground.tick();
    }
}

#[test]
fn flight_from_launch_to_arrival() {
    let mut range = Range::new();

    range.clock.set(1_000);
    range.ground.send_command(CommandKind::StartFlight).unwrap();
    range.step();
    assert_eq!(range.rocket.state(), FlightState::FlightActive);
    assert_eq!(range.log.sessions_started(), 1);

    // an end-flight with a broken checksum is dropped on arrival
    let mut corrupt = CommandRecord::new(CommandKind::EndFlight, 1_500, 77);
    corrupt.checksum ^= 0xFF;
    range
        .rocket
        .link()
        .radio()
        .inject(GROUND_UNIT_MAC, &corrupt.as_bytes());
    range.run_until(3_000);
    assert_eq!(range.rocket.state(), FlightState::FlightActive);
    assert!(range.log.sessions_ended().is_empty());

    range.clock.set(6_000);
    range.ground.send_command(CommandKind::EndFlight).unwrap();
    range.step();

    assert_eq!(range.rocket.state(), FlightState::PostFlight);
    assert_eq!(range.log.sessions_ended(), vec![5.0]);
    assert!(range.log.records_appended() > 0);
    // the tick that ends the flight samples before it reads commands
    assert_eq!(
        range.log.last_record().map(|record| record.timestamp),
        Some(6_000.0)
    );
}

#[test]
fn ground_sees_rocket_telemetry() {
    let mut range = Range::new();
    range.run_until(3_000);

    let record = range.ground.snapshot();
    assert_eq!(record, range.rocket.latest().snapshot());
    assert!(record.pressure.altitude > 0.0, "{}", record.pressure.altitude);
    assert!(record.power.voltage_rocket > 3.0);
    assert_eq!(range.ground.inbox().stats().malformed(), 0);
    assert_eq!(range.ground.inbox().stats().accepted(), 6);
}

#[test]
fn repeated_commands_are_idempotent() {
    let mut range = Range::new();

    range.clock.set(500);
    range.ground.send_command(CommandKind::StartFlight).unwrap();
    range.ground.send_command(CommandKind::StartFlight).unwrap();
    range.step();

    range.clock.set(2_500);
    range.ground.send_command(CommandKind::EndFlight).unwrap();
    range.ground.send_command(CommandKind::EndFlight).unwrap();
    range.step();

    range.clock.set(3_000);
    range.ground.send_command(CommandKind::StartFlight).unwrap();
    range.step();

    assert_eq!(range.rocket.state(), FlightState::PostFlight);
    assert_eq!(range.log.sessions_started(), 1);
    assert_eq!(range.log.sessions_ended(), vec![2.0]);
}

#[test]
fn link_recovers_after_radio_reset() {
    let mut range = Range::new();
    range.run_until(1_000);
    let sent = range.rocket.link().stats().sent;

    range.rocket.link_mut().radio_mut().drop_initialization();
    range.run_until(2_000);

    let stats = range.rocket.link().stats();
    assert_eq!(stats.reinitializations, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.sent, sent + 1);
}
