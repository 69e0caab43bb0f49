use std::sync::Arc;

use crate::{
    checksum::SequenceCounter,
    clock::Clock,
    command::{CommandKind, CommandRecord},
    config::{format_mac, Config},
    error::TransportError,
    link::{Link, Radio, TelemetryInbox},
    scheduler::Cadence,
    sensors::VoltageSensor,
    telemetry::TelemetryRecord,
    wire::ByteSerialize,
};

/// A line typed on the operator console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Send(CommandKind),
    Status,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let command = match line.trim().to_ascii_lowercase().as_str() {
            "launch" => ConsoleCommand::Send(CommandKind::StartFlight),
            "arrival" => ConsoleCommand::Send(CommandKind::EndFlight),
            "abort" => ConsoleCommand::Send(CommandKind::AbortMission),
            "reset" => ConsoleCommand::Send(CommandKind::ResetSystem),
            "noop" => ConsoleCommand::Send(CommandKind::NoOp),
            "status" => ConsoleCommand::Status,
            _ => return None,
        };
        Some(command)
    }
}

pub struct GroundUnit<R: Radio, C: Clock> {
    clock: C,
    link: Link<R>,
    inbox: Arc<TelemetryInbox>,
    sequence: SequenceCounter,
    voltage: Option<Box<dyn VoltageSensor>>,
    voltage_cadence: Cadence,
    base_voltage: f32,
}

impl<R: Radio, C: Clock> GroundUnit<R, C> {
    pub fn new(
        config: &Config,
        clock: C,
        radio: R,
        voltage: Option<Box<dyn VoltageSensor>>,
    ) -> Result<Self, TransportError> {
        let inbox = Arc::new(TelemetryInbox::new());
        let link = Link::start(radio, config.link.into(), inbox.clone())?;
        let start_ms = clock.now_ms();

        Ok(GroundUnit {
            clock,
            link,
            inbox,
            sequence: SequenceCounter::new(),
            voltage,
            voltage_cadence: Cadence::new(config.rates.sample_interval_ms, start_ms),
            base_voltage: 0.0,
        })
    }

    pub fn link(&self) -> &Link<R> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut Link<R> {
        &mut self.link
    }

    pub fn inbox(&self) -> &TelemetryInbox {
        &self.inbox
    }

    pub fn base_voltage(&self) -> f32 {
        self.base_voltage
    }

    /// Samples the local battery when its cadence is due.
    pub fn tick(&mut self) {
        let now_ms = self.clock.now_ms();
        if !self.voltage_cadence.ready(now_ms) {
            return;
        }

        if let Some(sensor) = self.voltage.as_mut() {
            match sensor.read_voltage() {
                Ok(volts) => self.base_voltage = volts,
                Err(e) => log::warn!("base battery read failed: {}", e),
            }
        }
    }

    /// Stamps, checksums and sends one command.
    pub fn send_command(&mut self, kind: CommandKind) -> Result<CommandRecord, TransportError> {
        let command = self.sequence.command(kind, self.clock.now_ms());
        self.link.send(&command.as_bytes())?;

        log::info!("sent {} #{}", kind.name(), command.sequence);
        Ok(command)
    }

    /// Latest received record with the base voltage filled in.
    pub fn snapshot(&self) -> TelemetryRecord {
        self.overlay(self.inbox.latest().snapshot())
    }

    /// Like `snapshot`, but only once per received record.
    pub fn fresh(&self) -> Option<TelemetryRecord> {
        self.inbox.latest().take_fresh().map(|record| self.overlay(record))
    }

    fn overlay(&self, mut record: TelemetryRecord) -> TelemetryRecord {
        record.power.voltage_base = self.base_voltage;
        record
    }

    /// Acts on one operator line. Unknown input is logged and ignored.
    pub fn handle_console_line(&mut self, line: &str) -> Option<ConsoleCommand> {
        let Some(command) = ConsoleCommand::parse(line) else {
            if !line.trim().is_empty() {
                log::warn!(
                    "unknown command {:?}, expected launch, arrival, abort, reset, noop or status",
                    line.trim()
                );
            }
            return None;
        };

        match command {
            ConsoleCommand::Send(kind) => {
                if let Err(e) = self.send_command(kind) {
                    log::error!("{} not sent: {}", kind.name(), e);
                }
            }
            ConsoleCommand::Status => {
                let record = self.snapshot();
                log::info!("{}", record);
                log::info!(
                    "battery rocket={:.2}V base={:.2}V gps=({:.6}, {:.6}) {:.1}m",
                    record.power.voltage_rocket,
                    record.power.voltage_base,
                    record.position.latitude,
                    record.position.longitude,
                    record.position.altitude
                );
                let peer = self.link.peer();
                log::info!(
                    "peer {} channel {} {:?}",
                    format_mac(&peer.address),
                    peer.channel,
                    self.link.stats()
                );
            }
        }
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        checksum,
        clock::ManualClock,
        error::SensorError,
        sim::{LoopbackRadio, FLIGHT_UNIT_MAC},
    };

    struct FixedVoltage(f32);

    impl VoltageSensor for FixedVoltage {
        fn read_voltage(&mut self) -> Result<f32, SensorError> {
            Ok(self.0)
        }
    }

    fn ground(
        voltage: Option<Box<dyn VoltageSensor>>,
    ) -> (GroundUnit<LoopbackRadio, ManualClock>, LoopbackRadio, ManualClock) {
        let clock = ManualClock::new(0);
        let (rocket, radio) = LoopbackRadio::pair();
        let unit = GroundUnit::new(&Config::default(), clock.clone(), radio, voltage).unwrap();
        (unit, rocket, clock)
    }

    #[test]
    fn parses_console_words() {
        assert_eq!(
            ConsoleCommand::parse(" Launch\r"),
            Some(ConsoleCommand::Send(CommandKind::StartFlight))
        );
        assert_eq!(
            ConsoleCommand::parse("arrival"),
            Some(ConsoleCommand::Send(CommandKind::EndFlight))
        );
        assert_eq!(ConsoleCommand::parse("status"), Some(ConsoleCommand::Status));
        assert_eq!(ConsoleCommand::parse("liftoff"), None);
    }

    #[test]
    fn commands_carry_time_sequence_and_checksum() {
        let (mut unit, rocket, clock) = ground(None);
        clock.set(1_234);

        let first = unit.send_command(CommandKind::StartFlight).unwrap();
        let second = unit.send_command(CommandKind::EndFlight).unwrap();

        assert_eq!(first.timestamp, 1_234);
        assert_eq!(second.sequence, first.sequence.wrapping_add(1));
        assert!(first.is_valid());
        assert_eq!(rocket.pending(), 2);
    }

    #[test]
    fn console_line_sends_the_mapped_command() {
        let (mut unit, rocket, _) = ground(None);
        assert_eq!(
            unit.handle_console_line("abort"),
            Some(ConsoleCommand::Send(CommandKind::AbortMission))
        );
        assert_eq!(unit.handle_console_line("status"), Some(ConsoleCommand::Status));
        assert_eq!(unit.handle_console_line("bogus"), None);
        assert_eq!(rocket.pending(), 1);
    }

    #[test]
    fn snapshot_overlays_base_voltage() {
        let (mut unit, _, clock) = ground(Some(Box::new(FixedVoltage(4.9))));

        let mut record = TelemetryRecord::default();
        record.power.voltage_rocket = 3.7;
        record.power.voltage_base = 1.0;
        unit.link().radio().inject(FLIGHT_UNIT_MAC, &record.as_bytes());
        unit.link().radio().deliver();

        clock.set(100);
        unit.tick();

        let fresh = unit.fresh().unwrap();
        assert_eq!(fresh.power.voltage_rocket, 3.7);
        assert_eq!(fresh.power.voltage_base, 4.9);
        assert_eq!(unit.fresh(), None);
        assert_eq!(unit.snapshot(), fresh);
    }

    #[test]
    fn sent_frames_validate_on_the_rocket() {
        let (mut unit, rocket, _) = ground(None);
        unit.send_command(CommandKind::NoOp).unwrap();

        let frames = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

        struct Collect(std::sync::Arc<std::sync::Mutex<Vec<Vec<u8>>>>);
        impl crate::link::ReceiveHandler for Collect {
            fn on_receive(&self, _source: &[u8], data: &[u8]) {
                self.0.lock().unwrap().push(data.to_vec());
            }
        }

        let mut rocket = rocket;
        rocket.init(std::sync::Arc::new(Collect(frames.clone()))).unwrap();
        rocket.deliver();

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(
            checksum::validate(&frames[0]).map(|c| c.kind),
            Ok(CommandKind::NoOp)
        );
    }
}
