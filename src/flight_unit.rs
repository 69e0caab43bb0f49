use std::sync::Arc;

use crate::{
    clock::Clock,
    config::Config,
    error::TransportError,
    flight::{FlightLog, FlightState, FlightStateMachine, Transition},
    fusion::ComplementaryFilter,
    link::{CommandInbox, Link, Radio},
    scheduler::{RateScheduler, Ticks},
    sensors::SensorSuite,
    shared::Latest,
    telemetry::TelemetryRecord,
    wire::ByteSerialize,
};

pub struct FlightUnit<R: Radio, L: FlightLog, C: Clock> {
    clock: C,
    sensors: SensorSuite,
    filter: ComplementaryFilter,
    scheduler: RateScheduler,
    record: TelemetryRecord,
    latest: Arc<Latest<TelemetryRecord>>,
    link: Link<R>,
    inbox: Arc<CommandInbox>,
    machine: FlightStateMachine<L>,
}

impl<R: Radio, L: FlightLog, C: Clock> FlightUnit<R, L, C> {
    pub fn new(
        config: &Config,
        clock: C,
        sensors: SensorSuite,
        radio: R,
        log: L,
    ) -> Result<Self, TransportError> {
        let inbox = Arc::new(CommandInbox::new());
        let link = Link::start(radio, config.link.into(), inbox.clone())?;
        let start_ms = clock.now_ms();

        Ok(FlightUnit {
            clock,
            sensors,
            filter: ComplementaryFilter::new(config.fusion),
            scheduler: RateScheduler::new(config.rates, start_ms),
            record: TelemetryRecord::default(),
            latest: Arc::new(Latest::default()),
            link,
            inbox,
            machine: FlightStateMachine::new(log),
        })
    }

    pub fn state(&self) -> FlightState {
        self.machine.state()
    }

    pub fn machine(&self) -> &FlightStateMachine<L> {
        &self.machine
    }

    /// Most recently assembled record, shared with any reader.
    pub fn latest(&self) -> Arc<Latest<TelemetryRecord>> {
        self.latest.clone()
    }

    pub fn link(&self) -> &Link<R> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut Link<R> {
        &mut self.link
    }

    pub fn inbox(&self) -> &CommandInbox {
        &self.inbox
    }

    /// One loop iteration. Never blocks.
    pub fn tick(&mut self) -> Ticks {
        let now_ms = self.clock.now_ms();
        let ticks = self.scheduler.poll(now_ms);

        if ticks.sample {
            self.sample(now_ms);
        }
        if ticks.transmit {
            self.transmit();
        }
        self.drain_commands(now_ms);

        ticks
    }

    fn sample(&mut self, now_ms: u32) {
        let mut record = self.record;

        match self.sensors.voltage.read_voltage() {
            Ok(volts) => record.power.voltage_rocket = volts,
            Err(e) => log::warn!("battery read failed, keeping last value: {}", e),
        }

        match self.sensors.motion.read_motion() {
            Ok(reading) => {
                let m = &mut record.motion;
                [m.acc_x, m.acc_y, m.acc_z] = reading.accel;
                [m.gyro_x, m.gyro_y, m.gyro_z] = reading.gyro;
                m.temperature = reading.temperature;
            }
            Err(e) => log::warn!("IMU read failed, keeping last value: {}", e),
        }

        match self.sensors.pressure.read_pressure() {
            Ok(reading) => {
                record.pressure.pressure = reading.pressure;
                record.pressure.altitude = reading.altitude;
            }
            Err(e) => log::warn!("altimeter read failed, keeping last value: {}", e),
        }

        let m = &record.motion;
        let Some(attitude) = self.filter.update(
            [m.acc_x, m.acc_y, m.acc_z],
            [m.gyro_x, m.gyro_y, m.gyro_z],
            now_ms,
        ) else {
            log::debug!("fusion primed at {} ms", now_ms);
            return;
        };

        record.motion.pitch = attitude.pitch;
        record.motion.roll = attitude.roll;
        record.position = self.sensors.position.position().unwrap_or_default();
        record.timestamp = now_ms as f32;

        self.record = record;
        self.latest.publish(record);
        self.machine.record(&record);

        log::debug!("{}", record);
    }

    fn transmit(&mut self) {
        let frame = self.record.as_bytes();
        if let Err(e) = self.link.send(&frame) {
            log::debug!("telemetry frame skipped: {}", e);
        }
    }

    fn drain_commands(&mut self, now_ms: u32) {
        while let Some(command) = self.inbox.pop() {
            match self.machine.handle(&command, now_ms) {
                Transition::Started => log::info!("flight logging started"),
                Transition::Ended { duration_secs } => {
                    log::info!("flight logging stopped, {:.2} s", duration_secs)
                }
                other => log::debug!("{} #{}: {:?}", command.kind.name(), command.sequence, other),
            }
        }
    }
}
