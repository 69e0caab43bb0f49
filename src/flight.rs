//! Flight state machine.

use crate::{
    command::{CommandKind, CommandRecord},
    error::StorageError,
    telemetry::TelemetryRecord,
};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    /// On the pad, nothing logged.
    Ground = 0,
    /// Start accepted, waiting on a flight log session.
    PreFlight = 1,
    /// Logging.
    FlightActive = 2,
    /// Flight closed out.
    PostFlight = 3,
}

/// Persists the records of one flight.
pub trait FlightLog {
    type Session;

    fn begin_session(&mut self, now_ms: u32) -> Result<Self::Session, StorageError>;

    fn append_record(
        &mut self,
        session: &mut Self::Session,
        record: &TelemetryRecord,
    ) -> Result<(), StorageError>;

    fn end_session(&mut self, session: Self::Session, duration_secs: f32)
        -> Result<(), StorageError>;
}

/// Result of handing a command to the machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// A flight log session began.
    Started,
    /// Start accepted but the session could not be opened.
    SessionUnavailable,
    /// The flight ended after `duration_secs`.
    Ended { duration_secs: f32 },
    /// Valid command, wrong state.
    Ignored,
    /// Abort and reset have no transitions yet.
    Reserved,
    NoOp,
    Unrecognized(u32),
}

pub struct FlightStateMachine<L: FlightLog> {
    state: FlightState,
    log: L,
    session: Option<L::Session>,
    flight_start_ms: u32,
}

impl<L: FlightLog> FlightStateMachine<L> {
    pub fn new(log: L) -> Self {
        FlightStateMachine {
            state: FlightState::Ground,
            log,
            session: None,
            flight_start_ms: 0,
        }
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    pub fn flight_start_ms(&self) -> Option<u32> {
        match self.state {
            FlightState::FlightActive | FlightState::PostFlight => Some(self.flight_start_ms),
            _ => None,
        }
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Acts on a command that already passed validation.
    pub fn handle(&mut self, command: &CommandRecord, now_ms: u32) -> Transition {
        match command.kind {
            CommandKind::StartFlight => self.start_flight(now_ms),
            CommandKind::EndFlight => self.end_flight(now_ms),
            CommandKind::NoOp => Transition::NoOp,
            CommandKind::AbortMission | CommandKind::ResetSystem => {
                log::info!("{} is reserved, ignoring", command.kind.name());
                Transition::Reserved
            }
            CommandKind::Unrecognized(raw) => {
                log::warn!("unrecognized command kind {}", raw);
                Transition::Unrecognized(raw)
            }
        }
    }

    fn start_flight(&mut self, now_ms: u32) -> Transition {
        match self.state {
            FlightState::Ground | FlightState::PreFlight => {}
            state => {
                log::info!("start-flight ignored in {:?}", state);
                return Transition::Ignored;
            }
        }

        self.state = FlightState::PreFlight;

        match self.log.begin_session(now_ms) {
            Ok(session) => {
                self.session = Some(session);
                self.flight_start_ms = now_ms;
                self.state = FlightState::FlightActive;
                log::info!("flight started at {} ms", now_ms);
                Transition::Started
            }
            Err(e) => {
                log::error!("could not open flight log: {}", e);
                Transition::SessionUnavailable
            }
        }
    }

    fn end_flight(&mut self, now_ms: u32) -> Transition {
        if self.state != FlightState::FlightActive {
            log::info!("end-flight ignored in {:?}", self.state);
            return Transition::Ignored;
        }

        let duration_secs = now_ms.wrapping_sub(self.flight_start_ms) as f32 / 1000.0;

        if let Some(session) = self.session.take() {
            if let Err(e) = self.log.end_session(session, duration_secs) {
                log::error!("could not close flight log: {}", e);
            }
        }

        self.state = FlightState::PostFlight;
        log::info!("flight ended after {:.1} s", duration_secs);
        Transition::Ended { duration_secs }
    }

    /// Appends a record to the open session, if any.
    pub fn record(&mut self, record: &TelemetryRecord) {
        if self.state != FlightState::FlightActive {
            return;
        }

        if let Some(session) = self.session.as_mut() {
            if let Err(e) = self.log.append_record(session, record) {
                log::warn!("dropped flight log record: {}", e);
            }
        }
    }
}
