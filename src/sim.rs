//! Host stand-ins for the radio, the sensors and the flight log.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
};

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::{
    clock::Clock,
    config::SEA_LEVEL_PRESSURE_HPA,
    error::{SensorError, StorageError, TransportError, ESP_ERR_ESPNOW_BASE},
    flight::FlightLog,
    link::{MacAddress, PeerRegistration, Radio, ReceiveHandler},
    sensors::{
        MotionReading, MotionSensor, PositionSource, PressureReading, PressureSensor,
        SensorSuite, VoltageSensor,
    },
    telemetry::{PositionData, TelemetryRecord},
};

pub const FLIGHT_UNIT_MAC: MacAddress = [0x2B, 0xBC, 0xBB, 0x4B, 0xE4, 0xBD];
pub const GROUND_UNIT_MAC: MacAddress = [0x10, 0x06, 0x1C, 0x69, 0xC1, 0x44];

const ESP_ERR_ESPNOW_NOT_FOUND: i32 = ESP_ERR_ESPNOW_BASE + 5;

type Mailbox = Arc<Mutex<VecDeque<(MacAddress, Vec<u8>)>>>;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One end of an in-process radio pair. Frames sent on one end queue up on
/// the other until `deliver` hands them to the receive handler, the way the
/// radio task would.
pub struct LoopbackRadio {
    mac: MacAddress,
    inbound: Mailbox,
    outbound: Mailbox,
    handler: Option<Arc<dyn ReceiveHandler>>,
    peers: Vec<PeerRegistration>,
    initialized: bool,
    peer_additions: u32,
    fail_next_send: Option<TransportError>,
    fail_next_add_peer: Option<TransportError>,
}

impl LoopbackRadio {
    /// (flight unit end, ground unit end)
    pub fn pair() -> (LoopbackRadio, LoopbackRadio) {
        let to_flight: Mailbox = Arc::default();
        let to_ground: Mailbox = Arc::default();

        (
            LoopbackRadio::new(FLIGHT_UNIT_MAC, to_flight.clone(), to_ground.clone()),
            LoopbackRadio::new(GROUND_UNIT_MAC, to_ground, to_flight),
        )
    }

    fn new(mac: MacAddress, inbound: Mailbox, outbound: Mailbox) -> Self {
        LoopbackRadio {
            mac,
            inbound,
            outbound,
            handler: None,
            peers: Vec::new(),
            initialized: false,
            peer_additions: 0,
            fail_next_send: None,
            fail_next_add_peer: None,
        }
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    /// Frames waiting for `deliver`.
    pub fn pending(&self) -> usize {
        lock(&self.inbound).len()
    }

    /// Runs the receive handler for every waiting frame. Frames arriving
    /// while the radio is down are lost.
    pub fn deliver(&self) -> usize {
        let frames: Vec<_> = lock(&self.inbound).drain(..).collect();

        match &self.handler {
            Some(handler) if self.initialized => {
                for (source, data) in frames.iter() {
                    handler.on_receive(source, data);
                }
                frames.len()
            }
            _ => 0,
        }
    }

    /// Queues a raw frame as if `source` had sent it.
    pub fn inject(&self, source: MacAddress, data: &[u8]) {
        lock(&self.inbound).push_back((source, data.to_vec()));
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn peer_additions(&self) -> u32 {
        self.peer_additions
    }

    pub fn forget_peers(&mut self) {
        self.peers.clear();
    }

    /// Simulates the driver losing its state under a running link.
    pub fn drop_initialization(&mut self) {
        self.initialized = false;
        self.peers.clear();
    }

    pub fn fail_next_send(&mut self, error: TransportError) {
        self.fail_next_send = Some(error);
    }

    pub fn fail_next_add_peer(&mut self, error: TransportError) {
        self.fail_next_add_peer = Some(error);
    }
}

impl Radio for LoopbackRadio {
    fn init(&mut self, handler: Arc<dyn ReceiveHandler>) -> Result<(), TransportError> {
        self.handler = Some(handler);
        self.initialized = true;
        Ok(())
    }

    fn deinit(&mut self) {
        self.handler = None;
        self.peers.clear();
        self.initialized = false;
    }

    fn peer_exists(&self, address: MacAddress) -> Result<bool, TransportError> {
        if !self.initialized {
            return Err(TransportError::NotInitialized);
        }
        Ok(self.peers.iter().any(|peer| peer.address == address))
    }

    fn add_peer(&mut self, peer: &PeerRegistration) -> Result<(), TransportError> {
        if !self.initialized {
            return Err(TransportError::NotInitialized);
        }
        if let Some(error) = self.fail_next_add_peer.take() {
            return Err(error);
        }
        self.peers.push(*peer);
        self.peer_additions += 1;
        Ok(())
    }

    fn send(&mut self, address: MacAddress, data: &[u8]) -> Result<(), TransportError> {
        if !self.initialized {
            return Err(TransportError::NotInitialized);
        }
        if let Some(error) = self.fail_next_send.take() {
            return Err(error);
        }
        if !self.peers.iter().any(|peer| peer.address == address) {
            return Err(TransportError::Unknown(ESP_ERR_ESPNOW_NOT_FOUND));
        }
        lock(&self.outbound).push_back((self.mac, data.to_vec()));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryLogState {
    started: u32,
    ended: Vec<f32>,
    appended: usize,
    last_record: Option<TelemetryRecord>,
    fail_next_begin: bool,
}

/// Flight log kept in memory. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryFlightLog {
    state: Arc<Mutex<MemoryLogState>>,
}

impl MemoryFlightLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions_started(&self) -> u32 {
        lock(&self.state).started
    }

    /// Durations passed to `end_session`, in order.
    pub fn sessions_ended(&self) -> Vec<f32> {
        lock(&self.state).ended.clone()
    }

    pub fn records_appended(&self) -> usize {
        lock(&self.state).appended
    }

    pub fn last_record(&self) -> Option<TelemetryRecord> {
        lock(&self.state).last_record
    }

    pub fn fail_next_begin(&self) {
        lock(&self.state).fail_next_begin = true;
    }
}

impl FlightLog for MemoryFlightLog {
    type Session = u32;

    fn begin_session(&mut self, _now_ms: u32) -> Result<u32, StorageError> {
        let mut state = lock(&self.state);
        if std::mem::take(&mut state.fail_next_begin) {
            return Err(StorageError::Io(std::io::ErrorKind::NotFound));
        }
        state.started += 1;
        Ok(state.started)
    }

    fn append_record(
        &mut self,
        _session: &mut u32,
        record: &TelemetryRecord,
    ) -> Result<(), StorageError> {
        let mut state = lock(&self.state);
        state.appended += 1;
        state.last_record = Some(*record);
        Ok(())
    }

    fn end_session(&mut self, _session: u32, duration_secs: f32) -> Result<(), StorageError> {
        lock(&self.state).ended.push(duration_secs);
        Ok(())
    }
}

/// A scripted water rocket flight: pad, 300 ms boost, ballistic coast,
/// then rest on the ground.
#[derive(Debug, Clone, Copy)]
pub struct FlightProfile {
    pub launch_ms: u32,
    pub boost_ms: u32,
    /// m/s² net of gravity during boost
    pub boost_accel: f32,
}

impl Default for FlightProfile {
    fn default() -> Self {
        FlightProfile {
            launch_ms: 2_000,
            boost_ms: 300,
            boost_accel: 60.0,
        }
    }
}

const GRAVITY: f32 = 9.81;

impl FlightProfile {
    /// (altitude m, vertical acceleration m/s² as felt by the IMU)
    pub fn state_at(&self, now_ms: u32) -> (f32, f32) {
        if now_ms < self.launch_ms {
            return (0.0, GRAVITY);
        }

        let t = (now_ms - self.launch_ms) as f32 / 1000.0;
        let boost = self.boost_ms as f32 / 1000.0;

        if t < boost {
            return (0.5 * self.boost_accel * t * t, GRAVITY + self.boost_accel);
        }

        let burnout_altitude = 0.5 * self.boost_accel * boost * boost;
        let burnout_velocity = self.boost_accel * boost;
        let tc = t - boost;
        let altitude = burnout_altitude + burnout_velocity * tc - 0.5 * GRAVITY * tc * tc;

        if altitude > 0.0 {
            (altitude, 0.0)
        } else {
            (0.0, GRAVITY)
        }
    }
}

/// Sensors reading from a `FlightProfile`.
#[derive(Clone)]
pub struct SimulatedSensors<C: Clock> {
    clock: C,
    profile: FlightProfile,
    battery_volts: f32,
    fail_reads: Arc<Mutex<u32>>,
}

impl<C: Clock + Clone + 'static> SimulatedSensors<C> {
    pub fn new(clock: C, profile: FlightProfile) -> Self {
        SimulatedSensors {
            clock,
            profile,
            battery_volts: 4.1,
            fail_reads: Arc::default(),
        }
    }

    /// The next `count` motion and pressure reads fail.
    pub fn fail_reads(&self, count: u32) {
        *lock(&self.fail_reads) = count;
    }

    fn failing(&self) -> bool {
        let mut remaining = lock(&self.fail_reads);
        if *remaining > 0 {
            *remaining -= 1;
            return true;
        }
        false
    }

    pub fn suite(self) -> SensorSuite {
        SensorSuite {
            motion: Box::new(self.clone()),
            pressure: Box::new(self.clone()),
            voltage: Box::new(self.clone()),
            position: Box::new(self),
        }
    }
}

impl<C: Clock + Clone + 'static> MotionSensor for SimulatedSensors<C> {
    fn read_motion(&mut self) -> Result<MotionReading, SensorError> {
        if self.failing() {
            return Err(SensorError::Bus);
        }

        let (_, vertical) = self.profile.state_at(self.clock.now_ms());
        Ok(MotionReading {
            // the rocket stands on its tail, nose along +y
            accel: [0.05, vertical, 0.3],
            gyro: [0.5, -0.25, 0.0],
            temperature: 24.0,
        })
    }
}

impl<C: Clock + Clone + 'static> PressureSensor for SimulatedSensors<C> {
    fn read_pressure(&mut self) -> Result<PressureReading, SensorError> {
        if self.failing() {
            return Err(SensorError::Timeout);
        }

        let (altitude, _) = self.profile.state_at(self.clock.now_ms());
        let pressure = SEA_LEVEL_PRESSURE_HPA * (1.0 - altitude / 44330.0).powf(1.0 / 0.1903);
        Ok(PressureReading { pressure, altitude })
    }
}

impl<C: Clock + Clone + 'static> VoltageSensor for SimulatedSensors<C> {
    fn read_voltage(&mut self) -> Result<f32, SensorError> {
        // slow drain
        let minutes = self.clock.now_ms() as f32 / 60_000.0;
        Ok((self.battery_volts - 0.01 * minutes).max(3.0))
    }
}

impl<C: Clock + Clone + 'static> PositionSource for SimulatedSensors<C> {
    fn position(&mut self) -> Option<PositionData> {
        let seconds = self.clock.now_ms() / 1000;
        Some(PositionData {
            latitude: -15.7939,
            longitude: -47.8828,
            altitude: 1172.0 + self.profile.state_at(self.clock.now_ms()).0,
            day: 14,
            month: 7,
            year: 2025,
            hour: 13,
            minute: (seconds / 60 % 60) as i32,
            second: (seconds % 60) as i32,
        })
    }
}

#[derive(Debug, Default)]
struct BusState {
    devices: Vec<(u8, [u8; 256])>,
    pointer: u8,
    failing: bool,
}

/// An I2C bus with register-file devices on it. Writes set the register
/// pointer and store any following bytes; reads continue from the pointer.
/// Clones share the bus.
#[derive(Debug, Clone, Default)]
pub struct RegisterBus {
    state: Arc<Mutex<BusState>>,
}

impl RegisterBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, address: u8) -> &Self {
        lock(&self.state).devices.push((address, [0; 256]));
        self
    }

    /// Presets registers starting at `register`.
    pub fn preset(&self, address: u8, register: u8, bytes: &[u8]) {
        let mut state = lock(&self.state);
        if let Some((_, registers)) = state.devices.iter_mut().find(|(a, _)| *a == address) {
            for (offset, byte) in bytes.iter().enumerate() {
                registers[register.wrapping_add(offset as u8) as usize] = *byte;
            }
        }
    }

    pub fn register(&self, address: u8, register: u8) -> Option<u8> {
        let state = lock(&self.state);
        state
            .devices
            .iter()
            .find(|(a, _)| *a == address)
            .map(|(_, registers)| registers[register as usize])
    }

    /// Every transaction fails while set.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }
}

impl ErrorType for RegisterBus {
    type Error = ErrorKind;
}

impl I2c for RegisterBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        if state.failing {
            return Err(ErrorKind::Bus);
        }

        let BusState {
            devices, pointer, ..
        } = &mut *state;
        let Some((_, registers)) = devices.iter_mut().find(|(a, _)| *a == address) else {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        };

        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    if let Some((register, data)) = bytes.split_first() {
                        *pointer = *register;
                        for byte in data {
                            registers[*pointer as usize] = *byte;
                            *pointer = pointer.wrapping_add(1);
                        }
                    }
                }
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = registers[*pointer as usize];
                        *pointer = pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}
