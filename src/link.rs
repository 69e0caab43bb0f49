//! Connectionless link between the two units.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use heapless::mpmc::MpMcQueue;

use crate::{
    checksum,
    command::CommandRecord,
    config::{format_mac, LinkConfig, COMMAND_QUEUE_DEPTH},
    error::{CommandError, TransportError},
    shared::Latest,
    telemetry::TelemetryRecord,
    wire::ByteSerialize,
};

pub type MacAddress = [u8; 6];

/// Destination registered with the radio before the first send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerRegistration {
    pub address: MacAddress,
    pub channel: u8,
}

impl From<LinkConfig> for PeerRegistration {
    fn from(config: LinkConfig) -> Self {
        PeerRegistration {
            address: config.peer_address,
            channel: config.channel,
        }
    }
}

/// Called from the radio's receive context with the sender's MAC and the
/// raw frame.
pub trait ReceiveHandler: Send + Sync {
    fn on_receive(&self, source: &[u8], data: &[u8]);
}

/// The raw radio operations a link is built on.
pub trait Radio {
    /// Brings the radio up and routes inbound frames to `handler`.
    fn init(&mut self, handler: Arc<dyn ReceiveHandler>) -> Result<(), TransportError>;

    /// Tears the radio down. Peers and callbacks are forgotten.
    fn deinit(&mut self);

    fn peer_exists(&self, address: MacAddress) -> Result<bool, TransportError>;

    fn add_peer(&mut self, peer: &PeerRegistration) -> Result<(), TransportError>;

    fn send(&mut self, address: MacAddress, data: &[u8]) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub sent: u32,
    pub failed: u32,
    pub reinitializations: u32,
}

pub struct Link<R: Radio> {
    radio: R,
    peer: PeerRegistration,
    handler: Arc<dyn ReceiveHandler>,
    stats: LinkStats,
}

impl<R: Radio> Link<R> {
    /// Initializes the radio and registers the peer. A failed peer
    /// registration is only logged; it is retried before every send.
    pub fn start(
        mut radio: R,
        peer: PeerRegistration,
        handler: Arc<dyn ReceiveHandler>,
    ) -> Result<Self, TransportError> {
        radio.init(handler.clone())?;

        if let Err(e) = radio.add_peer(&peer) {
            log::error!("failed to add peer {}: {}", format_mac(&peer.address), e);
        }

        Ok(Link {
            radio,
            peer,
            handler,
            stats: LinkStats::default(),
        })
    }

    pub fn peer(&self) -> PeerRegistration {
        self.peer
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Full re-initialization: radio, receive callback, peer.
    pub fn reinitialize(&mut self) -> Result<(), TransportError> {
        self.stats.reinitializations += 1;
        self.radio.deinit();
        self.radio.init(self.handler.clone())?;
        self.radio.add_peer(&self.peer)
    }

    fn ensure_peer(&mut self) -> Result<(), TransportError> {
        if self.radio.peer_exists(self.peer.address)? {
            return Ok(());
        }

        self.radio.add_peer(&self.peer).map_err(|e| match e {
            TransportError::NotInitialized => e,
            _ => TransportError::PeerRegistration,
        })
    }

    /// Sends one frame to the registered peer. Errors are logged and
    /// returned; none of them is retried within the call.
    pub fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let result = self
            .ensure_peer()
            .and_then(|_| self.radio.send(self.peer.address, frame));

        match result {
            Ok(()) => {
                self.stats.sent += 1;
                log::debug!("sent {} bytes", frame.len());
                Ok(())
            }
            Err(e) => {
                self.stats.failed += 1;
                self.handle_error(e);
                Err(e)
            }
        }
    }

    fn handle_error(&mut self, error: TransportError) {
        if error.is_recoverable() {
            log::warn!("radio not initialized, reinitializing");
            if let Err(e) = self.reinitialize() {
                log::error!("radio reinitialization failed: {}", e);
            }
            return;
        }

        match error {
            TransportError::NotInitialized => {}
            TransportError::InvalidArgument => log::error!("send rejected: invalid argument"),
            TransportError::OutOfMemory => log::error!("send rejected: out of memory"),
            TransportError::PeerRegistration => {
                log::error!(
                    "failed to add peer {} for transmission",
                    format_mac(&self.peer.address)
                )
            }
            TransportError::Unknown(code) => log::error!("unknown send error: {}", code),
        }
    }
}

#[derive(Debug, Default)]
pub struct InboxStats {
    pub accepted: AtomicU32,
    pub malformed: AtomicU32,
    pub corrupted: AtomicU32,
    pub dropped: AtomicU32,
}

impl InboxStats {
    pub fn accepted(&self) -> u32 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u32 {
        self.malformed.load(Ordering::Relaxed)
    }

    pub fn corrupted(&self) -> u32 {
        self.corrupted.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Validated commands waiting for the flight unit's loop.
pub struct CommandInbox {
    queue: MpMcQueue<CommandRecord, COMMAND_QUEUE_DEPTH>,
    stats: InboxStats,
}

impl CommandInbox {
    pub fn new() -> Self {
        CommandInbox {
            queue: MpMcQueue::new(),
            stats: InboxStats::default(),
        }
    }

    pub fn stats(&self) -> &InboxStats {
        &self.stats
    }

    /// Next validated command, oldest first.
    pub fn pop(&self) -> Option<CommandRecord> {
        self.queue.dequeue()
    }
}

impl Default for CommandInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveHandler for CommandInbox {
    fn on_receive(&self, source: &[u8], data: &[u8]) {
        match checksum::validate(data) {
            Ok(command) => {
                if self.queue.enqueue(command).is_err() {
                    InboxStats::bump(&self.stats.dropped);
                    log::warn!("command queue full, dropping {}", command.kind.name());
                } else {
                    InboxStats::bump(&self.stats.accepted);
                    log::debug!(
                        "command {} #{} from {}",
                        command.kind.name(),
                        command.sequence,
                        format_mac(source)
                    );
                }
            }
            Err(CommandError::Malformed(e)) => {
                InboxStats::bump(&self.stats.malformed);
                log::warn!("discarding frame from {}: {}", format_mac(source), e);
            }
            Err(e @ CommandError::ChecksumMismatch { .. }) => {
                InboxStats::bump(&self.stats.corrupted);
                log::warn!("discarding command from {}: {}", format_mac(source), e);
            }
        }
    }
}

/// Telemetry received by the ground unit.
pub struct TelemetryInbox {
    latest: Latest<TelemetryRecord>,
    stats: InboxStats,
}

impl TelemetryInbox {
    pub fn new() -> Self {
        TelemetryInbox {
            latest: Latest::new(TelemetryRecord::default()),
            stats: InboxStats::default(),
        }
    }

    pub fn latest(&self) -> &Latest<TelemetryRecord> {
        &self.latest
    }

    pub fn stats(&self) -> &InboxStats {
        &self.stats
    }
}

impl Default for TelemetryInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveHandler for TelemetryInbox {
    fn on_receive(&self, source: &[u8], data: &[u8]) {
        match TelemetryRecord::from_bytes(data) {
            Ok(record) => {
                self.latest.publish(record);
                InboxStats::bump(&self.stats.accepted);
                log::debug!("telemetry from {}", format_mac(source));
            }
            Err(e) => {
                InboxStats::bump(&self.stats.malformed);
                log::warn!("discarding frame from {}: {}", format_mac(source), e);
            }
        }
    }
}
