use crate::{
    command::{CommandKind, CommandRecord},
    error::CommandError,
    wire::ByteSerialize,
};

/// Sum of all bytes modulo 256.
pub fn sum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

/// Decodes an inbound frame and checks its checksum.
///
/// Sequence numbers are not compared against earlier frames, so replayed or
/// reordered commands pass as long as they are intact.
pub fn validate(frame: &[u8]) -> Result<CommandRecord, CommandError> {
    let record = CommandRecord::from_bytes(frame)?;
    let computed = record.compute_checksum();

    if record.checksum != computed {
        return Err(CommandError::ChecksumMismatch {
            carried: record.checksum,
            computed,
        });
    }

    Ok(record)
}

/// Producer side sequence numbers. Wraps after 65535.
#[derive(Debug, Default, Clone)]
pub struct SequenceCounter {
    next: u16,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next: u16) -> Self {
        SequenceCounter { next }
    }

    pub fn next_id(&mut self) -> u16 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }

    /// Builds the next checksummed command.
    pub fn command(&mut self, kind: CommandKind, timestamp: u32) -> CommandRecord {
        CommandRecord::new(kind, timestamp, self.next_id())
    }
}
