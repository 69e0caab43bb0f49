use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{checksum, wire::ByteSerialize};

/// Control message kinds sent from the ground unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    NoOp,
    StartFlight,
    EndFlight,
    AbortMission,
    ResetSystem,
    /// A value outside the known set. Kept so the receiver can report it.
    Unrecognized(u32),
}

impl CommandKind {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => CommandKind::NoOp,
            1 => CommandKind::StartFlight,
            2 => CommandKind::EndFlight,
            3 => CommandKind::AbortMission,
            4 => CommandKind::ResetSystem,
            other => CommandKind::Unrecognized(other),
        }
    }

    pub fn as_raw(&self) -> u32 {
        match self {
            CommandKind::NoOp => 0,
            CommandKind::StartFlight => 1,
            CommandKind::EndFlight => 2,
            CommandKind::AbortMission => 3,
            CommandKind::ResetSystem => 4,
            CommandKind::Unrecognized(raw) => *raw,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::NoOp => "no-op",
            CommandKind::StartFlight => "start-flight",
            CommandKind::EndFlight => "end-flight",
            CommandKind::AbortMission => "abort-mission",
            CommandKind::ResetSystem => "reset-system",
            CommandKind::Unrecognized(_) => "unrecognized",
        }
    }
}

/// 12 byte control frame.
///
/// | offset | size | field    |
/// |--------|------|----------|
/// | 0      | 4    | kind     |
/// | 4      | 4    | timestamp|
/// | 8      | 2    | sequence |
/// | 10     | 1    | checksum |
/// | 11     | 1    | zero pad |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRecord {
    pub kind: CommandKind,
    /// Device milliseconds of the sender.
    pub timestamp: u32,
    pub sequence: u16,
    pub checksum: u8,
}

pub const COMMAND_RECORD_SIZE: usize = <CommandRecord as ByteSerialize>::SIZE;

/// Bytes covered by the checksum.
pub const CHECKSUM_OFFSET: usize = 10;

impl CommandRecord {
    /// Builds a record with a correct checksum.
    pub fn new(kind: CommandKind, timestamp: u32, sequence: u16) -> Self {
        let mut record = CommandRecord {
            kind,
            timestamp,
            sequence,
            checksum: 0,
        };
        record.checksum = record.compute_checksum();
        record
    }

    fn header(&self) -> [u8; CHECKSUM_OFFSET] {
        let mut header = [0u8; CHECKSUM_OFFSET];
        header[0..4].copy_from_slice(&self.kind.as_raw().to_le_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_le_bytes());
        header[8..10].copy_from_slice(&self.sequence.to_le_bytes());
        header
    }

    pub fn compute_checksum(&self) -> u8 {
        checksum::sum8(&self.header())
    }

    pub fn is_valid(&self) -> bool {
        self.checksum == self.compute_checksum()
    }
}

impl ByteSerialize for CommandRecord {
    const SIZE: usize = 12;

    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.kind.as_raw());
        buf.put_u32_le(self.timestamp);
        buf.put_u16_le(self.sequence);
        buf.put_u8(self.checksum);
        buf.put_u8(0);
    }

    fn read_from(buf: &mut Bytes) -> Self {
        let record = CommandRecord {
            kind: CommandKind::from_raw(buf.get_u32_le()),
            timestamp: buf.get_u32_le(),
            sequence: buf.get_u16_le(),
            checksum: buf.get_u8(),
        };
        buf.advance(1);
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_firmware_struct() {
        let record = CommandRecord::new(CommandKind::StartFlight, 0x0403_0201, 0x0605);
        let bytes = record.as_bytes();

        let expected: [u8; 12] = [1, 0, 0, 0, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 22, 0];

        assert_eq!(COMMAND_RECORD_SIZE, 12);
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn unknown_kinds_survive_decoding() {
        let record = CommandRecord::new(CommandKind::Unrecognized(9), 10, 1);
        let decoded = CommandRecord::from_bytes(&record.as_bytes()).unwrap();
        assert_eq!(decoded.kind, CommandKind::Unrecognized(9));
        assert!(decoded.is_valid());
    }

    #[test]
    fn raw_kind_mapping_is_stable() {
        for raw in 0..5 {
            assert_eq!(CommandKind::from_raw(raw).as_raw(), raw);
        }
        assert_eq!(CommandKind::from_raw(2), CommandKind::EndFlight);
    }

    #[test]
    fn pad_byte_is_ignored() {
        let record = CommandRecord::new(CommandKind::EndFlight, 5000, 3);
        let mut bytes = record.as_bytes().to_vec();
        bytes[11] = 0xAA;
        assert_eq!(CommandRecord::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn rejects_wrong_lengths() {
        let bytes = CommandRecord::new(CommandKind::NoOp, 0, 0).as_bytes();
        assert!(CommandRecord::from_bytes(&bytes[..11]).is_err());
        assert!(CommandRecord::from_bytes(&[]).is_err());
        assert!(CommandRecord::from_bytes(&[0u8; 13]).is_err());
    }
}
