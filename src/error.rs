use thiserror::Error;

/// A frame could not be decoded into a fixed-layout record.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// An inbound command frame that must be discarded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Malformed(#[from] DecodeError),
    #[error("checksum mismatch: frame carries {carried:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { carried: u8, computed: u8 },
}

/// ESP-NOW error codes, `ESP_ERR_ESPNOW_BASE` is `ESP_ERR_WIFI_BASE + 100`.
pub const ESP_ERR_ESPNOW_BASE: i32 = 0x3000 + 100;
pub const ESP_ERR_ESPNOW_NOT_INIT: i32 = ESP_ERR_ESPNOW_BASE + 1;
pub const ESP_ERR_ESPNOW_ARG: i32 = ESP_ERR_ESPNOW_BASE + 2;
pub const ESP_ERR_ESPNOW_NO_MEM: i32 = ESP_ERR_ESPNOW_BASE + 3;

/// Failure of a radio operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport not initialized")]
    NotInitialized,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("out of memory")]
    OutOfMemory,
    #[error("failed to register peer")]
    PeerRegistration,
    #[error("unknown transport error: {0}")]
    Unknown(i32),
}

impl TransportError {
    /// Classifies a raw `esp_err_t` returned by an ESP-NOW call.
    pub fn from_code(code: i32) -> Self {
        match code {
            ESP_ERR_ESPNOW_NOT_INIT => TransportError::NotInitialized,
            ESP_ERR_ESPNOW_ARG => TransportError::InvalidArgument,
            ESP_ERR_ESPNOW_NO_MEM => TransportError::OutOfMemory,
            other => TransportError::Unknown(other),
        }
    }

    /// Only a missing initialization can be fixed by the transport itself.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransportError::NotInitialized)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("bus transaction failed")]
    Bus,
    #[error("sensor not detected")]
    NotDetected,
    #[error("sensor read timed out")]
    Timeout,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("flight log i/o failed: {0:?}")]
    Io(std::io::ErrorKind),
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        StorageError::Io(value.kind())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsError {
    #[error("NMEA checksum mismatch")]
    InvalidChecksum,
    #[error("malformed NMEA sentence")]
    InvalidData,
}
