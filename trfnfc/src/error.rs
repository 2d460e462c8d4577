// trfnfc/src/error.rs

use thiserror::Error;

/// Crate-wide error type shared by every protocol layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A driver was built without a register bus.
    #[error("transceiver not found")]
    DeviceNotFound,

    /// The register bus collaborator reported a failure.
    #[error("bus error: {0}")]
    Bus(String),

    /// A blocking wait expired without the expected event.
    #[error("operation timed out")]
    Timeout,

    #[error("invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unexpected response code: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedResponse { expected: u8, actual: u8 },

    #[error("crc mismatch: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch { expected: u16, actual: u16 },

    #[error("parity error at byte {index}")]
    ParityMismatch { index: usize },

    /// Malformed or out-of-range protocol data.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The transceiver signalled a protocol or collision error.
    #[error("transceiver reported protocol error")]
    TransceiverProtocol,

    /// An external RF field was present when the initiator tried to start.
    #[error("external rf field detected (rssi={rssi:#04x})")]
    ExternalField { rssi: u8 },

    /// A fixed-capacity container was full.
    #[error("capacity exceeded: at most {capacity} entries")]
    CapacityExceeded { capacity: usize },

    /// The operation is not allowed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
