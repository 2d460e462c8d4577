// trfnfc/src/lib.rs

//! trfnfc
//!
//! Pure Rust NFC/RFID protocol stack for TI TRF79x0 transceivers: reader
//! anticollision for ISO14443-A/B and ISO15693, NFC-DEP peer-to-peer with
//! LLCP and SNEP, Type 4 card emulation setup, NDEF records and the host
//! side of a BLE module's HCI link.
#![warn(missing_docs)]

pub mod constants;
pub mod device;
pub mod error;
pub mod hci;
pub mod ndef;
#[cfg(feature = "p2p")]
pub mod p2p;
pub mod phy;
pub mod prelude;
pub mod protocol;
pub mod reader;
pub mod test_support;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export common types at crate root so `crate::Error`, `crate::Result`,
// and the newtypes in `types` are available for consumers and for
// convenient `prelude` re-exports.
pub use crate::error::*;
pub use crate::types::*;

pub use prelude::*;
