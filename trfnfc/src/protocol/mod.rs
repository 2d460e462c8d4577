// trfnfc/src/protocol/mod.rs
//! Byte-level protocol helpers shared by every engine: ISO14443-A parity and
//! CRC_A, and bounds-checked frame parsing.

pub mod checksum;
pub mod parser;

pub use checksum::{append_crc, check_crc, check_parity, crc_a, set_parity};
