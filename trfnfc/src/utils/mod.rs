// trfnfc/src/utils/mod.rs
//! Small helpers shared across the stack: hex dumps and protocol waits.

pub mod hex;
pub mod timeout;

pub use hex::*;
pub use timeout::*;
