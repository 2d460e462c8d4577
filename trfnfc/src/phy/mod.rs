// trfnfc/src/phy/mod.rs
//! Direct mode 0 PHY: software-timed ISO14443-A modulation and subcarrier
//! sampling for frames the TRF79x0 framer cannot produce.

pub mod decoder;
pub mod direct;
pub mod hal;
pub mod mock;
pub mod sequence;

pub use decoder::{DirectFrame, ManchesterDecoder};
pub use direct::{DirectKind, DirectMode};
pub use hal::DirectModeHal;
pub use sequence::{DirectFormat, Sequence, UnitFormat};
