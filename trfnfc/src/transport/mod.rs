// trfnfc/src/transport/mod.rs
//! Hardware seams: the register bus, the register map, the frame-level
//! traits used by the protocol engines, and test doubles for both levels.

pub mod link;
pub mod mock;
pub mod registers;
pub mod traits;

pub use link::{CrcMode, FrameLink, RxFrame, Transceiver};
pub use registers::{DirectCommand, Register};
pub use traits::RegisterBus;
