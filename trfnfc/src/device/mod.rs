// trfnfc/src/device/mod.rs

//! TRF79x0 driver: type-state handle, builder, operating modes and IRQ
//! classification.

pub mod builder;
pub mod handle;
pub mod irq;
pub mod mode;

pub use builder::DeviceBuilder;
pub use handle::{Initialized, Trf79x0, Uninitialized};
pub use irq::IrqStatus;
pub use mode::{Frequency, TrfMode};
