// trfnfc/src/device/builder.rs

use crate::device::handle::{Initialized, Trf79x0, Uninitialized};
use crate::transport::RegisterBus;
use crate::{Error, Result};

/// Helper to construct a driver with optional configuration.
#[derive(Default)]
pub struct DeviceBuilder {
    bus: Option<Box<dyn RegisterBus>>,
    emulation_id: Option<[u8; 4]>,
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide the register bus (e.g. MockBus or a real SPI binding).
    pub fn with_bus(mut self, bus: Box<dyn RegisterBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// NFC ID / PUPI answered while emulating a Type 4A or 4B card.
    pub fn with_emulation_id(mut self, id: [u8; 4]) -> Self {
        self.emulation_id = Some(id);
        self
    }

    /// Consume the builder and return an uninitialized driver.
    /// Requires a bus to be provided; otherwise returns DeviceNotFound.
    pub fn build_uninitialized(self) -> Result<Trf79x0<Uninitialized>> {
        let bus = self.bus.ok_or(Error::DeviceNotFound)?;
        let device = Trf79x0::new_with_bus(bus);
        Ok(match self.emulation_id {
            Some(id) => device.with_emulation_id(id),
            None => device,
        })
    }

    pub fn build(self) -> Result<Trf79x0<Initialized>> {
        self.build_uninitialized()?.initialize()
    }
}
