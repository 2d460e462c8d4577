#[path = "../common/mod.rs"]
mod common;

use trfnfc::device::{DeviceBuilder, Trf79x0, TrfMode};
use trfnfc::transport::mock::{MockBus, SharedBus};
use trfnfc::transport::registers::{DirectCommand, Register};
use trfnfc::Error;

#[test]
fn initialize_reads_chip_id_and_enables_timeout_irq() -> anyhow::Result<()> {
    let bus = SharedBus::new();
    let device = Trf79x0::new_with_bus(bus.boxed());
    assert_eq!(device.chip_id(), 0);

    let initialized = device.initialize()?;
    assert_eq!(initialized.chip_id(), 0x91);
    assert_eq!(initialized.mode(), TrfMode::BoardInit);

    let b = bus.borrow();
    assert_eq!(b.commands()[..2], [DirectCommand::SoftInit, DirectCommand::Idle]);
    assert_eq!(b.register(Register::IrqMask), 0x3F);
    assert_eq!(b.writes_to(Register::ModulatorControl), vec![0x01]);
    Ok(())
}

#[test]
fn builder_needs_a_bus() {
    assert!(matches!(
        DeviceBuilder::new().build_uninitialized(),
        Err(Error::DeviceNotFound)
    ));
    assert!(matches!(DeviceBuilder::new().build(), Err(Error::DeviceNotFound)));
}

#[test]
fn builder_builds_initialized_driver() -> anyhow::Result<()> {
    let device = DeviceBuilder::new()
        .with_bus(Box::new(MockBus::new()))
        .with_emulation_id([1, 2, 3, 4])
        .build()?;
    assert_eq!(device.chip_id(), 0x91);
    assert!(device.received().is_empty());
    Ok(())
}
