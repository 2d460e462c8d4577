#[path = "../common/mod.rs"]
mod common;

use trfnfc::device::{DeviceBuilder, Frequency, Initialized, IrqStatus, Trf79x0, TrfMode};
use trfnfc::transport::mock::{IrqEvent, SharedBus};
use trfnfc::transport::registers::{DirectCommand, Register};
use trfnfc::Error;

fn driver(bus: &SharedBus) -> Trf79x0<Initialized> {
    DeviceBuilder::new().with_bus(bus.boxed()).build().unwrap()
}

#[test]
fn board_init_programs_defaults() -> anyhow::Result<()> {
    let bus = SharedBus::new();
    let mut trf = driver(&bus);
    trf.init_for_mode(TrfMode::BoardInit, Frequency::Standby)?;
    let b = bus.borrow();
    assert_eq!(b.register(Register::RegulatorControl), 0x87);
    assert_eq!(b.register(Register::FifoIrqLevel), 0x0F);
    assert_eq!(b.register(Register::IrqMask), 0x3E);
    Ok(())
}

#[test]
fn board_init_gives_up_on_wrong_chip() {
    let bus = SharedBus::new();
    bus.borrow_mut().chip_id = 0x00;
    let mut trf = driver(&bus);
    assert!(matches!(
        trf.init_for_mode(TrfMode::BoardInit, Frequency::Standby),
        Err(Error::DeviceNotFound)
    ));
    let soft_inits = bus
        .borrow()
        .commands()
        .iter()
        .filter(|c| **c == DirectCommand::SoftInit)
        .count();
    // one from initialize, ten attempts
    assert_eq!(soft_inits, 11);
}

#[test]
fn initiator_refuses_external_field() {
    common::init_logger();
    let bus = SharedBus::new();
    let mut trf = driver(&bus);
    bus.borrow_mut().set_register(Register::RssiLevel, 0x52);
    assert!(matches!(
        trf.init_for_mode(TrfMode::P2pInitiator, Frequency::Kbps424),
        Err(Error::ExternalField { rssi: 0x52 })
    ));
    assert_eq!(bus.borrow().register(Register::ChipStatusControl), 0x01);
}

#[test]
fn initiator_turns_rf_on_in_quiet_field() -> anyhow::Result<()> {
    let bus = SharedBus::new();
    let mut trf = driver(&bus);
    trf.init_for_mode(TrfMode::P2pInitiator, Frequency::Kbps212)?;
    let b = bus.borrow();
    assert_eq!(b.register(Register::IsoControl), 0x1A);
    assert_eq!(b.register(Register::ChipStatusControl), 0x21);
    Ok(())
}

#[test]
fn card_emulation_type_a_loads_nfcid() -> anyhow::Result<()> {
    let bus = SharedBus::new();
    let mut trf = DeviceBuilder::new()
        .with_bus(bus.boxed())
        .with_emulation_id([0xA1, 0xA2, 0xA3, 0xA4])
        .build()?;
    trf.init_for_mode(TrfMode::CardEmulationTypeA, Frequency::Kbps106)?;
    let b = bus.borrow();
    assert_eq!(b.register(Register::IsoControl), 0x24);
    assert_eq!(b.nfc_id(), &[0xA1, 0xA2, 0xA3, 0xA4]);
    Ok(())
}

#[test]
fn passive_target_filters_by_target_protocol() -> anyhow::Result<()> {
    let bus = SharedBus::new();
    let mut trf = driver(&bus);
    trf.init_for_mode(TrfMode::P2pPassiveTarget, Frequency::Kbps424)?;
    assert_eq!(bus.borrow().register(Register::IsoControl), 0x23);

    let frame = vec![0x06, 0x00, 0xFF, 0xFF, 0x00, 0x03];
    bus.borrow_mut().push_event(IrqEvent {
        target_protocol: 0xD3,
        ..IrqEvent::rx(0x40, frame.clone())
    });
    assert_eq!(trf.irq_handler(10)?, IrqStatus::RxComplete);
    assert_eq!(trf.received(), &frame[..]);

    // a 212 kbit/s frame while set up for 424
    bus.borrow_mut().push_event(IrqEvent {
        target_protocol: 0xD2,
        ..IrqEvent::rx(0x40, frame)
    });
    assert_eq!(trf.irq_handler(10)?, IrqStatus::Idle);
    assert_eq!(trf.irq_handler(10)?, IrqStatus::Timeout);
    Ok(())
}
