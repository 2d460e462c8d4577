#[path = "../common/mod.rs"]
mod common;

use trfnfc::reader::iso14443b::{self, AttribParams, SlotCount, WakeCommandB};
use trfnfc::test_support::initialized_mock_trf;
use trfnfc::transport::mock::IrqEvent;

#[test]
fn wupb_then_attrib_and_halt() -> anyhow::Result<()> {
    let (bus, mut trf) = initialized_mock_trf()?;
    iso14443b::setup_registers(&mut trf)?;
    let atqb = common::fixtures::bytes("50 aa bb cc dd 00 00 00 00 00 81 71");
    {
        let mut b = bus.borrow_mut();
        b.push_event(IrqEvent::status(0x80));
        b.push_event(IrqEvent::rx(0x40, atqb));
        b.push_event(IrqEvent::status(0x80));
        b.push_event(IrqEvent::rx(0x40, vec![0x00]));
        b.push_event(IrqEvent::status(0x80));
        b.push_event(IrqEvent::rx(0x40, vec![0x00]));
    }

    let card = iso14443b::request(&mut trf, WakeCommandB::Wupb, 0, SlotCount::ONE)?
        .expect("atqb");
    assert_eq!(card.pupi.to_hex(), "aabbccdd");
    assert_eq!(
        iso14443b::attrib(&mut trf, &card.pupi, &AttribParams::default())?,
        Some(0x00)
    );
    assert!(iso14443b::halt(&mut trf, &card.pupi)?);

    let frames = bus.borrow().frames().to_vec();
    assert_eq!(frames[1][0], 0x1D);
    assert_eq!(frames[2], vec![0x50, 0xAA, 0xBB, 0xCC, 0xDD]);
    Ok(())
}
