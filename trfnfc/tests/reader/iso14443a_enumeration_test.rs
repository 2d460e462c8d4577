#[path = "../common/mod.rs"]
mod common;

use trfnfc::reader::iso14443_4;
use trfnfc::reader::iso14443a::{self, Iso14443a, WakeCommand};
use trfnfc::test_support::{SimulatedField, SimulatedTypeA};
use trfnfc::types::{Sak, Uid};

fn enumerate(field: &mut SimulatedField) -> Vec<Uid> {
    let mut reader = Iso14443a::new();
    let mut found = Vec::new();
    let mut next = reader.select_first(field, WakeCommand::Reqa).unwrap();
    while let Some(sel) = next {
        found.push(sel.uid);
        iso14443a::halt(field).unwrap();
        next = reader.select_next(field, WakeCommand::Reqa).unwrap();
    }
    found
}

#[test]
fn two_single_size_cards_are_enumerated() -> anyhow::Result<()> {
    common::init_logger();
    let a = Uid::new(&[0xDE, 0xAD, 0xBE, 0xEF])?;
    let b = Uid::new(&[0xDE, 0xAD, 0xBE, 0xEE])?;
    let mut field = common::field::type_a_field(&[a, b]);

    let found = enumerate(&mut field);
    // the 0 branch of the disputed bit comes first
    assert_eq!(found, vec![b, a]);

    // first anticollision frame of the resumed walk carries 25 known bits
    assert!(field
        .sent
        .iter()
        .any(|f| f.len() == 6 && f[..2] == [0x93, 0x51] && f[5] == 0x01));
    Ok(())
}

#[test]
fn cascade_collision_in_second_level() {
    let (low, high) = common::fixtures::twin_double_uids();
    let mut field = common::field::type_a_field(&[high, low]);
    let found = enumerate(&mut field);
    assert_eq!(found, vec![low, high]);
    assert!(field.sent.iter().any(|f| f[..2] == [0x95, 0x23]));
}

#[test]
fn lone_card_has_no_successor() {
    let uid = common::fixtures::double_uid();
    let mut field = common::field::type_a_field(&[uid]);
    let mut reader = Iso14443a::new();
    let sel = reader.select_first(&mut field, WakeCommand::Wupa).unwrap().unwrap();
    assert_eq!(sel.uid, uid);
    assert_eq!(sel.sak, Sak(0x08));
    assert!(reader.select_next(&mut field, WakeCommand::Wupa).unwrap().is_none());
}

#[test]
fn empty_field_selects_nothing() {
    let mut field = SimulatedField::new();
    let mut reader = Iso14443a::new();
    assert!(reader.select_first(&mut field, WakeCommand::Reqa).unwrap().is_none());
    assert_eq!(field.sent, vec![vec![0x26]]);
}

#[test]
fn known_uid_is_reselected_after_halt() {
    let uid = common::fixtures::single_uid();
    let mut field = SimulatedField::new()
        .with_type_a(
            SimulatedTypeA::new(uid)
                .with_sak(0x20)
                .with_ats(vec![0x03, 0x75, 0x80]),
        );
    let mut reader = Iso14443a::new();
    reader.select_first(&mut field, WakeCommand::Reqa).unwrap().unwrap();
    iso14443a::halt(&mut field).unwrap();

    let sak = iso14443a::select(&mut field, &uid).unwrap().unwrap();
    assert!(sak.supports_iso14443_4());

    let ats = iso14443_4::rats(&mut field, 5, 0).unwrap();
    assert_eq!(ats.as_bytes(), &[0x03, 0x75, 0x80]);
    assert_eq!(ats.fsci(), Some(5));
}
