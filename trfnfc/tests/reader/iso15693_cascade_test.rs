#[path = "../common/mod.rs"]
mod common;

use trfnfc::reader::iso15693::{self, Iso15693Config};
use trfnfc::types::VicinityUid;

const A: [u8; 8] = [0x35, 0x11, 0x22, 0x33, 0x44, 0x55, 0x04, 0xE0];
const B: [u8; 8] = [0x75, 0x66, 0x77, 0x88, 0x99, 0xAA, 0x04, 0xE0];
const C: [u8; 8] = [0x0A, 0x01, 0x02, 0x03, 0x04, 0x05, 0x07, 0xE0];

#[test]
fn collision_in_one_slot_is_resolved_by_rescan() {
    common::init_logger();
    let mut field = common::field::vicinity_field(&[A, B, C]);
    let table = common::field::scan(&mut field);

    assert_eq!(table.len(), 3);
    let slot_of = |uid: [u8; 8]| {
        table
            .cards()
            .iter()
            .find(|c| c.uid == VicinityUid::from_bytes(uid))
            .map(|c| c.slot)
    };
    assert_eq!(slot_of(C), Some(10));
    assert_eq!(slot_of(A), Some(3));
    assert_eq!(slot_of(B), Some(7));

    // top level round, then one rescan of slot 5
    assert_eq!(field.sent[0], vec![0x06, 0x01, 0x00]);
    assert_eq!(field.sent[1], vec![0x06, 0x01, 0x04, 0x05]);
    assert_eq!(field.sent.len(), 2);
}

#[test]
fn cascade_stops_after_one_level() {
    let mut twin = B;
    twin[0] = A[0];
    let mut field = common::field::vicinity_field(&[A, twin]);
    let table = common::field::scan(&mut field);
    assert!(table.is_empty());
    assert_eq!(field.sent.len(), 2);
}

#[test]
fn full_table_keeps_first_cards_and_finishes_scan() {
    // sixteen cards spread over the slots, plus one sharing slot 0
    let mut uids: Vec<[u8; 8]> = (0..16u8)
        .map(|n| [n, n, 0x22, 0x33, 0x44, 0x55, 0x04, 0xE0])
        .collect();
    let late = [0x10, 0xF0, 0x22, 0x33, 0x44, 0x55, 0x04, 0xE0];
    uids.push(late);
    let mut field = common::field::vicinity_field(&uids);

    let mut table = trfnfc::reader::iso15693::CardTable::new();
    let found = iso15693::anticollision_16_slots(
        &mut field,
        &Iso15693Config::default(),
        &[],
        0,
        &mut table,
    )
    .unwrap();

    assert!(found);
    assert!(table.is_full());
    assert_eq!(table.len(), 16);
    assert!(!table.contains(&VicinityUid::from_bytes(late)));
    assert!(table.contains(&VicinityUid::from_bytes(uids[0])));
    assert!(table.contains(&VicinityUid::from_bytes(uids[15])));
    // the colliding slot 0 was still rescanned
    assert_eq!(field.sent.len(), 2);
    assert_eq!(field.sent[1], vec![0x06, 0x01, 0x04, 0x00]);
}

#[test]
fn quiet_card_is_left_out() {
    let mut field = common::field::vicinity_field(&[A, C]);
    iso15693::stay_quiet(&mut field, &VicinityUid::from_bytes(A)).unwrap();
    let table = common::field::scan(&mut field);
    assert_eq!(table.len(), 1);
    assert_eq!(table.cards()[0].uid, VicinityUid::from_bytes(C));
}

#[test]
fn afi_filters_single_slot_inventory() {
    let mut field = common::field::vicinity_field(&[]);
    field.vicinity.push(trfnfc::test_support::SimulatedVicinity::new(A));
    field
        .vicinity
        .push(trfnfc::test_support::SimulatedVicinity::new(C).with_afi(0x07));
    let resp = iso15693::inventory_afi(&mut field, &Iso15693Config::default(), 0x07, false)
        .unwrap()
        .unwrap();
    assert_eq!(resp.uid, VicinityUid::from_bytes(C));
}

#[test]
fn addressed_block_write_then_read() {
    let mut field = common::field::vicinity_field(&[A, C]);
    let uid = VicinityUid::from_bytes(C);
    iso15693::write_single_block(&mut field, Some(&uid), 3, &[1, 2, 3, 4]).unwrap();
    assert_eq!(
        iso15693::read_single_block(&mut field, Some(&uid), 3).unwrap(),
        vec![0x00, 1, 2, 3, 4]
    );
    iso15693::lock_block(&mut field, Some(&uid), 3).unwrap();
    assert!(iso15693::write_single_block(&mut field, Some(&uid), 3, &[0; 4]).is_err());
    assert!(iso15693::read_single_block(&mut field, Some(&uid), 60).is_err());
}
