// trfnfc/src/hci/mod.rs
//! Host side of the BLE module's HCI-over-UART link: byte ring, event
//! framing and the discovered-device table.

pub mod bond;
pub mod frame;
pub mod ring;

pub use bond::{BleDevice, DeviceTable, LtkData, bond_command};
pub use frame::{HciEvent, HciEventKind};
pub use ring::RxRing;

use crate::Result;

/// Feed received bytes and hand out every event that became complete.
/// Bytes that do not fit are dropped and counted in the returned tuple.
pub fn drain_events(ring: &mut RxRing, bytes: &[u8]) -> (Vec<Result<HciEvent>>, usize) {
    let mut events = Vec::new();
    let mut dropped = 0;
    for &b in bytes {
        if ring.push(b).is_err() {
            dropped += 1;
        }
        while let Some(msg) = ring.message_complete() {
            events.push(HciEvent::parse(&msg));
        }
    }
    (events, dropped)
}
