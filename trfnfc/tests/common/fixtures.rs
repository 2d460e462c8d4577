// fixtures.rs: UIDs, peer ids and frames shared by the integration tests

use trfnfc::types::{Nfcid2, Uid};

pub fn bytes(hex_str: &str) -> Vec<u8> {
    hex::decode(hex_str.replace(' ', "")).expect("fixture hex")
}

pub fn single_uid() -> Uid {
    Uid::new(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap()
}

pub fn double_uid() -> Uid {
    Uid::new(&[0x04, 0x52, 0x6A, 0x12, 0x34, 0x56, 0x80]).unwrap()
}

/// Two double-size UIDs sharing their whole first cascade level.
pub fn twin_double_uids() -> (Uid, Uid) {
    (
        Uid::new(&[0x04, 0x52, 0x6A, 0x10, 0x00, 0x00, 0x01]).unwrap(),
        Uid::new(&[0x04, 0x52, 0x6A, 0x14, 0x00, 0x00, 0x01]).unwrap(),
    )
}

pub fn peer_nfcid2() -> Nfcid2 {
    Nfcid2::from_bytes([0x01, 0xFE, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6])
}

/// Short NDEF message: one well-known URI record for https://nfc.example
pub fn uri_message() -> Vec<u8> {
    bytes("d1 01 0c 55 04 6e 66 63 2e 65 78 61 6d 70 6c 65")
}

/// Vendor event announcing GAP device init done, padded to `len` payload
/// bytes.
pub fn hci_init_done(len: u8) -> Vec<u8> {
    let mut msg = vec![0x04, 0xFF, len, 0x00, 0x06, 0x00];
    msg.resize(3 + len as usize, 0xA5);
    msg
}
