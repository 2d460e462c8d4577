// trfnfc/src/utils/timeout.rs
//! Wait times derived from protocol fields.

/// NFC-DEP RTOX wait: `(2 << rtox) / 3` milliseconds.
pub fn rtox_wait_ms(rtox: u8) -> u64 {
    // RTOX is a 6-bit value on the wire.
    (2u64 << (rtox & 0x3F).min(62)) / 3
}
