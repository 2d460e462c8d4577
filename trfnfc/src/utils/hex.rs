// trfnfc/src/utils/hex.rs
//! Hex helpers for frame dumps in log output and for test fixtures.

use std::fmt::Write;

/// Lowercase hex without separators: `&[0x26, 0x52]` -> `"2652"`.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    })
}

/// Lowercase hex with one space between bytes: `"26 52"`.
pub fn bytes_to_hex_spaced(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Hex dump of a 9-bit (byte + parity) stream as used by the direct-mode PHY,
/// printed as `bb/p` per unit.
pub fn units_to_hex(units: &[u16]) -> String {
    units
        .iter()
        .map(|u| format!("{:02x}/{}", u & 0xFF, (u >> 8) & 1))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse hex text, ignoring ASCII whitespace.
pub fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<u8> = s.bytes().filter(|c| !c.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err("hex string has odd length".to_string());
    }
    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).map_err(|e| e.to_string())?;
            u8::from_str_radix(text, 16).map_err(|e| format!("invalid hex pair '{}': {}", text, e))
        })
        .collect()
}
