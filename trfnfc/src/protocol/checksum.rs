// trfnfc/src/protocol/checksum.rs
//! ISO14443-A odd parity and CRC_A.
//!
//! Bit-level frames are held as 16-bit units: the data byte in the low half
//! and its parity bit in bit 8. The byte-oriented helpers at the bottom are
//! what the native-framer paths use.

use crate::{Error, Result};

const CRC_A_SEED: u16 = 0x6363;
const CRC_A_POLY: u16 = 0x8408;

/// Odd parity bit for `byte`: set when the byte has an even number of ones.
pub fn parity_bit(byte: u8) -> u8 {
    ((byte.count_ones() & 1) as u8) ^ 1
}

/// Pack a byte with its parity bit into a 9-bit unit.
pub fn with_parity(byte: u8) -> u16 {
    byte as u16 | (parity_bit(byte) as u16) << 8
}

/// Recompute the parity bit of every unit in place.
pub fn set_parity(units: &mut [u16]) {
    for u in units.iter_mut() {
        *u = with_parity(*u as u8);
    }
}

/// Verify the parity bit of every unit.
pub fn check_parity(units: &[u16]) -> Result<()> {
    match units
        .iter()
        .position(|&u| (u >> 8) as u8 & 1 != parity_bit(u as u8))
    {
        Some(index) => Err(Error::ParityMismatch { index }),
        None => Ok(()),
    }
}

fn crc_a_update(mut crc: u16, mut byte: u8) -> u16 {
    for _ in 0..8 {
        let bit = (crc ^ byte as u16) & 1;
        byte >>= 1;
        crc >>= 1;
        if bit != 0 {
            crc ^= CRC_A_POLY;
        }
    }
    crc
}

/// CRC_A over the low bytes of `units`.
pub fn crc_a_units(units: &[u16]) -> u16 {
    units
        .iter()
        .fold(CRC_A_SEED, |crc, &u| crc_a_update(crc, u as u8))
}

/// CRC_A over plain bytes.
pub fn crc_a(bytes: &[u8]) -> u16 {
    bytes.iter().fold(CRC_A_SEED, |crc, &b| crc_a_update(crc, b))
}

/// Append the CRC (low byte first) with parity to a unit stream.
pub fn append_crc_units(units: &mut Vec<u16>) {
    let crc = crc_a_units(units);
    units.push(with_parity(crc as u8));
    units.push(with_parity((crc >> 8) as u8));
}

/// Check the trailing two units hold the CRC of everything before them.
pub fn check_crc_units(units: &[u16]) -> Result<()> {
    if units.len() < 2 {
        return Err(Error::InvalidLength {
            expected: 2,
            actual: units.len(),
        });
    }
    let (data, tail) = units.split_at(units.len() - 2);
    let expected = crc_a_units(data);
    let actual = (tail[0] & 0xFF) | (tail[1] & 0xFF) << 8;
    if expected != actual {
        return Err(Error::CrcMismatch { expected, actual });
    }
    Ok(())
}

/// Append the CRC (low byte first) to a byte frame.
pub fn append_crc(bytes: &mut Vec<u8>) {
    let crc = crc_a(bytes);
    bytes.extend_from_slice(&crc.to_le_bytes());
}

/// Check the trailing two bytes hold the CRC of everything before them.
pub fn check_crc(bytes: &[u8]) -> Result<()> {
    if bytes.len() < 2 {
        return Err(Error::InvalidLength {
            expected: 2,
            actual: bytes.len(),
        });
    }
    let (data, tail) = bytes.split_at(bytes.len() - 2);
    let expected = crc_a(data);
    let actual = u16::from_le_bytes([tail[0], tail[1]]);
    if expected != actual {
        return Err(Error::CrcMismatch { expected, actual });
    }
    Ok(())
}

/// Convert plain bytes into parity-augmented units.
pub fn to_units(bytes: &[u8]) -> Vec<u16> {
    bytes.iter().map(|&b| with_parity(b)).collect()
}
