// trfnfc/src/reader/iso14443_4.rs
//! ISO14443-4 activation of an already selected Type A card: RATS, PPS and
//! DESELECT.

use log::debug;

use crate::protocol::parser::byte_at;
use crate::transport::link::{CrcMode, Transceiver};
use crate::{Error, Result};

const RATS: u8 = 0xE0;
const PPS: u8 = 0xD0;
/// PPS0 announcing that PPS1 follows.
const PPS0_PPS1: u8 = 0x11;
/// S(DESELECT) with a CID byte.
const DESELECT: u8 = 0xCA;

/// Answer to select, as returned by the card (TL first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ats(Vec<u8>);

impl Ats {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Format byte T0, if the card sent one.
    pub fn format_byte(&self) -> Option<u8> {
        if self.0.first().copied().unwrap_or(0) > 1 {
            self.0.get(1).copied()
        } else {
            None
        }
    }

    /// Frame size index announced in T0.
    pub fn fsci(&self) -> Option<u8> {
        self.format_byte().map(|t0| t0 & 0x0F)
    }
}

/// Request the ATS. The reply has to be at least three bytes; the length
/// byte at its head bounds what is kept.
pub fn rats<T: Transceiver + ?Sized>(trf: &mut T, fsdi: u8, cid: u8) -> Result<Ats> {
    let cmd = [RATS, (fsdi & 0x0F) << 4 | (cid & 0x0F)];
    let rx = trf.transceive(&cmd, 0, 16, CrcMode::BOTH)?;
    if rx.len() < 3 {
        return Err(Error::InvalidLength {
            expected: 3,
            actual: rx.len(),
        });
    }
    let tl = (byte_at(&rx.bytes, 0)? as usize).clamp(1, rx.len());
    debug!("ats {}", crate::utils::bytes_to_hex_spaced(&rx.bytes[..tl]));
    Ok(Ats(rx.bytes[..tl].to_vec()))
}

/// Change the bit rates. `dri` and `dsi` are the 2-bit divisor codes.
pub fn pps<T: Transceiver + ?Sized>(trf: &mut T, cid: u8, dri: u8, dsi: u8) -> Result<()> {
    let start = PPS | (cid & 0x0F);
    let cmd = [start, PPS0_PPS1, (dsi & 0x03) << 2 | (dri & 0x03)];
    let rx = trf.transceive(&cmd, 0, 3, CrcMode::BOTH)?;
    if rx.is_empty() {
        return Err(Error::Timeout);
    }
    crate::protocol::parser::expect_response_code(&rx.bytes, start)
}

/// Send S(DESELECT); the card echoes the block.
pub fn deselect<T: Transceiver + ?Sized>(trf: &mut T, cid: u8) -> Result<()> {
    let cmd = [DESELECT, cid & 0x0F];
    let rx = trf.transceive(&cmd, 0, 2, CrcMode::BOTH)?;
    if rx.is_empty() {
        return Err(Error::Timeout);
    }
    crate::protocol::parser::expect_response_code(&rx.bytes, DESELECT)
}
