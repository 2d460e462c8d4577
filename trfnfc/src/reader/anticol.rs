// trfnfc/src/reader/anticol.rs
//! ISO14443-A anticollision state: a depth-first walk over the UID bit tree.
//!
//! The raw buffer holds up to three cascade levels of five bytes each
//! (cascade tag or UID bytes, then BCC). `bit_pos` counts resolved bits over
//! the whole buffer, so a finished single-size UID sits at 40. Every bit
//! where two cards disagreed is remembered as a backtrack point; the walk
//! takes the 0 branch first.

use crate::constants::CASCADE_TAG;
use crate::types::Uid;
use crate::{Error, Result};

/// Bytes per cascade level on the wire.
pub const LEVEL_BYTES: usize = 5;
/// Bits per cascade level.
pub const LEVEL_BITS: usize = LEVEL_BYTES * 8;
pub const MAX_LEVELS: usize = 3;
const RAW_LEN: usize = LEVEL_BYTES * MAX_LEVELS;

/// SEL codes of the three cascade levels.
pub const SEL_CODES: [u8; MAX_LEVELS] = [0x93, 0x95, 0x97];

/// NVB byte for `valid_bits` known UID bits of the current level. The two
/// command bytes are counted as well, so a full SELECT is 0x70.
pub fn nvb(valid_bits: usize) -> u8 {
    let valid = valid_bits.min(LEVEL_BITS);
    ((((valid / 8) << 4) | (valid % 8)) + 0x20) as u8
}

/// Turn a collision position in NVB format into a bit count within the
/// level. Positions before the UID part of the frame are rejected.
pub fn collision_bits(position: u8) -> Result<usize> {
    let pos = position
        .checked_sub(0x20)
        .ok_or_else(|| Error::Protocol(format!("collision position {:#04x}", position)))?;
    let bits = (pos >> 4) as usize * 8 + (pos & 0x0F) as usize;
    if bits > LEVEL_BITS {
        return Err(Error::Protocol(format!(
            "collision position {:#04x} beyond uid",
            position
        )));
    }
    Ok(bits)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnticolState {
    raw: [u8; RAW_LEN],
    collisions: [u8; RAW_LEN],
    bit_pos: usize,
}

impl AnticolState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fully known state for an existing UID, with cascade tags and BCCs in
    /// place, so that running anticollision on it only sends SELECTs.
    pub fn for_uid(uid: &Uid) -> Self {
        let mut state = Self::new();
        let bytes = uid.as_bytes();
        let mut pos = 0;
        while pos < bytes.len() {
            let base = state.bit_pos / 8;
            if pos + 4 < bytes.len() {
                state.raw[base] = CASCADE_TAG;
                state.raw[base + 1..base + 4].copy_from_slice(&bytes[pos..pos + 3]);
                pos += 3;
            } else {
                state.raw[base..base + 4].copy_from_slice(&bytes[pos..pos + 4]);
                pos += 4;
            }
            state.raw[base + 4] = bcc(&state.raw[base..base + 4]);
            state.bit_pos += LEVEL_BITS;
        }
        state
    }

    pub fn bit_pos(&self) -> usize {
        self.bit_pos
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Known bits of `level` (0-based), clamped to a full level.
    pub fn valid_bits(&self, level: usize) -> usize {
        self.bit_pos
            .saturating_sub(level * LEVEL_BITS)
            .min(LEVEL_BITS)
    }

    /// SEL, NVB and the known bytes of `level`; the last byte may be partial.
    /// Returns the command and the number of valid bits in its last byte.
    pub fn command(&self, level: usize) -> (Vec<u8>, u8) {
        let valid = self.valid_bits(level);
        let known = valid.div_ceil(8);
        let start = level * LEVEL_BYTES;
        let mut cmd = Vec::with_capacity(2 + known);
        cmd.push(SEL_CODES[level]);
        cmd.push(nvb(valid));
        cmd.extend_from_slice(&self.raw[start..start + known]);
        (cmd, (valid % 8) as u8)
    }

    /// Merge an ANTICOLLISION answer for `level`.
    ///
    /// `collision` is the number of level bits all cards agreed on (40 when
    /// nothing collided). Bits past that point are discarded; if it falls
    /// inside the level, the disputed bit becomes a backtrack point and the
    /// walk continues on its 0 branch.
    pub fn merge(&mut self, level: usize, response: &[u8], collision: usize) -> Result<()> {
        let valid = self.valid_bits(level);
        if collision > LEVEL_BITS || collision < valid {
            return Err(Error::Protocol(format!(
                "collision at bit {} with {} bits known",
                collision, valid
            )));
        }

        let mask = collision - (valid / 8) * 8;
        let mut resp = response.to_vec();
        if mask % 8 != 0 {
            if let Some(b) = resp.get_mut(mask / 8) {
                *b &= !(0xFFu8 << (mask % 8));
            }
        }

        let base = self.bit_pos / 8;
        for (i, b) in resp.iter().take(mask.div_ceil(8)).enumerate() {
            if let Some(dst) = self.raw.get_mut(base + i) {
                *dst |= *b;
            }
        }

        self.bit_pos += collision - valid;
        if collision < LEVEL_BITS {
            self.set_bit(Bits::Collision, self.bit_pos, true);
            self.bit_pos += 1;
        }
        Ok(())
    }

    /// Step back to the most recent unexplored collision and take its 1
    /// branch. Returns `false` when every branch has been walked.
    pub fn backtrack(&mut self) -> bool {
        while self.bit_pos > 0 {
            self.bit_pos -= 1;
            let pos = self.bit_pos;
            self.set_bit(Bits::Uid, pos, false);
            if self.bit(Bits::Collision, pos) {
                self.set_bit(Bits::Uid, pos, true);
                self.set_bit(Bits::Collision, pos, false);
                self.bit_pos += 1;
                return true;
            }
        }
        false
    }

    /// The selected UID without cascade tags and BCCs.
    pub fn uid(&self) -> Result<Uid> {
        let levels = self.bit_pos / LEVEL_BITS;
        let mut out = Vec::with_capacity(10);
        for level in 0..levels {
            let start = level * LEVEL_BYTES;
            if level + 1 < levels {
                out.extend_from_slice(&self.raw[start + 1..start + 4]);
            } else {
                out.extend_from_slice(&self.raw[start..start + 4]);
            }
        }
        Uid::new(&out)
    }

    /// After a SELECT was not answered properly.
    pub(crate) fn clear(&mut self) {
        self.raw = [0; RAW_LEN];
        self.bit_pos = 0;
    }

    fn bit(&self, which: Bits, pos: usize) -> bool {
        let buf = match which {
            Bits::Uid => &self.raw,
            Bits::Collision => &self.collisions,
        };
        buf.get(pos / 8).is_some_and(|b| b & (1 << (pos % 8)) != 0)
    }

    fn set_bit(&mut self, which: Bits, pos: usize, value: bool) {
        let buf = match which {
            Bits::Uid => &mut self.raw,
            Bits::Collision => &mut self.collisions,
        };
        if let Some(b) = buf.get_mut(pos / 8) {
            if value {
                *b |= 1 << (pos % 8);
            } else {
                *b &= !(1 << (pos % 8));
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Bits {
    Uid,
    Collision,
}

/// Block check character: XOR of the four bytes before it.
pub fn bcc(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}
