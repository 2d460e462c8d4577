// trfnfc/src/phy/decoder.rs
//! PICC to PCD Manchester decoding from eighth-bit subcarrier samples.
//!
//! Each sample says whether the edge detector saw the 848 kHz subcarrier
//! during one eighth of a bit. A bit is eight samples with one data edge in
//! its middle; the direction of that edge is the bit value. Edges at bit
//! boundaries are ignored by requiring a minimum distance to the last data
//! edge. The first data edge is the start of frame.

use super::sequence::UnitFormat;

/// Samples since the last data edge assumed at the start (half a bit), so
/// the SOF mid-bit edge is caught right away.
const HALF_BIT: u8 = 4;
/// A falling edge closer than this to the last data edge is a boundary edge.
const MIN_FALLING_DISTANCE: u8 = 6;
/// Same for rising edges, which the subcarrier tends to make look late.
const MIN_RISING_DISTANCE: u8 = 5;
/// Two silent bit periods end the reception.
const SILENCE: u8 = 16;

/// Units received in one direct-mode exchange, plus any trailing bits that
/// did not fill a whole unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectFrame {
    pub units: Vec<u16>,
    pub tail: u16,
    pub tail_bits: u8,
}

impl DirectFrame {
    /// No response means not a single bit after the SOF.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.tail_bits == 0
    }

    /// Low bytes of the full units.
    pub fn bytes(&self) -> Vec<u8> {
        self.units.iter().map(|&u| u as u8).collect()
    }
}

/// Sample-driven decoder state.
#[derive(Debug)]
pub struct ManchesterDecoder {
    format: UnitFormat,
    max_units: usize,
    units: Vec<u16>,
    current: u16,
    bits: u8,
    count: u8,
    last: bool,
    have_sof: bool,
    done: bool,
}

impl ManchesterDecoder {
    /// `max_units` is the receive buffer size in units. One slot stays free
    /// for a trailing partial unit, so at most `max_units - 1` full units are
    /// collected (and at least one).
    pub fn new(format: UnitFormat, max_units: usize) -> Self {
        Self {
            format,
            max_units,
            units: Vec::new(),
            current: 0,
            bits: 0,
            count: HALF_BIT,
            last: false,
            have_sof: false,
            done: max_units == 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one eighth-bit sample. Returns `false` once reception is over.
    pub fn feed(&mut self, sample: bool) -> bool {
        if self.done {
            return false;
        }

        if sample != self.last {
            let min = if self.last {
                MIN_FALLING_DISTANCE
            } else {
                MIN_RISING_DISTANCE
            };
            if self.count <= min {
                self.count = HALF_BIT;
            } else {
                if self.have_sof {
                    self.push_bit(self.last);
                } else {
                    self.have_sof = true;
                }
                self.count = 0;
            }
        }

        self.count += 1;
        self.last = sample;

        if self.bits == self.format.width() {
            self.units.push(self.current);
            self.current = 0;
            self.bits = 0;
            if self.units.len() + 1 >= self.max_units {
                self.done = true;
                return false;
            }
        }

        if self.count >= SILENCE {
            self.done = true;
        }
        !self.done
    }

    fn push_bit(&mut self, bit: bool) {
        if bit {
            self.current |= 1 << self.bits;
        }
        self.bits += 1;
    }

    pub fn finish(self) -> DirectFrame {
        DirectFrame {
            units: self.units,
            tail: self.current,
            tail_bits: self.bits,
        }
    }

    /// Decode a recorded sample stream.
    pub fn decode<I>(format: UnitFormat, max_units: usize, samples: I) -> DirectFrame
    where
        I: IntoIterator<Item = bool>,
    {
        let mut dec = Self::new(format, max_units);
        for s in samples {
            if !dec.feed(s) {
                break;
            }
        }
        dec.finish()
    }
}
