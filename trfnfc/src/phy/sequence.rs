// trfnfc/src/phy/sequence.rs
//! PCD to PICC modified Miller coding for ISO14443-A at 106 kbit/s.
//!
//! Every sequence spans four quarter-bit slots. All of them end at 3/4 of a
//! bit period so consecutive sequences chain at one per bit.

use derive_more::Display;

use super::hal::DirectModeHal;

/// Miller sequences named after ISO14443-2.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    /// Pause after half a bit: a logical 1.
    X,
    /// No pause: a 0 following a 1, and the end of frame filler.
    Y,
    /// Pause at the start of the bit: start of frame, or a 0 after a 0.
    Z,
}

impl Sequence {
    /// Quarter slot after which the modulation pause starts.
    fn pause_after(self) -> Option<usize> {
        match self {
            Sequence::X => Some(2),
            Sequence::Y => None,
            Sequence::Z => Some(0),
        }
    }

    /// Modulation state at the end of each quarter slot.
    pub fn pattern(self) -> [bool; 4] {
        let mut out = [false; 4];
        if let Some(p) = self.pause_after() {
            out[p] = true;
        }
        out
    }

    /// Drive the MOD pin for one bit period.
    pub fn play<H: DirectModeHal + ?Sized>(self, hal: &mut H) {
        let pause = self.pause_after();
        for slot in 0..4 {
            hal.wait_quarter_bit();
            match pause {
                Some(p) if p == slot => hal.set_modulation(true),
                Some(p) if p + 1 == slot => hal.set_modulation(false),
                _ => {}
            }
        }
    }
}

/// Layout of one data unit in direct-mode buffers.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitFormat {
    /// 8 bits per unit, an opaque bit stream.
    #[default]
    Opaque,
    /// 9 bits per unit: the byte in bits 0..8 and its parity in bit 8.
    Parity,
}

impl UnitFormat {
    pub fn width(self) -> u8 {
        match self {
            UnitFormat::Opaque => 8,
            UnitFormat::Parity => 9,
        }
    }

    pub fn mask(self) -> u16 {
        (1u16 << self.width()) - 1
    }
}

/// Send and receive layouts for one direct-mode exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectFormat {
    pub send: UnitFormat,
    pub recv: UnitFormat,
}

impl DirectFormat {
    pub const OPAQUE: Self = Self {
        send: UnitFormat::Opaque,
        recv: UnitFormat::Opaque,
    };
    pub const PARITY: Self = Self {
        send: UnitFormat::Parity,
        recv: UnitFormat::Parity,
    };
}

/// Miller encoder keeping track of the previously sent bit.
#[derive(Debug, Default)]
struct MillerEncoder {
    last: bool,
    out: Vec<Sequence>,
}

impl MillerEncoder {
    fn bit(&mut self, bit: bool) {
        let seq = match (bit, self.last) {
            (true, _) => Sequence::X,
            (false, true) => Sequence::Y,
            (false, false) => Sequence::Z,
        };
        self.out.push(seq);
        self.last = bit;
    }

    fn bits(&mut self, value: u16, count: u8) {
        for i in 0..count {
            self.bit(value >> i & 1 != 0);
        }
    }
}

/// Sequences for a whole frame: SOF, every full unit LSB first, then the
/// low `tail_bits` bits of `tail`, then EOF.
///
/// EOF is a logical 0 followed by a Y.
pub fn encode_frame(format: UnitFormat, units: &[u16], tail: Option<(u16, u8)>) -> Vec<Sequence> {
    let mut enc = MillerEncoder::default();
    enc.out.push(Sequence::Z);

    for &unit in units {
        enc.bits(unit & format.mask(), format.width());
    }
    if let Some((value, bits)) = tail {
        enc.bits(value, bits.min(format.width()));
    }

    enc.bit(false);
    enc.out.push(Sequence::Y);
    enc.out
}
