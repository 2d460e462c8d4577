// trfnfc/src/test_support.rs
//! Test support helpers intended for use by unit and integration tests.
//!
//! [`SimulatedField`] stands in for the RF field in front of a reader: it
//! answers ISO14443-A and ISO15693 frames the way a set of cards would,
//! including bit collisions, so the anticollision engines can be driven
//! without hardware.
#![allow(dead_code)]

use crate::device::{Initialized, Trf79x0};
use crate::reader::anticol::{AnticolState, LEVEL_BITS, LEVEL_BYTES, SEL_CODES, nvb};
use crate::transport::link::{CrcMode, RxFrame, Transceiver};
use crate::transport::mock::SharedBus;
use crate::transport::registers::{DirectCommand, Register};
use crate::types::{Atqa, Sak, Uid, VicinityUid};
use crate::Result;

/// Initialize a driver on top of a fresh register-file mock and return both.
#[doc(hidden)]
pub fn initialized_mock_trf() -> Result<(SharedBus, Trf79x0<Initialized>)> {
    let bus = SharedBus::new();
    let trf = Trf79x0::new_with_bus(bus.boxed()).initialize()?;
    Ok((bus, trf))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeAState {
    Idle,
    Ready,
    Active,
    Halted,
}

/// One ISO14443-A card.
#[derive(Debug, Clone)]
pub struct SimulatedTypeA {
    pub uid: Uid,
    pub atqa: Atqa,
    pub sak: Sak,
    pub ats: Vec<u8>,
    pub state: TypeAState,
    level: usize,
}

impl SimulatedTypeA {
    pub fn new(uid: Uid) -> Self {
        let atqa = match uid.len() {
            4 => [0x04, 0x00],
            7 => [0x44, 0x00],
            _ => [0x84, 0x00],
        };
        Self {
            uid,
            atqa: Atqa::from_bytes(atqa),
            sak: Sak(0x08),
            ats: vec![0x05, 0x78, 0x80, 0x70, 0x02],
            state: TypeAState::Idle,
            level: 0,
        }
    }

    pub fn with_sak(mut self, sak: u8) -> Self {
        self.sak = Sak(sak);
        self
    }

    pub fn with_ats(mut self, ats: Vec<u8>) -> Self {
        self.ats = ats;
        self
    }

    fn level_bytes(&self, level: usize) -> [u8; LEVEL_BYTES] {
        let state = AnticolState::for_uid(&self.uid);
        let mut out = [0u8; LEVEL_BYTES];
        out.copy_from_slice(&state.raw()[level * LEVEL_BYTES..(level + 1) * LEVEL_BYTES]);
        out
    }

    fn wake(&mut self, wupa: bool) -> bool {
        match self.state {
            TypeAState::Idle | TypeAState::Ready => {}
            TypeAState::Halted if wupa => {}
            TypeAState::Halted => return false,
            TypeAState::Active => {
                self.state = TypeAState::Idle;
                return false;
            }
        }
        self.state = TypeAState::Ready;
        self.level = 0;
        true
    }
}

/// One ISO15693 card with 4-byte blocks.
#[derive(Debug, Clone)]
pub struct SimulatedVicinity {
    pub uid: VicinityUid,
    pub dsfid: u8,
    pub afi: u8,
    pub blocks: Vec<[u8; 4]>,
    pub locked: Vec<bool>,
    pub quiet: bool,
}

impl SimulatedVicinity {
    pub fn new(uid: [u8; 8]) -> Self {
        Self {
            uid: VicinityUid::from_bytes(uid),
            dsfid: 0,
            afi: 0,
            blocks: vec![[0; 4]; 8],
            locked: vec![false; 8],
            quiet: false,
        }
    }

    pub fn with_afi(mut self, afi: u8) -> Self {
        self.afi = afi;
        self
    }

    fn uid_bit(&self, bit: usize) -> u8 {
        (self.uid.as_bytes()[bit / 8] >> (bit % 8)) & 1
    }

    fn matches_mask(&self, mask: &[u8], mask_len: usize) -> bool {
        (0..mask_len).all(|bit| {
            let want = mask.get(bit / 8).map_or(0, |b| (b >> (bit % 8)) & 1);
            self.uid_bit(bit) == want
        })
    }

    fn slot_for(&self, mask_len: usize) -> u8 {
        (0..4).fold(0, |acc, i| acc | self.uid_bit(mask_len + i) << i)
    }
}

#[derive(Debug, Clone)]
struct InventoryRound {
    mask: Vec<u8>,
    mask_len: usize,
    afi: Option<u8>,
    sixteen_slots: bool,
}

/// Cards in front of the antenna, answering through [`Transceiver`].
#[derive(Debug, Clone, Default)]
pub struct SimulatedField {
    pub type_a: Vec<SimulatedTypeA>,
    pub vicinity: Vec<SimulatedVicinity>,
    /// Every frame transmitted, in order.
    pub sent: Vec<Vec<u8>>,
    pub delay_total_ms: u64,
    registers: Vec<u8>,
    round: Option<InventoryRound>,
    slot: u8,
    slot_open: bool,
}

impl SimulatedField {
    pub fn new() -> Self {
        Self {
            registers: vec![0; 0x20],
            ..Self::default()
        }
    }

    pub fn with_type_a(mut self, card: SimulatedTypeA) -> Self {
        self.type_a.push(card);
        self
    }

    pub fn with_vicinity(mut self, card: SimulatedVicinity) -> Self {
        self.vicinity.push(card);
        self
    }

    pub fn register(&self, reg: Register) -> u8 {
        self.registers.get(reg.address() as usize).copied().unwrap_or(0)
    }

    fn request_a(&mut self, wupa: bool) -> RxFrame {
        let answers: Vec<[u8; 2]> = self
            .type_a
            .iter_mut()
            .filter_map(|c| c.wake(wupa).then_some(*c.atqa.as_bytes()))
            .collect();
        let Some(first) = answers.first().copied() else {
            return RxFrame::default();
        };
        match first_difference(answers.as_slice(), 0, 16) {
            None => RxFrame::new(first.to_vec()),
            Some(bit) => RxFrame::with_collision(vec![first[0]], nvb(bit)),
        }
    }

    fn anticollision_a(&mut self, tx: &[u8]) -> RxFrame {
        let Some(level) = SEL_CODES.iter().position(|c| *c == tx[0]) else {
            return RxFrame::default();
        };
        let valid = ((tx[1] >> 4) as usize).saturating_sub(2) * 8 + (tx[1] & 0x0F) as usize;
        let known = &tx[2..];

        if valid >= LEVEL_BITS {
            return self.select_a(level, known);
        }

        let answers: Vec<[u8; LEVEL_BYTES]> = self
            .type_a
            .iter()
            .filter(|c| c.state == TypeAState::Ready && c.level == level)
            .map(|c| c.level_bytes(level))
            .filter(|bytes| (0..valid).all(|bit| bit_of(bytes, bit) == bit_of(known, bit)))
            .collect();
        let Some(first) = answers.first().copied() else {
            return RxFrame::default();
        };
        let reply = first[valid / 8..].to_vec();
        match first_difference(answers.as_slice(), valid, LEVEL_BITS) {
            None => RxFrame::new(reply),
            Some(bit) => RxFrame::with_collision(reply, nvb(bit)),
        }
    }

    fn select_a(&mut self, level: usize, known: &[u8]) -> RxFrame {
        let mut reply = RxFrame::default();
        for card in self
            .type_a
            .iter_mut()
            .filter(|c| c.state == TypeAState::Ready && c.level == level)
        {
            if known.get(..LEVEL_BYTES) != Some(&card.level_bytes(level)[..]) {
                card.state = TypeAState::Idle;
                continue;
            }
            if card.uid.cascade_levels() > level + 1 {
                card.level += 1;
                reply = RxFrame::new(vec![0x04]);
            } else {
                card.state = TypeAState::Active;
                reply = RxFrame::new(vec![card.sak.0]);
            }
        }
        reply
    }

    fn halt_a(&mut self) {
        for card in self.type_a.iter_mut().filter(|c| c.state == TypeAState::Active) {
            card.state = TypeAState::Halted;
        }
    }

    fn rats(&self) -> RxFrame {
        self.type_a
            .iter()
            .find(|c| c.state == TypeAState::Active && c.sak.supports_iso14443_4())
            .map(|c| RxFrame::new(c.ats.clone()))
            .unwrap_or_default()
    }

    fn start_inventory(&mut self, tx: &[u8]) -> RxFrame {
        let flags = tx[0];
        let mut idx = 2;
        let afi = if flags & 0x10 != 0 {
            idx += 1;
            tx.get(2).copied()
        } else {
            None
        };
        let mask_len = tx.get(idx).copied().unwrap_or(0) as usize;
        self.round = Some(InventoryRound {
            mask: tx.get(idx + 1..).unwrap_or(&[]).to_vec(),
            mask_len,
            afi,
            sixteen_slots: flags & 0x20 == 0,
        });
        self.slot = 0;
        self.slot_answer()
    }

    fn slot_answer(&self) -> RxFrame {
        let Some(round) = &self.round else {
            return RxFrame::default();
        };
        let answers: Vec<&SimulatedVicinity> = self
            .vicinity
            .iter()
            .filter(|c| !c.quiet)
            .filter(|c| round.afi.is_none_or(|afi| afi == 0 || afi == c.afi))
            .filter(|c| c.matches_mask(&round.mask, round.mask_len))
            .filter(|c| !round.sixteen_slots || c.slot_for(round.mask_len) == self.slot)
            .collect();
        match answers.as_slice() {
            [] => RxFrame::default(),
            [card] => {
                let mut out = vec![0x00, card.dsfid];
                out.extend_from_slice(card.uid.as_bytes());
                RxFrame::new(out)
            }
            _ => RxFrame::with_collision(Vec::new(), 0x20),
        }
    }

    fn vicinity_command(&mut self, tx: &[u8]) -> RxFrame {
        let flags = tx[0];
        let cmd = tx[1];
        let addressed = flags & 0x20 != 0;
        let (card, rest) = if addressed {
            let Some(uid) = tx.get(2..10) else {
                return RxFrame::default();
            };
            let card = self.vicinity.iter_mut().find(|c| c.uid.as_bytes() == uid);
            (card, &tx[10..])
        } else {
            let card = self.vicinity.iter_mut().find(|c| !c.quiet);
            (card, &tx[2..])
        };
        let Some(card) = card else {
            return RxFrame::default();
        };

        let block = rest.first().copied().unwrap_or(0) as usize;
        let in_range = block < card.blocks.len();
        match cmd {
            0x02 => {
                card.quiet = true;
                RxFrame::default()
            }
            _ if !in_range => RxFrame::new(vec![0x01, 0x10]),
            0x20 => {
                let mut out = vec![0x00];
                out.extend_from_slice(&card.blocks[block]);
                RxFrame::new(out)
            }
            0x21 if card.locked[block] => RxFrame::new(vec![0x01, 0x12]),
            0x21 => {
                for (dst, src) in card.blocks[block].iter_mut().zip(rest.get(1..).unwrap_or(&[])) {
                    *dst = *src;
                }
                RxFrame::new(vec![0x00])
            }
            0x22 => {
                card.locked[block] = true;
                RxFrame::new(vec![0x00])
            }
            _ => RxFrame::new(vec![0x01, 0x01]),
        }
    }
}

fn bit_of(bytes: &[u8], bit: usize) -> u8 {
    bytes.get(bit / 8).map_or(0, |b| (b >> (bit % 8)) & 1)
}

/// First bit in `from..to` where the answers disagree.
fn first_difference<const N: usize>(answers: &[[u8; N]], from: usize, to: usize) -> Option<usize> {
    let first = answers.first()?;
    (from..to).find(|&bit| answers.iter().any(|a| bit_of(a, bit) != bit_of(first, bit)))
}

impl Transceiver for SimulatedField {
    fn transceive(
        &mut self,
        tx: &[u8],
        tx_bits: u8,
        _rx_capacity: usize,
        _crc: CrcMode,
    ) -> Result<RxFrame> {
        self.sent.push(tx.to_vec());
        self.round = None;
        self.slot_open = false;
        let frame = match tx {
            [] => RxFrame::default(),
            [0x26] if tx_bits == 7 => self.request_a(false),
            [0x52] if tx_bits == 7 => self.request_a(true),
            [0x50, 0x00] => {
                self.halt_a();
                RxFrame::default()
            }
            [0xE0, _] => self.rats(),
            [sel, _, ..] if SEL_CODES.contains(sel) => self.anticollision_a(tx),
            [flags, 0x01, ..] if flags & 0x04 != 0 => self.start_inventory(tx),
            [_, 0x02 | 0x20 | 0x21 | 0x22, ..] => self.vicinity_command(tx),
            _ => RxFrame::default(),
        };
        Ok(frame)
    }

    fn receive(&mut self, _rx_capacity: usize) -> Result<RxFrame> {
        if !self.slot_open {
            return Ok(RxFrame::default());
        }
        self.slot_open = false;
        Ok(self.slot_answer())
    }

    fn write_register(&mut self, reg: Register, value: u8) -> Result<()> {
        if let Some(r) = self.registers.get_mut(reg.address() as usize) {
            *r = value;
        }
        Ok(())
    }

    fn read_register(&mut self, reg: Register) -> Result<u8> {
        Ok(self.register(reg))
    }

    fn direct_command(&mut self, cmd: DirectCommand) -> Result<()> {
        if cmd == DirectCommand::TransmitNextSlot && self.round.is_some() {
            self.slot += 1;
            self.slot_open = true;
        }
        Ok(())
    }

    fn delay_ms(&mut self, ms: u64) {
        self.delay_total_ms += ms;
    }
}
