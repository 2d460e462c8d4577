// trfnfc/src/reader/iso14443b.rs

use derive_more::Display;
use log::debug;

use crate::constants::{ISO_CONTROL_14443B_106K, MOD_CTRL_SYS_CLK_6_78MHZ};
use crate::transport::link::{CrcMode, RxFrame, Transceiver};
use crate::types::{Atqb, Pupi};
use crate::Result;

const APF: u8 = 0x05;
const ATTRIB: u8 = 0x1D;
const HLTB: u8 = 0x50;
const ATQB_LEN: usize = 12;

/// REQB or WUPB, as the PARAM byte flag.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum WakeCommandB {
    #[default]
    Reqb = 0x00,
    Wupb = 0x08,
}

/// Number of anticollision slots, encoded as N in the REQB PARAM byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotCount(u8);

impl SlotCount {
    pub const ONE: Self = Self(0);
    pub const SIXTEEN: Self = Self(4);

    /// Codes above 4 are treated as a single slot.
    pub fn from_code(code: u8) -> Self {
        Self(if code > 4 { 0 } else { code })
    }

    pub fn code(self) -> u8 {
        self.0
    }

    pub fn slots(self) -> u8 {
        1 << self.0
    }
}

/// ISO14443-B 106 kbit/s register setup.
pub fn setup_registers<T: Transceiver + ?Sized>(trf: &mut T) -> Result<()> {
    super::setup_iso14443(trf, ISO_CONTROL_14443B_106K, MOD_CTRL_SYS_CLK_6_78MHZ)
}

fn is_atqb(rx: &RxFrame) -> bool {
    rx.bytes.first() == Some(&Atqb::CODE)
}

/// Send REQB/WUPB and, until an ATQB shows up, walk the remaining slots
/// with Slot-MARKER commands.
pub fn request<T: Transceiver + ?Sized>(
    trf: &mut T,
    cmd: WakeCommandB,
    afi: u8,
    slots: SlotCount,
) -> Result<Option<Atqb>> {
    let req = [APF, afi, cmd as u8 | slots.code()];
    let mut rx = trf.transceive(&req, 0, ATQB_LEN, CrcMode::BOTH)?;

    let mut slot = 1;
    while !is_atqb(&rx) && slot < slots.slots() {
        rx = slot_marker(trf, slot)?;
        slot += 1;
    }

    if !is_atqb(&rx) {
        return Ok(None);
    }
    let atqb = match Atqb::parse(&rx.bytes) {
        Ok(atqb) => atqb,
        Err(e) => {
            debug!("{} answer in slot {} dropped: {}", cmd, slot - 1, e);
            return Ok(None);
        }
    };
    debug!("{} -> pupi {} in slot {}", cmd, atqb.pupi.to_hex(), slot - 1);
    Ok(Some(atqb))
}

/// Open slot `slot` (1..=15) and listen in it.
pub fn slot_marker<T: Transceiver + ?Sized>(trf: &mut T, slot: u8) -> Result<RxFrame> {
    let apn = (slot & 0x0F) << 4 | APF;
    trf.transceive(&[apn], 0, 0, CrcMode { tx: true, rx: false })?;
    trf.receive(ATQB_LEN)
}

/// ATTRIB parameters; defaults are the minimum guard times, SOF and EOF
/// required, 256 byte frames at 106 kbit/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttribParams {
    pub tr0: u8,
    pub tr1: u8,
    pub suppress_eof: bool,
    pub suppress_sof: bool,
    pub max_frame_size: u8,
    pub bit_rate_pcd_to_picc: u8,
    pub bit_rate_picc_to_pcd: u8,
    pub protocol_type: u8,
    pub cid: u8,
}

impl Default for AttribParams {
    fn default() -> Self {
        Self {
            tr0: 0,
            tr1: 0,
            suppress_eof: false,
            suppress_sof: false,
            max_frame_size: 8,
            bit_rate_pcd_to_picc: 0,
            bit_rate_picc_to_pcd: 0,
            protocol_type: 1,
            cid: 0,
        }
    }
}

impl AttribParams {
    pub fn encode(&self, pupi: &Pupi) -> [u8; 9] {
        let mut cmd = [0u8; 9];
        cmd[0] = ATTRIB;
        cmd[1..5].copy_from_slice(pupi.as_bytes());
        cmd[5] = (self.tr0 & 0x03) << 6
            | (self.tr1 & 0x03) << 4
            | (self.suppress_eof as u8) << 3
            | (self.suppress_sof as u8) << 2;
        cmd[6] = (self.bit_rate_picc_to_pcd & 0x03) << 6
            | (self.bit_rate_pcd_to_picc & 0x03) << 4
            | (self.max_frame_size & 0x0F);
        cmd[7] = self.protocol_type & 0x0F;
        cmd[8] = self.cid & 0x0F;
        cmd
    }
}

/// Send ATTRIB and return the one-byte answer. `Ok(None)` when the card
/// did not answer with exactly one byte.
pub fn attrib<T: Transceiver + ?Sized>(
    trf: &mut T,
    pupi: &Pupi,
    params: &AttribParams,
) -> Result<Option<u8>> {
    let rx = trf.transceive(&params.encode(pupi), 0, 3, CrcMode::BOTH)?;
    Ok(match rx.bytes.as_slice() {
        [answer] => Some(*answer),
        _ => None,
    })
}

/// Send HLTB. Succeeds when the card acknowledges with a single zero byte.
pub fn halt<T: Transceiver + ?Sized>(trf: &mut T, pupi: &Pupi) -> Result<bool> {
    let mut cmd = [HLTB; 5];
    cmd[1..].copy_from_slice(pupi.as_bytes());
    let rx = trf.transceive(&cmd, 0, 1, CrcMode::BOTH)?;
    Ok(rx.bytes.as_slice() == [0x00])
}
