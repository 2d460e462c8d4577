// trfnfc/src/reader/iso14443a.rs

use derive_more::Display;
use log::{debug, trace};

use crate::constants::{ISO_CONTROL_14443A_106K, MOD_CTRL_MOD_OOK_100, MOD_CTRL_SYS_CLK_6_78MHZ};
use crate::reader::anticol::{AnticolState, LEVEL_BITS, MAX_LEVELS, collision_bits};
use crate::transport::link::{CrcMode, Transceiver};
use crate::types::{Atqa, Sak, Uid};
use crate::{Error, Result};

/// Guard time before every anticollision frame.
const ANTICOL_GUARD_MS: u64 = 1;
const HLTA: [u8; 2] = [0x50, 0x00];

/// Short frame used to wake cards up.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum WakeCommand {
    /// Wake only cards in the IDLE state.
    #[default]
    Reqa = 0x26,
    /// Also wake cards that were halted.
    Wupa = 0x52,
}

/// Outcome of a REQA/WUPA round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WakeResult {
    /// At least one card answered that supports bit frame anticollision.
    pub present: bool,
    /// Only set when a clean two-byte answer came back.
    pub atqa: Option<Atqa>,
}

/// A card that went through SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Selection {
    pub uid: Uid,
    pub sak: Sak,
}

/// ISO14443-A 106 kbit/s register setup.
pub fn setup_registers<T: Transceiver + ?Sized>(trf: &mut T) -> Result<()> {
    super::setup_iso14443(
        trf,
        ISO_CONTROL_14443A_106K,
        MOD_CTRL_SYS_CLK_6_78MHZ | MOD_CTRL_MOD_OOK_100,
    )
}

/// Send REQA or WUPA and judge the answer.
///
/// Colliding ATQAs still count as a card when the collision shows a 1 in
/// the low five bits.
pub fn request<T: Transceiver + ?Sized>(trf: &mut T, cmd: WakeCommand) -> Result<WakeResult> {
    let rx = trf.transceive(&[cmd as u8], 7, 2, CrcMode::NONE)?;

    if rx.len() == 2 {
        let atqa = Atqa::from_bytes([rx.bytes[0], rx.bytes[1]]);
        debug!("{} -> atqa {:02x}{:02x}", cmd, rx.bytes[1], rx.bytes[0]);
        return Ok(WakeResult {
            present: atqa.supports_bit_frame_anticollision(),
            atqa: Some(atqa),
        });
    }
    if rx.is_empty() {
        return Ok(WakeResult::default());
    }

    let low_bits_set = rx.bytes[0] & 0x1F != 0;
    let present = match rx.collision.map(collision_bits) {
        Some(Ok(pos)) if pos > 5 => low_bits_set,
        Some(Ok(pos)) if pos > 0 => true,
        _ => false,
    };
    debug!("{} -> collided atqa, card present: {}", cmd, present);
    Ok(WakeResult {
        present,
        atqa: None,
    })
}

/// Send HLTA. The card does not answer.
pub fn halt<T: Transceiver + ?Sized>(trf: &mut T) -> Result<()> {
    trf.transceive(&HLTA, 0, 0, CrcMode { tx: true, rx: false })?;
    Ok(())
}

/// Select a card whose UID is already known, waking it with WUPA.
pub fn select<T: Transceiver + ?Sized>(trf: &mut T, uid: &Uid) -> Result<Option<Sak>> {
    let mut state = AnticolState::for_uid(uid);
    if !request(trf, WakeCommand::Wupa)?.present {
        return Ok(None);
    }
    Ok(run_anticollision(trf, &mut state)?.map(|sel| sel.sak))
}

/// Resolve one card from `state`, walking the 0 branch at each collision.
///
/// `Ok(None)` means no card ended up selected: nobody answered, or a SELECT
/// got a malformed reply.
pub fn run_anticollision<T: Transceiver + ?Sized>(
    trf: &mut T,
    state: &mut AnticolState,
) -> Result<Option<Selection>> {
    let mut level = 0;
    let mut sak = Sak::default();

    while level < MAX_LEVELS {
        let (cmd, bits) = state.command(level);
        trf.delay_ms(ANTICOL_GUARD_MS);

        if state.valid_bits(level) < LEVEL_BITS {
            let rx = trf.transceive(&cmd, bits, 5, CrcMode::NONE)?;
            if rx.is_empty() {
                debug!("anticollision level {}: no answer", level + 1);
                return Ok(None);
            }
            let collision = match rx.collision {
                Some(pos) => collision_bits(pos)?,
                None => LEVEL_BITS,
            };
            trace!(
                "anticollision level {}: {} bits agree",
                level + 1,
                collision
            );
            state.merge(level, &rx.bytes, collision)?;
        } else {
            let rx = trf.transceive(&cmd, 0, 5, CrcMode::BOTH)?;
            if rx.len() != 1 {
                debug!("select level {}: bad answer length {}", level + 1, rx.len());
                state.clear();
                return Ok(None);
            }
            sak = Sak(rx.bytes[0]);
            if !sak.uid_incomplete() {
                break;
            }
            level += 1;
            if level == MAX_LEVELS {
                return Err(Error::Protocol("uid longer than three cascade levels".into()));
            }
        }
    }

    if state.bit_pos() == 0 || state.bit_pos() % LEVEL_BITS != 0 {
        return Ok(None);
    }
    let uid = state.uid()?;
    debug!("selected {} sak {:#04x}", uid.to_hex(), sak.0);
    Ok(Some(Selection { uid, sak }))
}

/// Enumerates every card in the field one at a time.
///
/// Keeps the anticollision walk between calls: `select_first` starts a new
/// walk, each `select_next` resumes at the latest unexplored collision.
/// Halt every selected card before asking for the next one.
#[derive(Debug, Default)]
pub struct Iso14443a {
    state: AnticolState,
}

impl Iso14443a {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AnticolState {
        &self.state
    }

    pub fn select_first<T: Transceiver + ?Sized>(
        &mut self,
        trf: &mut T,
        cmd: WakeCommand,
    ) -> Result<Option<Selection>> {
        self.state.reset();
        if !request(trf, cmd)?.present {
            return Ok(None);
        }
        run_anticollision(trf, &mut self.state)
    }

    /// `Ok(None)` once every branch of the walk was visited.
    pub fn select_next<T: Transceiver + ?Sized>(
        &mut self,
        trf: &mut T,
        cmd: WakeCommand,
    ) -> Result<Option<Selection>> {
        if !self.state.backtrack() {
            return Ok(None);
        }
        if !request(trf, cmd)?.present {
            return Ok(None);
        }
        run_anticollision(trf, &mut self.state)
    }
}
