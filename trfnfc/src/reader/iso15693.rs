// trfnfc/src/reader/iso15693.rs
//! ISO15693 (vicinity cards): inventory, 16-slot anticollision and single
//! block access.

use derive_more::Display;
use log::{debug, warn};

use crate::constants::{
    ISO15693_MAX_CARDS, ISO_CONTROL_15693_HIGH_1SUB_1OUT4, MOD_CTRL_MOD_ASK_10,
    MOD_CTRL_SYS_CLK_6_78MHZ, REGULATOR_CTRL_AUTO_REG, STATUS_CTRL_5V_OPERATION,
    STATUS_CTRL_RF_ON, STATUS_CTRL_RF_PWR_FULL,
};
use crate::transport::link::{CrcMode, RxFrame, Transceiver};
use crate::transport::registers::Register;
use crate::types::VicinityUid;
use crate::{Error, Result};

const CMD_INVENTORY: u8 = 0x01;
const CMD_STAY_QUIET: u8 = 0x02;
const CMD_READ_SINGLE_BLOCK: u8 = 0x20;
const CMD_WRITE_SINGLE_BLOCK: u8 = 0x21;
const CMD_LOCK_BLOCK: u8 = 0x22;

// request flags
const FLAG_SUBCARRIER: u8 = 0x01;
const FLAG_DATA_RATE: u8 = 0x02;
const FLAG_INVENTORY: u8 = 0x04;
const FLAG_AFI: u8 = 0x10;
const FLAG_ADDRESSED: u8 = 0x20;
const FLAG_ONE_SLOT: u8 = 0x20;
const FLAG_OPTION: u8 = 0x40;
// response flags
const FLAG_ERROR: u8 = 0x01;

/// Inventory answer: flags, DSFID and the 8-byte UID.
const INVENTORY_RESPONSE_LEN: usize = 10;
const SLOTS: u8 = 16;
/// Read buffer size for block reads.
const BLOCK_READ_CAPACITY: usize = 32;
const ACK_CAPACITY: usize = 2;
/// Mask length from which no further cascading happens.
const CASCADE_LIMIT: u8 = 4;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subcarrier {
    #[default]
    Single,
    Double,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataRate {
    Low,
    #[default]
    High,
}

/// Air interface options shared by every inventory request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Iso15693Config {
    pub subcarrier: Subcarrier,
    pub data_rate: DataRate,
}

impl Iso15693Config {
    fn flags(&self) -> u8 {
        let mut f = FLAG_INVENTORY;
        if self.subcarrier == Subcarrier::Double {
            f |= FLAG_SUBCARRIER;
        }
        if self.data_rate == DataRate::High {
            f |= FLAG_DATA_RATE;
        }
        f
    }
}

/// One card answer to an inventory request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InventoryResponse {
    pub flags: u8,
    pub dsfid: u8,
    pub uid: VicinityUid,
}

impl InventoryResponse {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != INVENTORY_RESPONSE_LEN {
            return Err(Error::InvalidLength {
                expected: INVENTORY_RESPONSE_LEN,
                actual: data.len(),
            });
        }
        Ok(Self {
            flags: data[0],
            dsfid: data[1],
            uid: VicinityUid::try_from(&data[2..])?,
        })
    }
}

/// A card resolved by the anticollision scan and the slot it answered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FoundCard {
    pub uid: VicinityUid,
    pub slot: u8,
}

/// Bounded table of resolved cards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardTable {
    cards: Vec<FoundCard>,
    capacity: usize,
}

impl Default for CardTable {
    fn default() -> Self {
        Self::with_capacity(ISO15693_MAX_CARDS)
    }
}

impl CardTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cards: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn cards(&self) -> &[FoundCard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.cards.len() >= self.capacity
    }

    pub fn contains(&self, uid: &VicinityUid) -> bool {
        self.cards.iter().any(|c| &c.uid == uid)
    }

    pub fn push(&mut self, card: FoundCard) -> Result<()> {
        if self.is_full() {
            return Err(Error::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.cards.push(card);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }
}

/// Register setup for high data rate, one subcarrier, 1-out-of-4 coding,
/// with the field switched on at full power.
pub fn setup_registers<T: Transceiver + ?Sized>(trf: &mut T) -> Result<()> {
    trf.write_register(
        Register::ModulatorControl,
        MOD_CTRL_SYS_CLK_6_78MHZ | MOD_CTRL_MOD_ASK_10,
    )?;
    trf.write_register(Register::RegulatorControl, REGULATOR_CTRL_AUTO_REG)?;
    trf.write_register(
        Register::ChipStatusControl,
        STATUS_CTRL_RF_ON | STATUS_CTRL_RF_PWR_FULL | STATUS_CTRL_5V_OPERATION,
    )?;
    trf.write_register(Register::IsoControl, ISO_CONTROL_15693_HIGH_1SUB_1OUT4)?;
    Ok(())
}

fn inventory_request<T: Transceiver + ?Sized>(
    trf: &mut T,
    req: &[u8],
    sixteen_slots: bool,
) -> Result<Option<InventoryResponse>> {
    let mut rx = trf.transceive(req, 0, INVENTORY_RESPONSE_LEN, CrcMode::BOTH)?;
    if sixteen_slots {
        let mut slot = 1;
        while rx.len() != INVENTORY_RESPONSE_LEN && slot < SLOTS {
            rx = trf.next_slot(INVENTORY_RESPONSE_LEN)?;
            slot += 1;
        }
    }
    if rx.len() != INVENTORY_RESPONSE_LEN {
        return Ok(None);
    }
    let resp = InventoryResponse::parse(&rx.bytes)?;
    debug!("inventory -> {}", resp.uid.to_hex());
    Ok(Some(resp))
}

/// Inventory without AFI and an empty mask. With `sixteen_slots` the
/// remaining slots are scanned until the first card answers.
pub fn inventory<T: Transceiver + ?Sized>(
    trf: &mut T,
    config: &Iso15693Config,
    sixteen_slots: bool,
) -> Result<Option<InventoryResponse>> {
    let mut flags = config.flags();
    if !sixteen_slots {
        flags |= FLAG_ONE_SLOT;
    }
    inventory_request(trf, &[flags, CMD_INVENTORY, 0x00], sixteen_slots)
}

/// Inventory restricted to cards of one application family.
pub fn inventory_afi<T: Transceiver + ?Sized>(
    trf: &mut T,
    config: &Iso15693Config,
    afi: u8,
    sixteen_slots: bool,
) -> Result<Option<InventoryResponse>> {
    let mut flags = config.flags() | FLAG_AFI;
    if !sixteen_slots {
        flags |= FLAG_ONE_SLOT;
    }
    inventory_request(trf, &[flags, CMD_INVENTORY, afi, 0x00], sixteen_slots)
}

/// Inventory request bytes for a 16-slot round with the given mask.
pub fn anticollision_request(config: &Iso15693Config, mask: &[u8], mask_len: u8) -> Vec<u8> {
    let mask_bytes = (mask_len as usize).div_ceil(8);
    let mut req = vec![config.flags(), CMD_INVENTORY, mask_len];
    req.extend(mask.iter().copied().chain(std::iter::repeat(0)).take(mask_bytes));
    req
}

/// Mask extended by the 4-bit slot number in which a collision happened.
fn extend_mask(mask: &[u8], mask_len: u8, slot: u8) -> Vec<u8> {
    let mut out = mask.to_vec();
    let bit = mask_len as usize;
    out.resize((bit + 4).div_ceil(8), 0);
    out[bit / 8] |= (slot & 0x0F) << (bit % 8);
    out
}

/// Scan all 16 slots for `mask`, storing every clean answer in `table`.
///
/// Slots with a collision are scanned again with the mask extended by the
/// slot number, but only from the top level (`mask_len` below 4): cards that
/// still collide after that are not resolved. Returns `true` when this call,
/// including its rescans, found at least one card.
pub fn anticollision_16_slots<T: Transceiver + ?Sized>(
    trf: &mut T,
    config: &Iso15693Config,
    mask: &[u8],
    mask_len: u8,
    table: &mut CardTable,
) -> Result<bool> {
    let req = anticollision_request(config, mask, mask_len);
    let mut rx = trf.transceive(&req, 0, INVENTORY_RESPONSE_LEN, CrcMode::BOTH)?;

    let mut found = false;
    let mut collided = Vec::new();
    for slot in 0..SLOTS {
        if slot > 0 {
            rx = trf.next_slot(INVENTORY_RESPONSE_LEN)?;
        }
        found |= record_slot(&rx, slot, table, &mut collided)?;
    }

    if mask_len < CASCADE_LIMIT {
        for slot in collided {
            let sub = extend_mask(mask, mask_len, slot);
            debug!("rescan slot {} with mask length {}", slot, mask_len + 4);
            found |= anticollision_16_slots(trf, config, &sub, mask_len + 4, table)?;
        }
    } else if !collided.is_empty() {
        warn!(
            "{} slot(s) still colliding at mask length {}",
            collided.len(),
            mask_len
        );
    }
    Ok(found)
}

fn record_slot(
    rx: &RxFrame,
    slot: u8,
    table: &mut CardTable,
    collided: &mut Vec<u8>,
) -> Result<bool> {
    if rx.collision.is_some() {
        collided.push(slot);
        return Ok(false);
    }
    if rx.len() != INVENTORY_RESPONSE_LEN {
        return Ok(false);
    }
    let resp = InventoryResponse::parse(&rx.bytes)?;
    if resp.flags & FLAG_ERROR != 0 {
        debug!("slot {}: error flag set", slot);
        return Ok(false);
    }
    if table.contains(&resp.uid) {
        return Ok(false);
    }
    if table.is_full() {
        warn!(
            "card table full ({}), {} in slot {} left out",
            table.len(),
            resp.uid.to_hex(),
            slot
        );
        return Ok(false);
    }
    table.push(FoundCard {
        uid: resp.uid,
        slot,
    })?;
    debug!("slot {}: {}", slot, resp.uid.to_hex());
    Ok(true)
}

/// Silence one card until it is selected or the field drops.
pub fn stay_quiet<T: Transceiver + ?Sized>(trf: &mut T, uid: &VicinityUid) -> Result<()> {
    let mut cmd = vec![FLAG_ADDRESSED | FLAG_DATA_RATE, CMD_STAY_QUIET];
    cmd.extend_from_slice(uid.as_bytes());
    trf.transceive(&cmd, 0, 0, CrcMode { tx: true, rx: false })?;
    Ok(())
}

/// Build a block command, addressed when `uid` is given.
fn block_command(cmd: u8, uid: Option<&VicinityUid>, block: u8, data: &[u8]) -> Vec<u8> {
    let mut flags = FLAG_OPTION | FLAG_DATA_RATE;
    if uid.is_some() {
        flags |= FLAG_ADDRESSED;
    }
    let mut out = Vec::with_capacity(11 + data.len());
    out.push(flags);
    out.push(cmd);
    if let Some(uid) = uid {
        out.extend_from_slice(uid.as_bytes());
    }
    out.push(block);
    out.extend_from_slice(data);
    out
}

fn block_exchange<T: Transceiver + ?Sized>(
    trf: &mut T,
    cmd: Vec<u8>,
    rx_capacity: usize,
) -> Result<Vec<u8>> {
    let rx = trf.transceive(&cmd, 0, rx_capacity, CrcMode::BOTH)?;
    match rx.bytes.first() {
        None => Err(Error::Timeout),
        Some(flags) if flags & FLAG_ERROR != 0 => Err(Error::Protocol(format!(
            "card error code {:#04x}",
            rx.bytes.get(1).copied().unwrap_or(0)
        ))),
        Some(_) => Ok(rx.bytes),
    }
}

/// Read one block. `uid` selects addressed mode; without it the command
/// goes to whichever card is in the field. The answer starts with the
/// response flags.
pub fn read_single_block<T: Transceiver + ?Sized>(
    trf: &mut T,
    uid: Option<&VicinityUid>,
    block: u8,
) -> Result<Vec<u8>> {
    block_exchange(
        trf,
        block_command(CMD_READ_SINGLE_BLOCK, uid, block, &[]),
        BLOCK_READ_CAPACITY,
    )
}

/// Write one block and return the card's short acknowledgement.
pub fn write_single_block<T: Transceiver + ?Sized>(
    trf: &mut T,
    uid: Option<&VicinityUid>,
    block: u8,
    data: &[u8],
) -> Result<Vec<u8>> {
    block_exchange(
        trf,
        block_command(CMD_WRITE_SINGLE_BLOCK, uid, block, data),
        ACK_CAPACITY,
    )
}

/// Permanently lock one block.
pub fn lock_block<T: Transceiver + ?Sized>(
    trf: &mut T,
    uid: Option<&VicinityUid>,
    block: u8,
) -> Result<Vec<u8>> {
    block_exchange(
        trf,
        block_command(CMD_LOCK_BLOCK, uid, block, &[]),
        ACK_CAPACITY,
    )
}
