// trfnfc/src/hci/bond.rs
//! Discovered peripherals and the keys obtained when pairing with them.

use log::{debug, warn};

use super::frame::HCI_COMMAND_PACKET;
use crate::constants::BLE_MAX_SLAVES;
use crate::protocol::parser::{byte_at, slice_at};
use crate::utils::bytes_to_hex;
use crate::{Error, Result};

pub const BD_ADDR_LEN: usize = 6;
pub const LTK_MAX_LEN: usize = 16;
pub const DEVICE_NAME_MAX_LEN: usize = 32;
pub const GAP_BOND_OPCODE: u16 = 0xFE0F;

/// Event type of a scan response inside a device-information event.
const SCAN_RESPONSE: u8 = 0x04;
/// Offset of the security block in an authentication-done event.
const AUTH_KEYS_OFFSET: usize = 37;

/// Long term key material handed out at the end of pairing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LtkData {
    pub authenticated: bool,
    pub ltk: Vec<u8>,
    pub div: [u8; 2],
    pub rand: [u8; 8],
}

impl LtkData {
    pub fn from_authentication_done(msg: &[u8]) -> Result<Self> {
        let base = AUTH_KEYS_OFFSET;
        let authenticated = byte_at(msg, base)? != 0;
        let size = byte_at(msg, base + 1)? as usize;
        if size > LTK_MAX_LEN {
            return Err(Error::InvalidLength {
                expected: LTK_MAX_LEN,
                actual: size,
            });
        }
        let ltk = slice_at(msg, base + 2, size)?.to_vec();
        let keys_end = base + 2 + size;
        let mut div = [0u8; 2];
        div.copy_from_slice(slice_at(msg, keys_end, 2)?);
        let mut rand = [0u8; 8];
        rand.copy_from_slice(slice_at(msg, keys_end + 2, 8)?);
        Ok(Self {
            authenticated,
            ltk,
            div,
            rand,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BleDevice {
    pub addr_type: u8,
    pub addr: [u8; BD_ADDR_LEN],
    pub name: String,
    pub ltk: Option<LtkData>,
}

impl BleDevice {
    /// Read a device from a device-information event. Only scan responses
    /// carry the name; other report types yield `Ok(None)`.
    pub fn from_device_info(msg: &[u8]) -> Result<Option<Self>> {
        if byte_at(msg, 6)? != SCAN_RESPONSE {
            return Ok(None);
        }
        let addr_type = byte_at(msg, 7)?;
        let mut addr = [0u8; BD_ADDR_LEN];
        addr.copy_from_slice(slice_at(msg, 8, BD_ADDR_LEN)?);
        let name_len = (byte_at(msg, 16)? as usize)
            .saturating_sub(1)
            .min(DEVICE_NAME_MAX_LEN);
        let name = String::from_utf8_lossy(slice_at(msg, 18, name_len)?).into_owned();
        Ok(Some(Self {
            addr_type,
            addr,
            name,
            ltk: None,
        }))
    }

    pub fn is_bonded(&self) -> bool {
        self.ltk.is_some()
    }
}

/// GAP bond request restoring saved keys on connection `handle`.
pub fn bond_command(handle: u16, keys: &LtkData) -> Vec<u8> {
    let mut cmd = vec![HCI_COMMAND_PACKET];
    cmd.extend_from_slice(&GAP_BOND_OPCODE.to_le_bytes());
    // the module expects the length of a full 16-byte key here
    cmd.push(30);
    cmd.extend_from_slice(&handle.to_le_bytes());
    cmd.push(keys.authenticated as u8);
    cmd.extend_from_slice(&keys.ltk);
    cmd.extend_from_slice(&keys.div);
    cmd.extend_from_slice(&keys.rand);
    cmd.push(keys.ltk.len() as u8);
    cmd
}

/// Fixed-size table of discovered peripherals.
#[derive(Debug, Clone, Default)]
pub struct DeviceTable {
    devices: Vec<BleDevice>,
}

impl DeviceTable {
    pub const CAPACITY: usize = BLE_MAX_SLAVES;

    pub fn new() -> Self {
        Self {
            devices: Vec::with_capacity(Self::CAPACITY),
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.devices.len() >= Self::CAPACITY
    }

    /// Add a device; one already present by address is updated in place.
    /// Returns its slot.
    pub fn insert(&mut self, device: BleDevice) -> Result<usize> {
        if let Some(idx) = self.position(&device.addr) {
            self.devices[idx].name = device.name;
            self.devices[idx].addr_type = device.addr_type;
            return Ok(idx);
        }
        if self.is_full() {
            warn!("device table full, {} ignored", bytes_to_hex(&device.addr));
            return Err(Error::CapacityExceeded {
                capacity: Self::CAPACITY,
            });
        }
        debug!("found {} '{}'", bytes_to_hex(&device.addr), device.name);
        self.devices.push(device);
        Ok(self.devices.len() - 1)
    }

    pub fn get(&self, idx: usize) -> Option<&BleDevice> {
        self.devices.get(idx)
    }

    pub fn position(&self, addr: &[u8; BD_ADDR_LEN]) -> Option<usize> {
        self.devices.iter().position(|d| &d.addr == addr)
    }

    /// Attach pairing keys to the device in `idx`.
    pub fn bond(&mut self, idx: usize, ltk: LtkData) -> Result<()> {
        let dev = self
            .devices
            .get_mut(idx)
            .ok_or(Error::InvalidState("no device in slot"))?;
        dev.ltk = Some(ltk);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &BleDevice> {
        self.devices.iter()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }
}
