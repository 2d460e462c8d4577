// trfnfc/src/types.rs

use crate::Error;
use std::convert::TryFrom;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// ISO14443-A UID (single, double or triple size: 4, 7 or 10 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Uid {
    bytes: [u8; 10],
    len: u8,
}

impl Uid {
    /// Valid UID sizes in bytes.
    pub const SIZES: [usize; 3] = [4, 7, 10];

    pub fn new(bytes: &[u8]) -> crate::Result<Self> {
        Self::try_from(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of cascade levels needed to select this UID.
    pub fn cascade_levels(&self) -> usize {
        match self.len {
            4 => 1,
            7 => 2,
            _ => 3,
        }
    }

    pub fn to_hex(&self) -> String {
        crate::utils::bytes_to_hex(self.as_bytes())
    }
}

impl TryFrom<&[u8]> for Uid {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if !Self::SIZES.contains(&bytes.len()) {
            return Err(Error::InvalidLength {
                expected: 4,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 10];
        arr[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            bytes: arr,
            len: bytes.len() as u8,
        })
    }
}

/// ATQA, the two-byte answer to REQA/WUPA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Atqa([u8; 2]);

impl Atqa {
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 2] {
        &self.0
    }

    /// Any of the low five bits announces bit frame anticollision.
    pub fn supports_bit_frame_anticollision(&self) -> bool {
        (self.0[0] & 0x1F) != 0
    }
}

/// SAK, the select acknowledge returned for each cascade level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sak(pub u8);

impl Sak {
    const CASCADE_BIT: u8 = 0x04;
    const ISO14443_4_BIT: u8 = 0x20;

    /// Bit 2 set means another cascade level follows.
    pub fn uid_incomplete(&self) -> bool {
        self.0 & Self::CASCADE_BIT != 0
    }

    pub fn supports_iso14443_4(&self) -> bool {
        !self.uid_incomplete() && self.0 & Self::ISO14443_4_BIT != 0
    }
}

/// PUPI (Pseudo-Unique PICC Identifier) of an ISO14443-B card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pupi([u8; 4]);

impl Pupi {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        crate::utils::bytes_to_hex(&self.0)
    }
}

impl TryFrom<&[u8]> for Pupi {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 4] = bytes.try_into().map_err(|_| Error::InvalidLength {
            expected: 4,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

/// ATQB, the answer to REQB/WUPB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Atqb {
    pub pupi: Pupi,
    pub application_data: [u8; 4],
    pub protocol_info: [u8; 3],
}

impl Atqb {
    /// First byte of every ATQB frame.
    pub const CODE: u8 = 0x50;

    /// Parse `50 PUPI[4] APP[4] PROTO[3]` (CRC already stripped).
    pub fn parse(data: &[u8]) -> crate::Result<Self> {
        crate::protocol::parser::expect_response_code(data, Self::CODE)?;
        let pupi = Pupi::try_from(crate::protocol::parser::slice_at(data, 1, 4)?)?;
        let mut application_data = [0u8; 4];
        application_data.copy_from_slice(crate::protocol::parser::slice_at(data, 5, 4)?);
        let mut protocol_info = [0u8; 3];
        protocol_info.copy_from_slice(crate::protocol::parser::slice_at(data, 9, 3)?);
        Ok(Self {
            pupi,
            application_data,
            protocol_info,
        })
    }
}

/// ISO15693 UID (8 bytes, LSB first on the air)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VicinityUid([u8; 8]);

impl VicinityUid {
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Low nibble of byte `index / 2`, or the high nibble for odd indexes.
    /// Used to pick the anticollision slot for a given mask length.
    pub fn nibble(&self, index: usize) -> u8 {
        let byte = self.0[index / 2];
        if index % 2 == 0 { byte & 0x0F } else { byte >> 4 }
    }

    pub fn to_hex(&self) -> String {
        crate::utils::bytes_to_hex(&self.0)
    }
}

impl TryFrom<&[u8]> for VicinityUid {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 8] = bytes.try_into().map_err(|_| Error::InvalidLength {
            expected: 8,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

/// NFCID2 of an NFC-F (Type F) device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Nfcid2([u8; 8]);

impl Nfcid2 {
    /// `01 FE` prefix marks an NFC-DEP capable device.
    pub const DEFAULT: Self = Self([0x01, 0xFE, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33]);

    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        crate::utils::bytes_to_hex(&self.0)
    }
}

impl Default for Nfcid2 {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<&[u8]> for Nfcid2 {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 8] = bytes.try_into().map_err(|_| Error::InvalidLength {
            expected: 8,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

/// NFCID3 used during NFC-DEP attribute exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Nfcid3([u8; 10]);

impl Nfcid3 {
    pub const DEFAULT: Self = Self([0x01, 0xFE, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09]);

    pub fn from_bytes(bytes: [u8; 10]) -> Self {
        Self(bytes)
    }

    /// NFCID3i built from an NFCID2 padded with two zero bytes.
    pub fn from_nfcid2(id: &Nfcid2) -> Self {
        let mut arr = [0u8; 10];
        arr[..8].copy_from_slice(id.as_bytes());
        Self(arr)
    }

    pub fn as_bytes(&self) -> &[u8; 10] {
        &self.0
    }
}

impl Default for Nfcid3 {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<&[u8]> for Nfcid3 {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 10] = bytes.try_into().map_err(|_| Error::InvalidLength {
            expected: 10,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}
