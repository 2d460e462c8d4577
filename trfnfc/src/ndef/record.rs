// trfnfc/src/ndef/record.rs

use derive_more::Display;
use log::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::{NDEF_ID_MAXSIZE, NDEF_TYPE_MAXSIZE};
use crate::protocol::parser::{be_u32_at, byte_at, slice_at};
use crate::{Error, Result};

/// Bits of the record status byte.
pub mod flags {
    pub const MB: u8 = 0x80;
    pub const ME: u8 = 0x40;
    pub const CF: u8 = 0x20;
    pub const SR: u8 = 0x10;
    pub const IL: u8 = 0x08;
    pub const TNF_MASK: u8 = 0x07;
}

/// Shortest record on the wire: status, type length, short payload length,
/// one type byte and one payload byte.
pub const MIN_RECORD_LEN: usize = 5;

/// Type name format.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Tnf {
    Empty = 0x00,
    #[default]
    WellKnown = 0x01,
    Media = 0x02,
    AbsoluteUri = 0x03,
    External = 0x04,
    Unknown = 0x05,
    Unchanged = 0x06,
}

impl TryFrom<u8> for Tnf {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value & flags::TNF_MASK {
            0x00 => Tnf::Empty,
            0x01 => Tnf::WellKnown,
            0x02 => Tnf::Media,
            0x03 => Tnf::AbsoluteUri,
            0x04 => Tnf::External,
            0x05 => Tnf::Unknown,
            0x06 => Tnf::Unchanged,
            other => return Err(Error::Protocol(format!("reserved tnf {:#x}", other))),
        })
    }
}

/// Well-known record types.
pub mod rtd {
    pub const TEXT: &[u8] = b"T";
    pub const URI: &[u8] = b"U";
    pub const SMART_POSTER: &[u8] = b"Sp";
    pub const ACTION: &[u8] = b"act";
    pub const SIZE: &[u8] = b"s";
    pub const SIGNATURE: &[u8] = b"Sig";
}

/// One NDEF record. SR and IL are derived from the payload and ID lengths
/// when encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NdefRecord {
    pub message_begin: bool,
    pub message_end: bool,
    pub chunked: bool,
    pub tnf: Tnf,
    pub record_type: Vec<u8>,
    pub id: Vec<u8>,
    pub payload: Vec<u8>,
}

fn clamp_field<'a>(field: &'a [u8], max: usize, what: &str) -> &'a [u8] {
    if field.len() > max {
        warn!("ndef {} of {} bytes truncated to {}", what, field.len(), max);
        &field[..max]
    } else {
        field
    }
}

impl NdefRecord {
    /// Single well-known record forming a whole message.
    pub fn well_known(record_type: &[u8], payload: Vec<u8>) -> Self {
        Self {
            message_begin: true,
            message_end: true,
            chunked: false,
            tnf: Tnf::WellKnown,
            record_type: record_type.to_vec(),
            id: Vec::new(),
            payload,
        }
    }

    pub fn is_type(&self, tnf: Tnf, record_type: &[u8]) -> bool {
        self.tnf == tnf && self.record_type == record_type
    }

    fn status_byte(&self) -> u8 {
        let mut status = self.tnf as u8;
        if self.message_begin {
            status |= flags::MB;
        }
        if self.message_end {
            status |= flags::ME;
        }
        if self.chunked {
            status |= flags::CF;
        }
        if self.payload.len() <= u8::MAX as usize {
            status |= flags::SR;
        }
        if !self.id.is_empty() {
            status |= flags::IL;
        }
        status
    }

    /// Encoded size, after type and ID truncation.
    pub fn encoded_len(&self) -> usize {
        let type_len = self.record_type.len().min(NDEF_TYPE_MAXSIZE);
        let id_len = self.id.len().min(NDEF_ID_MAXSIZE);
        let payload_len_field = if self.payload.len() <= u8::MAX as usize { 1 } else { 4 };
        let id_len_field = usize::from(id_len > 0);
        2 + payload_len_field + id_len_field + type_len + id_len + self.payload.len()
    }

    /// Write the record into `buf`, returning the number of bytes used.
    /// Nothing is written when the record does not fit.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize> {
        if self.record_type.is_empty() {
            return Err(Error::Protocol("ndef record without type".into()));
        }
        if self.payload.is_empty() {
            return Err(Error::Protocol("ndef record without payload".into()));
        }
        if self.payload.len() > u32::MAX as usize {
            return Err(Error::CapacityExceeded {
                capacity: u32::MAX as usize,
            });
        }
        let total = self.encoded_len();
        if total > buf.len() {
            return Err(Error::CapacityExceeded { capacity: buf.len() });
        }

        let record_type = clamp_field(&self.record_type, NDEF_TYPE_MAXSIZE, "type");
        let id = clamp_field(&self.id, NDEF_ID_MAXSIZE, "id");
        let status = self.status_byte();

        let mut pos = 0;
        let mut put = |bytes: &[u8]| {
            buf[pos..pos + bytes.len()].copy_from_slice(bytes);
            pos += bytes.len();
        };
        put(&[status, record_type.len() as u8]);
        if status & flags::SR != 0 {
            put(&[self.payload.len() as u8]);
        } else {
            put(&(self.payload.len() as u32).to_be_bytes());
        }
        if status & flags::IL != 0 {
            put(&[id.len() as u8]);
        }
        put(record_type);
        put(id);
        put(&self.payload);
        Ok(pos)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.encoded_len()];
        let n = self.encode_into(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Parse one record from the front of `data`. Returns the record and
    /// the number of bytes it occupied.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let (view, used) = NdefRecordRef::parse(data)?;
        Ok((view.into(), used))
    }
}

/// A record decoded in place: type, ID and payload point into the message
/// buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NdefRecordRef<'a> {
    pub message_begin: bool,
    pub message_end: bool,
    pub chunked: bool,
    pub tnf: Tnf,
    pub record_type: &'a [u8],
    pub id: &'a [u8],
    pub payload: &'a [u8],
}

impl<'a> NdefRecordRef<'a> {
    /// Parse one record from the front of `data`, returning the view and the
    /// number of bytes it occupied.
    pub fn parse(data: &'a [u8]) -> Result<(Self, usize)> {
        if data.len() < MIN_RECORD_LEN {
            return Err(Error::InvalidLength {
                expected: MIN_RECORD_LEN,
                actual: data.len(),
            });
        }
        let status = data[0];
        let type_len = data[1] as usize;
        let mut pos = 2;
        let payload_len = if status & flags::SR != 0 {
            pos += 1;
            byte_at(data, 2)? as usize
        } else {
            pos += 4;
            be_u32_at(data, 2)? as usize
        };
        let id_len = if status & flags::IL != 0 {
            pos += 1;
            byte_at(data, pos - 1)? as usize
        } else {
            0
        };

        let record_type = slice_at(data, pos, type_len)?;
        pos += type_len;
        let id = slice_at(data, pos, id_len)?;
        pos += id_len;
        let payload = slice_at(data, pos, payload_len)?;
        pos += payload_len;

        let view = Self {
            message_begin: status & flags::MB != 0,
            message_end: status & flags::ME != 0,
            chunked: status & flags::CF != 0,
            tnf: Tnf::try_from(status)?,
            record_type: clamp_field(record_type, NDEF_TYPE_MAXSIZE, "type"),
            id: clamp_field(id, NDEF_ID_MAXSIZE, "id"),
            payload,
        };
        Ok((view, pos))
    }

    pub fn is_type(&self, tnf: Tnf, record_type: &[u8]) -> bool {
        self.tnf == tnf && self.record_type == record_type
    }
}

impl From<NdefRecordRef<'_>> for NdefRecord {
    fn from(view: NdefRecordRef<'_>) -> Self {
        Self {
            message_begin: view.message_begin,
            message_end: view.message_end,
            chunked: view.chunked,
            tnf: view.tnf,
            record_type: view.record_type.to_vec(),
            id: view.id.to_vec(),
            payload: view.payload.to_vec(),
        }
    }
}

/// Iterator over the records of a message, see [`records`].
#[derive(Debug, Clone)]
pub struct Records<'a> {
    data: &'a [u8],
    done: bool,
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<NdefRecordRef<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.data.is_empty() {
            return None;
        }
        match NdefRecordRef::parse(self.data) {
            Ok((view, used)) => {
                self.data = &self.data[used..];
                self.done = view.message_end;
                Some(Ok(view))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Walk the records of `data` in place, stopping after the one with ME set.
/// A malformed record is yielded as an error and ends the walk.
pub fn records(data: &[u8]) -> Records<'_> {
    Records { data, done: false }
}

/// Encode `records` back to back, setting MB on the first and ME on the
/// last.
pub fn encode_message(records: &[NdefRecord]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let last = records.len().saturating_sub(1);
    for (i, record) in records.iter().enumerate() {
        let mut r = record.clone();
        r.message_begin = i == 0;
        r.message_end = i == last;
        out.extend(r.to_bytes()?);
    }
    Ok(out)
}

/// Decode records until one with ME set, or until the data runs out.
pub fn decode_message(data: &[u8]) -> Result<Vec<NdefRecord>> {
    records(data).map(|r| r.map(NdefRecord::from)).collect()
}
