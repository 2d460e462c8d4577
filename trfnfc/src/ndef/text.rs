// trfnfc/src/ndef/text.rs
//! Well-known Text record: `STATUS LANG[n] TEXT`, where STATUS carries the
//! UTF-16 flag and the language code length.

use derive_more::Display;
use log::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::constants::NDEF_LANG_MAXSIZE;
use crate::ndef::record::{rtd, NdefRecord, Tnf};
use crate::protocol::parser::{byte_at, slice_at};
use crate::{Error, Result};

const UTF16_FLAG: u8 = 0x80;
const RFU_FLAG: u8 = 0x40;
const LANG_LEN_MASK: u8 = 0x3F;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TextRecord {
    pub encoding: TextEncoding,
    /// IANA language code such as `en` or `en-US`.
    pub language: String,
    pub text: String,
}

fn clamp_language(lang: &[u8]) -> &[u8] {
    if lang.len() > NDEF_LANG_MAXSIZE {
        warn!(
            "language code of {} bytes truncated to {}",
            lang.len(),
            NDEF_LANG_MAXSIZE
        );
        &lang[..NDEF_LANG_MAXSIZE]
    } else {
        lang
    }
}

impl TextRecord {
    pub fn new(language: &str, text: &str) -> Self {
        Self {
            encoding: TextEncoding::Utf8,
            language: language.to_string(),
            text: text.to_string(),
        }
    }

    pub fn to_payload(&self) -> Result<Vec<u8>> {
        let lang = clamp_language(self.language.as_bytes());
        if lang.is_empty() {
            return Err(Error::Protocol("text record without language".into()));
        }
        let mut out = Vec::with_capacity(1 + lang.len() + self.text.len());
        let mut status = lang.len() as u8;
        if self.encoding == TextEncoding::Utf16 {
            status |= UTF16_FLAG;
        }
        out.push(status);
        out.extend_from_slice(lang);
        match self.encoding {
            TextEncoding::Utf8 => out.extend_from_slice(self.text.as_bytes()),
            TextEncoding::Utf16 => {
                for unit in self.text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
        }
        Ok(out)
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let status = byte_at(payload, 0)?;
        if status & RFU_FLAG != 0 {
            return Err(Error::Protocol("text record rfu bit set".into()));
        }
        let lang_len = (status & LANG_LEN_MASK) as usize;
        if lang_len == 0 {
            return Err(Error::Protocol("text record without language".into()));
        }
        let lang = clamp_language(slice_at(payload, 1, lang_len)?);
        let body = &payload[1 + lang_len..];

        let (encoding, text) = if status & UTF16_FLAG != 0 {
            (TextEncoding::Utf16, decode_utf16(body)?)
        } else {
            let text = std::str::from_utf8(body)
                .map_err(|e| Error::Protocol(format!("text record: {}", e)))?;
            (TextEncoding::Utf8, text.to_string())
        };
        Ok(Self {
            encoding,
            language: String::from_utf8_lossy(lang).into_owned(),
            text,
        })
    }

    pub fn to_record(&self) -> Result<NdefRecord> {
        Ok(NdefRecord::well_known(rtd::TEXT, self.to_payload()?))
    }
}

impl TryFrom<&NdefRecord> for TextRecord {
    type Error = Error;

    fn try_from(record: &NdefRecord) -> Result<Self> {
        if !record.is_type(Tnf::WellKnown, rtd::TEXT) {
            return Err(Error::Protocol("not a text record".into()));
        }
        Self::from_payload(&record.payload)
    }
}

/// Big-endian UTF-16 unless a byte order mark says otherwise.
fn decode_utf16(body: &[u8]) -> Result<String> {
    if body.len() % 2 != 0 {
        return Err(Error::Protocol("odd utf-16 text length".into()));
    }
    let (little, body) = match body {
        [0xFF, 0xFE, rest @ ..] => (true, rest),
        [0xFE, 0xFF, rest @ ..] => (false, rest),
        _ => (false, body),
    };
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|c| {
            if little {
                u16::from_le_bytes([c[0], c[1]])
            } else {
                u16::from_be_bytes([c[0], c[1]])
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|e| Error::Protocol(format!("text record: {}", e)))
}
