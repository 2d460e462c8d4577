// trfnfc/src/ndef/uri.rs
//! Well-known URI record: one prefix code byte followed by the rest of the
//! URI in UTF-8.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ndef::record::{rtd, NdefRecord, Tnf};
use crate::protocol::parser::byte_at;
use crate::{Error, Result};

/// Abbreviations indexed by prefix code. Codes past the table are RFU and
/// expand to nothing.
pub const URI_PREFIXES: [&str; 36] = [
    "",
    "http://www.",
    "https://www.",
    "http://",
    "https://",
    "tel:",
    "mailto:",
    "ftp://anonymous:anonymous@",
    "ftp://ftp.",
    "ftps://",
    "sftp://",
    "smb://",
    "nfs://",
    "ftp://",
    "dav://",
    "news:",
    "telnet://",
    "imap:",
    "rtsp://",
    "urn:",
    "pop:",
    "sip:",
    "sips:",
    "tftp:",
    "btspp://",
    "btl2cap://",
    "btgoep://",
    "tcpobex://",
    "irdaobex://",
    "file://",
    "urn:epc:id:",
    "urn:epc:tag:",
    "urn:epc:pat:",
    "urn:epc:raw:",
    "urn:epc:",
    "urn:nfc:",
];

/// Expansion of `code`; `None` for RFU codes.
pub fn prefix(code: u8) -> Option<&'static str> {
    URI_PREFIXES.get(code as usize).copied()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UriRecord {
    pub code: u8,
    /// URI text after the abbreviated prefix.
    pub suffix: String,
}

impl UriRecord {
    pub fn with_code(code: u8, suffix: &str) -> Self {
        Self {
            code,
            suffix: suffix.to_string(),
        }
    }

    /// Abbreviate `uri` with the longest matching prefix.
    pub fn from_uri(uri: &str) -> Self {
        let (code, p) = URI_PREFIXES
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, p)| uri.starts_with(*p))
            .max_by_key(|(_, p)| p.len())
            .map(|(i, p)| (i as u8, *p))
            .unwrap_or((0, ""));
        Self::with_code(code, &uri[p.len()..])
    }

    /// The full URI. RFU codes are treated as no prefix.
    pub fn uri(&self) -> String {
        format!("{}{}", prefix(self.code).unwrap_or(""), self.suffix)
    }

    pub fn is_rfu(&self) -> bool {
        prefix(self.code).is_none()
    }

    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.suffix.len());
        out.push(self.code);
        out.extend_from_slice(self.suffix.as_bytes());
        out
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let code = byte_at(payload, 0)?;
        let suffix = std::str::from_utf8(&payload[1..])
            .map_err(|e| Error::Protocol(format!("uri record: {}", e)))?;
        Ok(Self::with_code(code, suffix))
    }

    pub fn to_record(&self) -> NdefRecord {
        NdefRecord::well_known(rtd::URI, self.to_payload())
    }
}

impl TryFrom<&NdefRecord> for UriRecord {
    type Error = Error;

    fn try_from(record: &NdefRecord) -> Result<Self> {
        if !record.is_type(Tnf::WellKnown, rtd::URI) {
            return Err(Error::Protocol("not a uri record".into()));
        }
        Self::from_payload(&record.payload)
    }
}
