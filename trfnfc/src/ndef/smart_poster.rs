// trfnfc/src/ndef/smart_poster.rs
//! Smart Poster: a nested NDEF message with a URI, an optional title and an
//! optional recommended action.

use derive_more::Display;
use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ndef::record::{encode_message, records, rtd, NdefRecord, Tnf};
use crate::ndef::text::TextRecord;
use crate::ndef::uri::UriRecord;
use crate::protocol::parser::byte_at;
use crate::{Error, Result};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Action {
    DoAction = 0x00,
    SaveForLater = 0x01,
    OpenForEditing = 0x02,
}

impl TryFrom<u8> for Action {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Action::DoAction),
            0x01 => Ok(Action::SaveForLater),
            0x02 => Ok(Action::OpenForEditing),
            other => Err(Error::Protocol(format!("smart poster action {:#04x}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SmartPoster {
    pub title: Option<TextRecord>,
    pub uri: UriRecord,
    pub action: Option<Action>,
}

impl SmartPoster {
    pub fn new(uri: &str) -> Self {
        Self {
            title: None,
            uri: UriRecord::from_uri(uri),
            action: None,
        }
    }

    pub fn with_title(mut self, language: &str, text: &str) -> Self {
        self.title = Some(TextRecord::new(language, text));
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Inner message: title, URI, then action.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        let mut records = Vec::with_capacity(3);
        if let Some(title) = &self.title {
            records.push(title.to_record()?);
        }
        records.push(self.uri.to_record());
        if let Some(action) = self.action {
            records.push(NdefRecord::well_known(rtd::ACTION, vec![action as u8]));
        }
        encode_message(&records)
    }

    /// Walk the inner records. Size, type and signature records as well as
    /// unknown ones are skipped; a URI record is required.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let mut title = None;
        let mut uri = None;
        let mut action = None;
        for record in records(payload) {
            let record = record?;
            if record.tnf != Tnf::WellKnown {
                debug!("smart poster: skipping {} record", record.tnf);
                continue;
            }
            match record.record_type {
                rtd::TEXT => {
                    if title.is_none() {
                        title = Some(TextRecord::from_payload(record.payload)?);
                    }
                }
                rtd::URI => uri = Some(UriRecord::from_payload(record.payload)?),
                rtd::ACTION => action = Some(Action::try_from(byte_at(record.payload, 0)?)?),
                other => debug!(
                    "smart poster: skipping {}",
                    String::from_utf8_lossy(other)
                ),
            }
        }
        let uri = uri.ok_or_else(|| Error::Protocol("smart poster without uri".into()))?;
        Ok(Self { title, uri, action })
    }

    pub fn to_record(&self) -> Result<NdefRecord> {
        Ok(NdefRecord::well_known(rtd::SMART_POSTER, self.to_payload()?))
    }
}

impl TryFrom<&NdefRecord> for SmartPoster {
    type Error = Error;

    fn try_from(record: &NdefRecord) -> Result<Self> {
        if !record.is_type(Tnf::WellKnown, rtd::SMART_POSTER) {
            return Err(Error::Protocol("not a smart poster".into()));
        }
        Self::from_payload(&record.payload)
    }
}
