// trfnfc/src/ndef/mod.rs

//! NDEF record codec: generic record header, Text, URI and Smart Poster.

pub mod record;
pub mod smart_poster;
pub mod text;
pub mod uri;

pub use record::{decode_message, encode_message, records, NdefRecord, NdefRecordRef, Tnf};
pub use smart_poster::{Action, SmartPoster};
pub use text::{TextEncoding, TextRecord};
pub use uri::UriRecord;
