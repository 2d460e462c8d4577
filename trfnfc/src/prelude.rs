// trfnfc/src/prelude.rs

pub use crate::device::{DeviceBuilder, Frequency, IrqStatus, TrfMode, Trf79x0};
pub use crate::device::{Initialized, Uninitialized};
pub use crate::ndef::{NdefRecord, SmartPoster, TextRecord, Tnf, UriRecord};
pub use crate::reader::{Iso14443a, Selection, WakeCommand};
pub use crate::transport::{CrcMode, FrameLink, RegisterBus, RxFrame, Transceiver};
pub use crate::{Atqa, Atqb, Error, Nfcid2, Nfcid3, Pupi, Result, Sak, Uid, VicinityUid};

#[cfg(feature = "p2p")]
pub use crate::p2p::{P2pConfig, P2pRole, P2pSession, P2pState};

// Re-export small utilities for convenience
pub use crate::utils::{bytes_to_hex, bytes_to_hex_spaced, parse_hex};
