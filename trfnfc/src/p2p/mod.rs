// trfnfc/src/p2p/mod.rs

//! NFC peer-to-peer stack (NFC-F discovery, NFC-DEP, LLCP, SNEP) and the
//! Type 4A/4B card-emulation setup.

pub mod dep;
pub mod emulation;
pub mod llcp;
pub mod nfc_f;
pub mod orchestrator;
pub mod snep;

pub use dep::{Dep, DepStatus, Pfb};
pub use llcp::{Llcp, LlcpConnectionStatus, LlcpParams, LlcpService, PduType, Tlv};
pub use nfc_f::NfcF;
pub use orchestrator::{P2pConfig, P2pRole, P2pSession, P2pState};
pub use snep::{Snep, SnepConnectionStatus, SnepPacketStatus, SnepReceive};
