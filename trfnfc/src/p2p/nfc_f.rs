// trfnfc/src/p2p/nfc_f.rs
//! NFC-F (FeliCa) polling used to discover a peer before NFC-DEP
//! activation at 212 / 424 kbit/s.

use log::{debug, warn};

use crate::transport::link::FrameLink;
use crate::types::Nfcid2;
use crate::Result;

pub const SENSF_REQ: u8 = 0x00;
pub const SENSF_RES: u8 = 0x01;
/// Wildcard system code.
const SYSTEM_CODE_ANY: [u8; 2] = [0xFF, 0xFF];
const SENSF_REQ_LEN: usize = 6;
const SENSF_RES_LEN: usize = 18;
/// PAD0..PAD2 and MRTI bytes of our SENSF_RES.
const SENSF_RES_PAD: [u8; 8] = [0xC0, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7];

/// `LEN 00 SC1 SC2 RC TSN`: any system code, no request code, four slots.
pub fn sensf_request() -> [u8; SENSF_REQ_LEN] {
    [SENSF_REQ_LEN as u8, SENSF_REQ, 0xFF, 0xFF, 0x00, 0x03]
}

/// `LEN 01 NFCID2[8] PAD[8]`
pub fn sensf_response(nfcid2: &Nfcid2) -> [u8; SENSF_RES_LEN] {
    let mut res = [0u8; SENSF_RES_LEN];
    res[0] = SENSF_RES_LEN as u8;
    res[1] = SENSF_RES;
    res[2..10].copy_from_slice(nfcid2.as_bytes());
    res[10..].copy_from_slice(&SENSF_RES_PAD);
    res
}

/// Outcome of [`NfcF::process_received`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NfcFEvent {
    /// A SENSF_RES from a target; its NFCID2 was stored.
    Response,
    /// A SENSF_REQ for any system code, answered with our SENSF_RES.
    Request,
}

/// NFCID2 of this device, replaced by the peer's once a SENSF_RES is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NfcF {
    nfcid2: Nfcid2,
}

impl NfcF {
    pub fn new(nfcid2: Nfcid2) -> Self {
        Self { nfcid2 }
    }

    pub fn nfcid2(&self) -> &Nfcid2 {
        &self.nfcid2
    }

    pub fn send_sensf_req<L: FrameLink + ?Sized>(&self, link: &mut L) -> Result<()> {
        link.write_frame(&sensf_request(), true)
    }

    /// Handle one received NFC-F frame (length byte first). `Ok(None)` for
    /// anything that is neither a wildcard SENSF_REQ nor a SENSF_RES.
    pub fn process_received<L: FrameLink + ?Sized>(
        &mut self,
        link: &mut L,
        frame: &[u8],
    ) -> Result<Option<NfcFEvent>> {
        match frame {
            [len, SENSF_RES, rest @ ..] if *len as usize >= 10 && rest.len() >= 8 => {
                self.nfcid2 = Nfcid2::try_from(&rest[..8])?;
                debug!("sensf_res from {}", self.nfcid2.to_hex());
                Ok(Some(NfcFEvent::Response))
            }
            [len, SENSF_REQ, sc1, sc2, ..]
                if *len as usize == SENSF_REQ_LEN && [*sc1, *sc2] == SYSTEM_CODE_ANY =>
            {
                link.write_frame(&sensf_response(&self.nfcid2), true)?;
                debug!("sensf_req answered with {}", self.nfcid2.to_hex());
                Ok(Some(NfcFEvent::Request))
            }
            _ => {
                warn!("nfc-f frame ignored: {}", crate::utils::bytes_to_hex_spaced(frame));
                Ok(None)
            }
        }
    }
}
