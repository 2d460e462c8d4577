// trfnfc/src/p2p/snep.rs
//! Simple NDEF Exchange Protocol: PUT fragmentation on the sending side and
//! reassembly on the receiving side. One transfer direction is active at a
//! time.

use derive_more::Display;
use log::{debug, trace, warn};

use crate::constants::{SNEP_HEADER_LEN, SNEP_MAX_BUFFER, SNEP_MAX_PAYLOAD, SNEP_VERSION};
use crate::protocol::parser::{be_u32_at, byte_at, ensure_len};
use crate::{Error, Result};

/// Smallest fragment that still carries one byte after the PUT header.
const SNEP_MIN_FRAGMENT: u16 = SNEP_HEADER_LEN as u16 + 1;

/// Request codes (byte 1 of a request).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SnepRequest {
    Continue = 0x00,
    Get = 0x01,
    Put = 0x02,
    Reject = 0x7F,
}

impl SnepRequest {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => Self::Continue,
            0x01 => Self::Get,
            0x02 => Self::Put,
            0x7F => Self::Reject,
            _ => return None,
        })
    }
}

/// Response codes; every response has bit 7 set.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SnepResponse {
    Continue = 0x80,
    Success = 0x81,
    NotFound = 0xC0,
    ExcessData = 0xC1,
    BadRequest = 0xC2,
    NotImplemented = 0xE0,
    UnsupportedVersion = 0xE1,
    Reject = 0xFF,
}

impl SnepResponse {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x80 => Self::Continue,
            0x81 => Self::Success,
            0xC0 => Self::NotFound,
            0xC1 => Self::ExcessData,
            0xC2 => Self::BadRequest,
            0xE0 => Self::NotImplemented,
            0xE1 => Self::UnsupportedVersion,
            0xFF => Self::Reject,
            _ => return None,
        })
    }
}

/// Fragmentation phase of the current transfer.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnepConnectionStatus {
    #[default]
    Idle,
    WrongVersion,
    ReceivedFirstPacket,
    ReceivingNFragments,
    WaitingForContinue,
    WaitingForSuccess,
    SendingNFragments,
    SendComplete,
    ReceiveComplete,
    ExcessSize,
}

/// What the last processed inbound fragment was.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnepPacketStatus {
    #[default]
    NoFragment,
    FirstFragment,
    NFragment,
    Completed,
}

/// Inbound fragment handed to the application by [`Snep::receive_status`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnepReceive {
    pub status: SnepPacketStatus,
    /// Total object length announced in the PUT header.
    pub object_len: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snep {
    status: SnepConnectionStatus,
    max_payload: u16,
    tx: Vec<u8>,
    tx_index: usize,
    rx: SnepReceive,
    rx_remaining: u32,
}

impl Default for Snep {
    fn default() -> Self {
        Self::new(crate::constants::LLCP_MIU_DEFAULT)
    }
}

impl Snep {
    /// Fragment sizes outside `7..=248` are clamped into that range.
    pub fn new(max_payload: u16) -> Self {
        Self {
            status: SnepConnectionStatus::Idle,
            max_payload: max_payload.clamp(SNEP_MIN_FRAGMENT, SNEP_MAX_BUFFER),
            tx: Vec::new(),
            tx_index: 0,
            rx: SnepReceive::default(),
            rx_remaining: 0,
        }
    }

    /// Reset to idle with a fresh fragment size.
    pub fn init(&mut self, max_payload: u16) {
        *self = Self::new(max_payload);
    }

    pub fn status(&self) -> SnepConnectionStatus {
        self.status
    }

    /// Force the connection status, e.g. back to idle once a received
    /// object has been consumed.
    pub fn set_status(&mut self, status: SnepConnectionStatus) {
        debug!("snep {} -> {}", self.status, status);
        self.status = status;
    }

    pub fn max_payload(&self) -> u16 {
        self.max_payload
    }

    /// Apply a negotiated fragment size. Values above the local buffer are
    /// ignored and `false` is returned.
    pub fn set_max_payload(&mut self, max_payload: u16) -> bool {
        if !(SNEP_MIN_FRAGMENT..=SNEP_MAX_BUFFER).contains(&max_payload) {
            return false;
        }
        self.max_payload = max_payload;
        true
    }

    /// Queue `data` for the next PUT. Only one outbound object may be
    /// pending.
    pub fn setup_packet(&mut self, data: &[u8]) -> Result<()> {
        if self.status != SnepConnectionStatus::Idle {
            return Err(Error::InvalidState("snep transfer in progress"));
        }
        self.tx = data.to_vec();
        self.tx_index = 0;
        Ok(())
    }

    /// Bytes of the queued object not yet handed to LLCP.
    pub fn pending_tx(&self) -> usize {
        self.tx.len() - self.tx_index
    }

    /// Next outbound fragment of the queued object. Only PUT is supported.
    pub fn send_request(&mut self, request: SnepRequest) -> Result<Vec<u8>> {
        if request != SnepRequest::Put {
            return Err(Error::UnsupportedOperation(format!("snep {}", request)));
        }
        let max = self.max_payload as usize;
        let mut out = Vec::with_capacity(max);
        match self.status {
            SnepConnectionStatus::Idle => {
                out.push(SNEP_VERSION);
                out.push(SnepRequest::Put as u8);
                out.extend_from_slice(&(self.tx.len() as u32).to_be_bytes());
                let n = self.tx.len().min(max.saturating_sub(SNEP_HEADER_LEN));
                out.extend_from_slice(&self.tx[..n]);
                self.tx_index = n;
                self.set_status(if self.tx_index < self.tx.len() {
                    SnepConnectionStatus::WaitingForContinue
                } else {
                    SnepConnectionStatus::WaitingForSuccess
                });
            }
            SnepConnectionStatus::SendingNFragments => {
                let n = self.pending_tx().min(max);
                out.extend_from_slice(&self.tx[self.tx_index..self.tx_index + n]);
                self.tx_index += n;
                if self.tx_index == self.tx.len() {
                    self.set_status(SnepConnectionStatus::WaitingForSuccess);
                }
            }
            _ => return Err(Error::InvalidState("no snep fragment to send")),
        }
        trace!("snep tx {} bytes, {} left", out.len(), self.pending_tx());
        Ok(out)
    }

    /// Response header for the current receive phase. CONTINUE answers a
    /// first fragment, SUCCESS a complete object and REJECT an oversized
    /// one.
    pub fn send_response(&mut self, response: SnepResponse) -> Result<Vec<u8>> {
        let next = match (response, self.status) {
            (SnepResponse::Continue, SnepConnectionStatus::ReceivedFirstPacket) => {
                SnepConnectionStatus::ReceivingNFragments
            }
            (SnepResponse::Success, SnepConnectionStatus::ReceiveComplete)
            | (SnepResponse::Reject, SnepConnectionStatus::ExcessSize) => {
                SnepConnectionStatus::Idle
            }
            _ => return Err(Error::InvalidState("snep response not expected")),
        };
        self.set_status(next);
        Ok(vec![SNEP_VERSION, response as u8, 0, 0, 0, 0])
    }

    /// Consume one inbound SNEP message or continuation fragment.
    pub fn process_received_data(&mut self, data: &[u8]) -> Result<SnepConnectionStatus> {
        if matches!(
            self.status,
            SnepConnectionStatus::ReceivedFirstPacket | SnepConnectionStatus::ReceivingNFragments
        ) {
            let n = data.len().min(self.rx_remaining as usize);
            self.rx_remaining -= n as u32;
            self.rx.data = data[..n].to_vec();
            if self.rx_remaining == 0 {
                self.rx.status = SnepPacketStatus::Completed;
                self.set_status(SnepConnectionStatus::ReceiveComplete);
            } else {
                self.rx.status = SnepPacketStatus::NFragment;
                self.set_status(SnepConnectionStatus::ReceivingNFragments);
            }
            return Ok(self.status);
        }

        let code = byte_at(data, 1)?;
        if code & 0x80 != 0 {
            match (SnepResponse::from_code(code), self.status) {
                (Some(SnepResponse::Continue), SnepConnectionStatus::WaitingForContinue) => {
                    self.set_status(SnepConnectionStatus::SendingNFragments)
                }
                (Some(SnepResponse::Success), SnepConnectionStatus::WaitingForSuccess) => {
                    self.set_status(SnepConnectionStatus::SendComplete)
                }
                (resp, status) => warn!("snep response {:?} ignored in {}", resp, status),
            }
            return Ok(self.status);
        }

        if data[0] >> 4 != SNEP_VERSION >> 4 {
            warn!("snep version {:#04x} not supported", data[0]);
            self.set_status(SnepConnectionStatus::WrongVersion);
            return Ok(self.status);
        }
        if SnepRequest::from_code(code) != Some(SnepRequest::Put) {
            warn!("snep request {:#04x} not supported", code);
            return Ok(self.status);
        }

        ensure_len(data, SNEP_HEADER_LEN)?;
        let total = be_u32_at(data, 2)?;
        self.rx.object_len = total;
        if total > SNEP_MAX_PAYLOAD {
            warn!("snep object of {} bytes rejected", total);
            self.rx.data.clear();
            self.set_status(SnepConnectionStatus::ExcessSize);
            return Ok(self.status);
        }

        let fragment = &data[SNEP_HEADER_LEN..];
        let n = fragment.len().min(total as usize);
        self.rx.data = fragment[..n].to_vec();
        self.rx_remaining = total - n as u32;
        if self.rx_remaining == 0 {
            self.rx.status = SnepPacketStatus::Completed;
            self.set_status(SnepConnectionStatus::ReceiveComplete);
        } else {
            self.rx.status = SnepPacketStatus::FirstFragment;
            self.set_status(SnepConnectionStatus::ReceivedFirstPacket);
        }
        Ok(self.status)
    }

    /// Take the last inbound fragment; the stored status is cleared.
    pub fn receive_status(&mut self) -> SnepReceive {
        let object_len = self.rx.object_len;
        let taken = std::mem::take(&mut self.rx);
        self.rx.object_len = object_len;
        taken
    }
}
