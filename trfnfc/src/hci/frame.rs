// trfnfc/src/hci/frame.rs
//! HCI event framing: `TYPE CODE LEN PAYLOAD[LEN]`. Vendor events (code
//! 0xFF) carry a little-endian event number and the status right after the
//! length byte.

use derive_more::Display;

use crate::protocol::parser::{byte_at, le_u16_at};
use crate::{Error, Result};

pub const HCI_COMMAND_PACKET: u8 = 0x01;
pub const HCI_EVENT_PACKET: u8 = 0x04;
pub const HCI_VENDOR_EVENT_CODE: u8 = 0xFF;

/// Events the central role reacts to.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum HciEventKind {
    CommandComplete = 0x000E,
    AttErrorResponse = 0x0501,
    AttReadResponse = 0x050B,
    AttWriteResponse = 0x0513,
    HandleValueNotify = 0x051B,
    DeviceInitDone = 0x0600,
    DeviceDiscoveryDone = 0x0601,
    LinkEstablished = 0x0605,
    LinkTerminated = 0x0606,
    AuthenticationDone = 0x060A,
    PasskeyNeeded = 0x060B,
    DeviceInfo = 0x060D,
    BondDone = 0x060E,
    CommandStatus = 0x067F,
}

impl HciEventKind {
    pub fn from_code(code: u16) -> Option<Self> {
        use HciEventKind::*;
        [
            CommandComplete,
            AttErrorResponse,
            AttReadResponse,
            AttWriteResponse,
            HandleValueNotify,
            DeviceInitDone,
            DeviceDiscoveryDone,
            LinkEstablished,
            LinkTerminated,
            AuthenticationDone,
            PasskeyNeeded,
            DeviceInfo,
            BondDone,
            CommandStatus,
        ]
        .into_iter()
        .find(|k| *k as u16 == code)
    }
}

/// Parsed header of one complete HCI event message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HciEvent {
    pub event_code: u8,
    /// Vendor event number, or the plain event code widened.
    pub event: u16,
    pub status: u8,
    pub data: Vec<u8>,
}

impl HciEvent {
    pub fn parse(msg: &[u8]) -> Result<Self> {
        crate::protocol::parser::expect_response_code(msg, HCI_EVENT_PACKET)?;
        let len = byte_at(msg, 2)? as usize;
        if len + 3 != msg.len() {
            return Err(Error::InvalidLength {
                expected: len + 3,
                actual: msg.len(),
            });
        }
        let event_code = msg[1];
        let (event, status) = if event_code == HCI_VENDOR_EVENT_CODE {
            (le_u16_at(msg, 3)?, byte_at(msg, 5)?)
        } else {
            (event_code as u16, byte_at(msg, 6)?)
        };
        Ok(Self {
            event_code,
            event,
            status,
            data: msg.to_vec(),
        })
    }

    pub fn is_vendor(&self) -> bool {
        self.event_code == HCI_VENDOR_EVENT_CODE
    }

    pub fn kind(&self) -> Option<HciEventKind> {
        HciEventKind::from_code(self.event)
    }

    /// Opcode echoed by a command status or command complete event.
    pub fn opcode(&self) -> Option<u16> {
        match self.kind()? {
            HciEventKind::CommandStatus => le_u16_at(&self.data, 6).ok(),
            HciEventKind::CommandComplete => le_u16_at(&self.data, 4).ok(),
            _ => None,
        }
    }
}
