// trfnfc/src/p2p/llcp.rs
//! Logical Link Control Protocol over NFC-DEP: one data link connection at
//! a time, carrying SNEP (or answering NPP / handover peers).
//!
//! Every DEP exchange carries exactly one PDU. The PDU to send next is
//! queued by [`Llcp::process_received_data`] or [`Llcp::set_next_pdu`] and
//! emitted by [`Llcp::state_machine`]; SYMM keeps the link alive when there
//! is nothing else to say.

use derive_more::Display;
use log::{debug, trace, warn};

use crate::constants::{LLCP_MIU_DEFAULT, LLCP_MIU_MAX, LLCP_MIUX_ADVERTISED};
use crate::p2p::snep::{
    Snep, SnepConnectionStatus, SnepReceive, SnepRequest, SnepResponse,
};
use crate::protocol::parser::{byte_at, ensure_len, slice_at};
use crate::{Error, Result};

/// SAP used by this device when it opens a connection.
pub const SSAP_CONNECT_SEND: u8 = 0x20;
/// SAP this device binds when it accepts a connection.
pub const SSAP_CONNECT_RECEIVED: u8 = 0x04;
/// Service discovery protocol SAP; CONNECT by service name goes here.
pub const DSAP_SDP: u8 = 0x01;

pub const SN_SNEP: &[u8] = b"urn:nfc:sn:snep";
pub const SN_NPP: &[u8] = b"com.android.npp";
pub const SN_HANDOVER: &[u8] = b"urn:nfc:sn:handover";

/// Default link timeout when the peer does not send an LTO TLV.
const DEFAULT_LTO_MS: u64 = 100;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PduType {
    #[default]
    Symm = 0x0,
    Pax = 0x1,
    Agf = 0x2,
    Ui = 0x3,
    Connect = 0x4,
    Disc = 0x5,
    Cc = 0x6,
    Dm = 0x7,
    Frmr = 0x8,
    Snl = 0x9,
    I = 0xC,
    Rr = 0xD,
    Rnr = 0xE,
    Reserved = 0xF,
}

impl PduType {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x0 => Self::Symm,
            0x1 => Self::Pax,
            0x2 => Self::Agf,
            0x3 => Self::Ui,
            0x4 => Self::Connect,
            0x5 => Self::Disc,
            0x6 => Self::Cc,
            0x7 => Self::Dm,
            0x8 => Self::Frmr,
            0x9 => Self::Snl,
            0xC => Self::I,
            0xD => Self::Rr,
            0xE => Self::Rnr,
            0xF => Self::Reserved,
            _ => return None,
        })
    }
}

/// Two-byte PDU header: `DSAP[6] PTYPE[4] SSAP[6]`.
pub fn pdu_header(dsap: u8, ptype: PduType, ssap: u8) -> [u8; 2] {
    let p = ptype as u8;
    [(dsap & 0x3F) << 2 | p >> 2, (p & 0x03) << 6 | (ssap & 0x3F)]
}

/// Split a PDU header into `(dsap, ptype code, ssap)`.
pub fn parse_header(pdu: &[u8]) -> Result<(u8, u8, u8)> {
    ensure_len(pdu, 2)?;
    let ptype = (pdu[0] & 0x03) << 2 | pdu[1] >> 6;
    Ok((pdu[0] >> 2, ptype, pdu[1] & 0x3F))
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlcpConnectionStatus {
    #[default]
    Idle,
    Established,
    Sending,
    Receiving,
}

/// Upper-layer service bound to the connection.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlcpService {
    #[default]
    Snep,
    Npp,
    Handover,
}

impl LlcpService {
    pub fn from_service_name(name: &[u8]) -> Option<Self> {
        match name {
            SN_SNEP => Some(Self::Snep),
            SN_NPP => Some(Self::Npp),
            SN_HANDOVER => Some(Self::Handover),
            _ => None,
        }
    }
}

/// Reason byte carried by a DM PDU.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum DmReason {
    #[default]
    ReceivedDisc = 0x00,
    NoActiveConnection = 0x01,
    NoServiceBound = 0x02,
    ConnectRejected = 0x03,
    PermanentlyRejectSap = 0x10,
    PermanentlyRejectAll = 0x11,
    TemporarilyRejectSap = 0x20,
    TemporarilyRejectAll = 0x21,
}

/// Parameter TLVs carried in ATR general bytes, CONNECT and CC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tlv {
    Version(u8),
    /// MIU extension; the link MIU is `128 + miux`.
    Miux(u16),
    Wks(u16),
    /// Link timeout in 10 ms units.
    Lto(u8),
    Rw(u8),
    ServiceName(Vec<u8>),
    Opt(u8),
    Other { kind: u8, value: Vec<u8> },
}

impl Tlv {
    pub const VERSION: u8 = 0x01;
    pub const MIUX: u8 = 0x02;
    pub const WKS: u8 = 0x03;
    pub const LTO: u8 = 0x04;
    pub const RW: u8 = 0x05;
    pub const SN: u8 = 0x06;
    pub const OPT: u8 = 0x07;
    pub const SDREQ: u8 = 0x08;
    pub const SDRES: u8 = 0x09;

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Tlv::Version(v) => out.extend_from_slice(&[Self::VERSION, 1, *v]),
            Tlv::Miux(v) => {
                out.extend_from_slice(&[Self::MIUX, 2]);
                out.extend_from_slice(&(v & 0x07FF).to_be_bytes());
            }
            Tlv::Wks(v) => {
                out.extend_from_slice(&[Self::WKS, 2]);
                out.extend_from_slice(&v.to_be_bytes());
            }
            Tlv::Lto(v) => out.extend_from_slice(&[Self::LTO, 1, *v]),
            Tlv::Rw(v) => out.extend_from_slice(&[Self::RW, 1, v & 0x0F]),
            Tlv::ServiceName(name) => {
                out.push(Self::SN);
                out.push(name.len() as u8);
                out.extend_from_slice(name);
            }
            Tlv::Opt(v) => out.extend_from_slice(&[Self::OPT, 1, *v]),
            Tlv::Other { kind, value } => {
                out.push(*kind);
                out.push(value.len() as u8);
                out.extend_from_slice(value);
            }
        }
    }

    /// Decode a run of TLVs. Fixed-size types with the wrong length are
    /// rejected.
    pub fn parse_all(mut data: &[u8]) -> Result<Vec<Tlv>> {
        let mut out = Vec::new();
        while !data.is_empty() {
            let kind = byte_at(data, 0)?;
            let len = byte_at(data, 1)? as usize;
            let value = slice_at(data, 2, len)?;
            let fixed = |n: usize| -> Result<()> {
                if len == n {
                    Ok(())
                } else {
                    Err(Error::InvalidLength {
                        expected: n,
                        actual: len,
                    })
                }
            };
            out.push(match kind {
                Self::VERSION => {
                    fixed(1)?;
                    Tlv::Version(value[0])
                }
                Self::MIUX => {
                    fixed(2)?;
                    Tlv::Miux(u16::from_be_bytes([value[0], value[1]]) & 0x07FF)
                }
                Self::WKS => {
                    fixed(2)?;
                    Tlv::Wks(u16::from_be_bytes([value[0], value[1]]))
                }
                Self::LTO => {
                    fixed(1)?;
                    Tlv::Lto(value[0])
                }
                Self::RW => {
                    fixed(1)?;
                    Tlv::Rw(value[0] & 0x0F)
                }
                Self::SN => Tlv::ServiceName(value.to_vec()),
                Self::OPT => {
                    fixed(1)?;
                    Tlv::Opt(value[0])
                }
                _ => Tlv::Other {
                    kind,
                    value: value.to_vec(),
                },
            });
            data = &data[2 + len..];
        }
        Ok(out)
    }
}

/// Link parameters advertised by this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlcpParams {
    pub version: u8,
    pub miux: u16,
    pub wks: u16,
    pub lto: u8,
    pub rw: u8,
    pub opt: u8,
}

impl Default for LlcpParams {
    fn default() -> Self {
        Self {
            version: 0x11,
            miux: LLCP_MIUX_ADVERTISED as u16,
            wks: 0x0003,
            lto: 0x64,
            rw: 4,
            opt: 0x03,
        }
    }
}

impl LlcpParams {
    /// TLVs appended to ATR_REQ / ATR_RES after the LLCP magic number.
    pub fn link_tlvs(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        for tlv in [
            Tlv::Version(self.version),
            Tlv::Miux(self.miux),
            Tlv::Wks(self.wks),
            Tlv::Lto(self.lto),
            Tlv::Opt(self.opt),
        ] {
            tlv.encode(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Llcp {
    params: LlcpParams,
    status: LlcpConnectionStatus,
    service: LlcpService,
    next_pdu: PduType,
    dsap: u8,
    ssap: u8,
    ns: u8,
    nr: u8,
    miu: u16,
    lto_ms: u64,
    dm_reason: DmReason,
    snep: Snep,
}

impl Default for Llcp {
    fn default() -> Self {
        Self::new(LlcpParams::default())
    }
}

impl Llcp {
    pub fn new(params: LlcpParams) -> Self {
        Self {
            params,
            status: LlcpConnectionStatus::Idle,
            service: LlcpService::Snep,
            next_pdu: PduType::Symm,
            dsap: 0,
            ssap: 0,
            ns: 0,
            nr: 0,
            miu: LLCP_MIU_DEFAULT,
            lto_ms: DEFAULT_LTO_MS,
            dm_reason: DmReason::ReceivedDisc,
            snep: Snep::new(LLCP_MIU_DEFAULT),
        }
    }

    /// Start a fresh link. A queued SNEP object survives so that data set
    /// up before activation is still sent.
    pub fn init(&mut self) {
        self.status = LlcpConnectionStatus::Idle;
        self.service = LlcpService::Snep;
        self.next_pdu = PduType::Symm;
        self.dsap = 0;
        self.ssap = 0;
        self.ns = 0;
        self.nr = 0;
        self.miu = LLCP_MIU_DEFAULT;
        self.lto_ms = DEFAULT_LTO_MS;
        if self.snep.status() != SnepConnectionStatus::Idle {
            self.snep.init(LLCP_MIU_DEFAULT);
        } else {
            self.snep.set_max_payload(LLCP_MIU_DEFAULT);
        }
    }

    pub fn params(&self) -> &LlcpParams {
        &self.params
    }

    pub fn status(&self) -> LlcpConnectionStatus {
        self.status
    }

    pub fn service(&self) -> LlcpService {
        self.service
    }

    pub fn next_pdu(&self) -> PduType {
        self.next_pdu
    }

    /// Negotiated maximum information unit.
    pub fn miu(&self) -> u16 {
        self.miu
    }

    /// Link timeout announced by the peer.
    pub fn lto_ms(&self) -> u64 {
        self.lto_ms
    }

    pub fn snep(&self) -> &Snep {
        &self.snep
    }

    pub fn snep_mut(&mut self) -> &mut Snep {
        &mut self.snep
    }

    pub fn receive_status(&mut self) -> SnepReceive {
        self.snep.receive_status()
    }

    /// Apply the peer's link parameters.
    pub fn process_tlvs(&mut self, data: &[u8]) -> Result<()> {
        let tlvs = Tlv::parse_all(data)?;
        self.apply_tlvs(&tlvs);
        debug!("llcp miu {} lto {} ms", self.miu, self.lto_ms);
        Ok(())
    }

    /// Queue a PDU from the application side. Only allowed while no
    /// transfer is running.
    pub fn set_next_pdu(&mut self, pdu: PduType) -> Result<()> {
        if !matches!(
            self.status,
            LlcpConnectionStatus::Idle | LlcpConnectionStatus::Established
        ) {
            return Err(Error::InvalidState("llcp connection busy"));
        }
        if pdu == PduType::Connect {
            self.service = LlcpService::Snep;
        }
        self.next_pdu = pdu;
        Ok(())
    }

    fn set_status(&mut self, status: LlcpConnectionStatus) {
        if self.status != status {
            debug!("llcp {} -> {}", self.status, status);
            self.status = status;
        }
    }

    fn sequence(&self) -> u8 {
        (self.ns & 0x0F) << 4 | (self.nr & 0x0F)
    }

    /// Encode the queued PDU and advance the connection state.
    pub fn state_machine(&mut self) -> Result<Vec<u8>> {
        let pdu = self.next_pdu;
        self.next_pdu = PduType::Symm;
        let mut out = Vec::with_capacity(self.miu as usize + 3);
        match pdu {
            PduType::Connect => {
                self.service = LlcpService::Snep;
                self.ns = 0;
                self.nr = 0;
                self.set_status(LlcpConnectionStatus::Sending);
                self.ssap = SSAP_CONNECT_SEND;
                self.dsap = DSAP_SDP;
                out.extend_from_slice(&pdu_header(self.dsap, pdu, self.ssap));
                Tlv::ServiceName(SN_SNEP.to_vec()).encode(&mut out);
                Tlv::Miux(self.params.miux).encode(&mut out);
                Tlv::Rw(self.params.rw).encode(&mut out);
            }
            PduType::Disc => {
                if self.service == LlcpService::Handover {
                    self.service = LlcpService::Snep;
                }
                out.extend_from_slice(&pdu_header(self.dsap, pdu, self.ssap));
            }
            PduType::Cc => {
                self.set_status(LlcpConnectionStatus::Established);
                self.ns = 0;
                self.nr = 0;
                self.ssap = SSAP_CONNECT_RECEIVED;
                out.extend_from_slice(&pdu_header(self.dsap, pdu, self.ssap));
                Tlv::Miux(self.params.miux).encode(&mut out);
                Tlv::Rw(self.params.rw).encode(&mut out);
            }
            PduType::Dm => {
                self.set_status(LlcpConnectionStatus::Idle);
                out.extend_from_slice(&pdu_header(self.dsap, pdu, self.ssap));
                out.push(self.dm_reason as u8);
            }
            PduType::I => {
                out.extend_from_slice(&pdu_header(self.dsap, pdu, self.ssap));
                out.push(self.sequence());
                self.ns = (self.ns + 1) & 0x0F;
                if self.status == LlcpConnectionStatus::Established {
                    self.set_status(LlcpConnectionStatus::Sending);
                }
                if self.service == LlcpService::Snep {
                    out.extend(self.snep_information()?);
                }
            }
            PduType::Rr => {
                if self.service == LlcpService::Handover {
                    self.set_status(LlcpConnectionStatus::Idle);
                }
                self.nr = (self.nr + 1) & 0x0F;
                out.extend_from_slice(&pdu_header(self.dsap, pdu, self.ssap));
                out.push(self.nr);
            }
            _ => out.extend_from_slice(&pdu_header(0, PduType::Symm, 0)),
        }
        trace!("llcp tx {} {}", pdu, crate::utils::bytes_to_hex_spaced(&out));
        Ok(out)
    }

    fn snep_information(&mut self) -> Result<Vec<u8>> {
        match self.status {
            LlcpConnectionStatus::Sending => self.snep.send_request(SnepRequest::Put),
            LlcpConnectionStatus::Receiving => {
                let response = match self.snep.status() {
                    SnepConnectionStatus::ReceivedFirstPacket => SnepResponse::Continue,
                    SnepConnectionStatus::ReceiveComplete => SnepResponse::Success,
                    SnepConnectionStatus::ExcessSize => SnepResponse::Reject,
                    _ => return Ok(Vec::new()),
                };
                self.snep.send_response(response)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Handle one inbound PDU and queue the answer. Returns the PDU type
    /// that was received.
    pub fn process_received_data(&mut self, pdu: &[u8]) -> Result<PduType> {
        let (_, code, peer_sap) = parse_header(pdu)?;
        let ptype = PduType::from_code(code)
            .ok_or_else(|| Error::Protocol(format!("llcp pdu type {:#x}", code)))?;
        trace!("llcp rx {} {}", ptype, crate::utils::bytes_to_hex_spaced(pdu));

        self.next_pdu = match ptype {
            PduType::Symm => self.after_symm(),
            PduType::Connect => {
                self.dsap = peer_sap;
                let tlvs = Tlv::parse_all(&pdu[2..]).unwrap_or_else(|e| {
                    warn!("llcp connect tlvs ignored: {}", e);
                    Vec::new()
                });
                let requested = tlvs.iter().find_map(|t| match t {
                    Tlv::ServiceName(name) => Some(name.clone()),
                    _ => None,
                });
                match requested {
                    Some(name) => match LlcpService::from_service_name(&name) {
                        Some(service) => self.service = service,
                        None => {
                            warn!("llcp unknown service {}", String::from_utf8_lossy(&name));
                            self.next_pdu = PduType::Symm;
                            return Ok(ptype);
                        }
                    },
                    None => self.service = LlcpService::Snep,
                }
                self.apply_tlvs(&tlvs);
                PduType::Cc
            }
            PduType::Disc => {
                self.dm_reason = DmReason::ReceivedDisc;
                PduType::Dm
            }
            PduType::Cc => {
                self.dsap = peer_sap;
                if let Ok(tlvs) = Tlv::parse_all(&pdu[2..]) {
                    self.apply_tlvs(&tlvs);
                }
                PduType::I
            }
            PduType::Dm => {
                self.set_status(LlcpConnectionStatus::Idle);
                PduType::Symm
            }
            PduType::I => {
                ensure_len(pdu, 3)?;
                if self.service == LlcpService::Snep {
                    if let Err(e) = self.snep.process_received_data(&pdu[3..]) {
                        warn!("snep frame dropped: {}", e);
                    }
                }
                if self.status == LlcpConnectionStatus::Established {
                    self.set_status(LlcpConnectionStatus::Receiving);
                }
                PduType::Rr
            }
            PduType::Rr => match (self.status, self.snep.status()) {
                (LlcpConnectionStatus::Sending, SnepConnectionStatus::SendingNFragments) => {
                    PduType::I
                }
                (LlcpConnectionStatus::Sending, SnepConnectionStatus::SendComplete) => {
                    PduType::Disc
                }
                _ => PduType::Symm,
            },
            other => {
                debug!("llcp {} not handled", other);
                PduType::Symm
            }
        };
        Ok(ptype)
    }

    fn apply_tlvs(&mut self, tlvs: &[Tlv]) {
        for tlv in tlvs {
            match tlv {
                Tlv::Miux(miux) => {
                    self.miu = (LLCP_MIU_DEFAULT + miux).min(LLCP_MIU_MAX);
                    self.snep.set_max_payload(self.miu);
                }
                Tlv::Lto(lto) => self.lto_ms = *lto as u64 * 10,
                other => trace!("llcp tlv {:?}", other),
            }
        }
    }

    fn after_symm(&mut self) -> PduType {
        if matches!(self.next_pdu, PduType::Connect | PduType::I) {
            return self.next_pdu;
        }
        match self.service {
            LlcpService::Snep => match self.snep.status() {
                SnepConnectionStatus::SendComplete => {
                    self.snep.set_status(SnepConnectionStatus::Idle);
                    PduType::Disc
                }
                SnepConnectionStatus::ReceivedFirstPacket
                | SnepConnectionStatus::ReceiveComplete
                | SnepConnectionStatus::ExcessSize
                | SnepConnectionStatus::SendingNFragments => PduType::I,
                _ => PduType::Symm,
            },
            LlcpService::Handover if self.status == LlcpConnectionStatus::Idle => PduType::Disc,
            _ => PduType::Symm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn established_receiver() -> Llcp {
        let mut llcp = Llcp::default();
        let mut connect = pdu_header(DSAP_SDP, PduType::Connect, SSAP_CONNECT_SEND).to_vec();
        Tlv::ServiceName(SN_SNEP.to_vec()).encode(&mut connect);
        llcp.process_received_data(&connect).unwrap();
        llcp.state_machine().unwrap();
        llcp
    }

    #[test]
    fn header_packing() {
        assert_eq!(pdu_header(0, PduType::Symm, 0), [0x00, 0x00]);
        assert_eq!(pdu_header(0x01, PduType::Connect, 0x20), [0x05, 0x20]);
        assert_eq!(pdu_header(0x20, PduType::I, 0x04), [0x83, 0x04]);
        assert_eq!(parse_header(&[0x83, 0x04]).unwrap(), (0x20, 0xC, 0x04));
        assert_eq!(parse_header(&[0x11, 0x44]).unwrap(), (0x04, 0x5, 0x04));
    }

    #[test]
    fn link_tlvs_layout() {
        assert_eq!(
            LlcpParams::default().link_tlvs(),
            vec![
                0x01, 0x01, 0x11, 0x02, 0x02, 0x00, 0x78, 0x03, 0x02, 0x00, 0x03, 0x04, 0x01,
                0x64, 0x07, 0x01, 0x03
            ]
        );
    }

    #[test]
    fn truncated_tlv_is_rejected() {
        assert!(Tlv::parse_all(&[0x02, 0x02, 0x00]).is_err());
        assert!(Tlv::parse_all(&[0x04, 0x02, 0x00, 0x00]).is_err());
    }

    #[test]
    fn lto_and_miux_negotiation() {
        let mut llcp = Llcp::default();
        llcp.process_tlvs(&[0x02, 0x02, 0x00, 0x78, 0x04, 0x01, 0x32]).unwrap();
        assert_eq!(llcp.miu(), 248);
        assert_eq!(llcp.snep().max_payload(), 248);
        assert_eq!(llcp.lto_ms(), 500);
        llcp.process_tlvs(&[0x02, 0x02, 0x07, 0xFF]).unwrap();
        assert_eq!(llcp.miu(), 248);
    }

    #[test]
    fn connect_is_answered_with_cc() {
        let mut llcp = Llcp::default();
        let mut connect = pdu_header(DSAP_SDP, PduType::Connect, 0x21).to_vec();
        Tlv::ServiceName(SN_NPP.to_vec()).encode(&mut connect);
        assert_eq!(llcp.process_received_data(&connect).unwrap(), PduType::Connect);
        assert_eq!(llcp.service(), LlcpService::Npp);
        assert_eq!(llcp.next_pdu(), PduType::Cc);

        let cc = llcp.state_machine().unwrap();
        assert_eq!(&cc[..2], &pdu_header(0x21, PduType::Cc, SSAP_CONNECT_RECEIVED));
        assert_eq!(&cc[2..], &[0x02, 0x02, 0x00, 0x78, 0x05, 0x01, 0x04]);
        assert_eq!(llcp.status(), LlcpConnectionStatus::Established);
    }

    #[test]
    fn connect_without_service_name_defaults_to_snep() {
        let mut llcp = Llcp::default();
        llcp.process_received_data(&pdu_header(DSAP_SDP, PduType::Connect, 0x10))
            .unwrap();
        assert_eq!(llcp.service(), LlcpService::Snep);
        assert_eq!(llcp.next_pdu(), PduType::Cc);
    }

    #[test]
    fn connect_to_unknown_service_keeps_symm() {
        let mut llcp = Llcp::default();
        let mut connect = pdu_header(DSAP_SDP, PduType::Connect, 0x10).to_vec();
        Tlv::ServiceName(b"urn:nfc:sn:foo".to_vec()).encode(&mut connect);
        llcp.process_received_data(&connect).unwrap();
        assert_eq!(llcp.next_pdu(), PduType::Symm);
    }

    #[test]
    fn disc_gets_dm() {
        let mut llcp = established_receiver();
        llcp.process_received_data(&pdu_header(0x04, PduType::Disc, 0x20))
            .unwrap();
        let dm = llcp.state_machine().unwrap();
        assert_eq!(dm[2], DmReason::ReceivedDisc as u8);
        assert_eq!(llcp.status(), LlcpConnectionStatus::Idle);
    }

    #[test]
    fn receive_put_and_acknowledge() {
        let mut llcp = established_receiver();
        let mut i = pdu_header(0x04, PduType::I, 0x20).to_vec();
        i.push(0x00);
        i.extend_from_slice(&[0x10, 0x02, 0, 0, 0, 2, 0xD1, 0x01]);
        llcp.process_received_data(&i).unwrap();
        assert_eq!(llcp.status(), LlcpConnectionStatus::Receiving);

        let rr = llcp.state_machine().unwrap();
        assert_eq!(rr, vec![0x83, 0x44, 0x01]);

        llcp.process_received_data(&[0x00, 0x00]).unwrap();
        assert_eq!(llcp.next_pdu(), PduType::I);
        let success = llcp.state_machine().unwrap();
        assert_eq!(&success[3..5], &[0x10, 0x81]);
        assert_eq!(llcp.snep().status(), SnepConnectionStatus::Idle);

        let rx = llcp.receive_status();
        assert_eq!(rx.data, vec![0xD1, 0x01]);
    }

    #[test]
    fn set_next_pdu_only_when_quiet() {
        let mut llcp = Llcp::default();
        llcp.set_next_pdu(PduType::Connect).unwrap();
        llcp.state_machine().unwrap();
        assert_eq!(llcp.status(), LlcpConnectionStatus::Sending);
        assert!(llcp.set_next_pdu(PduType::Connect).is_err());
    }

    #[test]
    fn unknown_pdu_type_fails() {
        let mut llcp = Llcp::default();
        assert!(llcp.process_received_data(&[0x02, 0x80]).is_err());
        assert!(llcp.process_received_data(&[0x00]).is_err());
    }

    proptest! {
        #[test]
        fn miux_round_trip(x in 0u16..=120) {
            let mut buf = Vec::new();
            Tlv::Miux(x).encode(&mut buf);
            let mut llcp = Llcp::default();
            llcp.process_tlvs(&buf).unwrap();
            prop_assert_eq!(llcp.miu(), (128 + x).min(248));
        }
    }
}
