// trfnfc/src/p2p/dep.rs
//! NFC-DEP (ISO18092) transport: ATR/PSL negotiation and DEP information
//! frames carrying one LLCP PDU each.
//!
//! Every frame is `LEN CMD0 CMD1 ...` where LEN counts itself. Requests use
//! `D4`, responses `D5`.

use derive_more::Display;
use log::{debug, trace, warn};

use crate::constants::LLCP_MAGIC;
use crate::device::irq::IrqStatus;
use crate::device::mode::{Frequency, TrfMode};
use crate::p2p::llcp::Llcp;
use crate::protocol::parser::be_u16_at;
use crate::transport::link::FrameLink;
use crate::types::{Nfcid2, Nfcid3};
use crate::utils::rtox_wait_ms;
use crate::{Error, Result};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DepCommand {
    AtrReq = 0xD400,
    AtrRes = 0xD501,
    PslReq = 0xD404,
    PslRes = 0xD505,
    DepReq = 0xD406,
    DepRes = 0xD507,
    DslReq = 0xD408,
    DslRes = 0xD509,
    RslReq = 0xD40A,
    RslRes = 0xD50B,
}

impl DepCommand {
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0xD400 => Self::AtrReq,
            0xD501 => Self::AtrRes,
            0xD404 => Self::PslReq,
            0xD505 => Self::PslRes,
            0xD406 => Self::DepReq,
            0xD507 => Self::DepRes,
            0xD408 => Self::DslReq,
            0xD509 => Self::DslRes,
            0xD40A => Self::RslReq,
            0xD50B => Self::RslRes,
            _ => return None,
        })
    }

    pub fn bytes(self) -> [u8; 2] {
        (self as u16).to_be_bytes()
    }
}

/// PFB class of a DEP frame.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pfb {
    #[default]
    Information,
    Ack,
    Nack,
    Attention,
    Rtox,
}

impl Pfb {
    pub const RTOX: u8 = 0x90;
    pub const ATTENTION: u8 = 0x80;
    pub const ACK: u8 = 0x40;
    pub const NACK: u8 = 0x50;

    pub fn classify(pfb: u8) -> Option<Self> {
        match pfb & 0xF0 {
            0x00 => Some(Self::Information),
            0x10 | Self::ACK => Some(Self::Ack),
            Self::NACK => Some(Self::Nack),
            Self::ATTENTION => Some(Self::Attention),
            Self::RTOX => Some(Self::Rtox),
            _ => None,
        }
    }
}

/// Result of one DEP step, as seen by the orchestrator.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum DepStatus {
    Success,
    /// Unknown command or a frame that did not validate.
    Fail,
    /// No answer within the wait.
    Timeout,
    /// The peer sent or confirmed DSL.
    Deselected,
    /// The peer sent or confirmed RSL.
    Released,
}

const ATR_REQ_TLV_OFFSET: usize = 20;
const ATR_RES_TLV_OFFSET: usize = 21;
const ATR_RES_MAGIC_OFFSET: usize = 18;
/// Optional parameters byte: LLCP general bytes present, 254 byte frames.
const PP_GENERAL_BYTES: u8 = 0x32;
/// Target response timeout announced in ATR_RES.
const ATR_RES_TO: u8 = 0x07;

fn frame(cmd: DepCommand, body: &[u8]) -> Result<Vec<u8>> {
    let len = 3 + body.len();
    if len > crate::constants::RX_BUFFER_SIZE {
        return Err(Error::InvalidLength {
            expected: crate::constants::RX_BUFFER_SIZE,
            actual: len,
        });
    }
    let mut out = Vec::with_capacity(len);
    out.push(len as u8);
    out.extend_from_slice(&cmd.bytes());
    out.extend_from_slice(body);
    Ok(out)
}

/// Received frame trimmed to its length byte.
fn trimmed(data: &[u8]) -> Option<&[u8]> {
    let len = *data.first()? as usize;
    if len < 3 || len > data.len() {
        return None;
    }
    Some(&data[..len])
}

/// NFC-DEP endpoint state for one activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dep {
    pni: u8,
    pfb: Pfb,
    rtox: u8,
    nfcid3: Nfcid3,
    peer_nfcid3: Option<Nfcid3>,
    /// Active-mode target: accept ATR_REQ without an NFCID2 match.
    active: bool,
}

impl Default for Dep {
    fn default() -> Self {
        Self::new(Nfcid3::DEFAULT)
    }
}

impl Dep {
    pub fn new(nfcid3: Nfcid3) -> Self {
        Self {
            pni: 0,
            pfb: Pfb::Information,
            rtox: 0,
            nfcid3,
            peer_nfcid3: None,
            active: false,
        }
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn pni(&self) -> u8 {
        self.pni
    }

    pub fn pfb(&self) -> Pfb {
        self.pfb
    }

    /// RTOX value requested by the target in its last DEP_RES.
    pub fn rtox(&self) -> u8 {
        self.rtox
    }

    pub fn peer_nfcid3(&self) -> Option<&Nfcid3> {
        self.peer_nfcid3.as_ref()
    }

    fn advance_pni(&mut self) {
        self.pni = (self.pni + 1) & 0x03;
    }

    fn send<L: FrameLink + ?Sized>(&self, link: &mut L, frame: &[u8]) -> Result<()> {
        trace!("dep tx {}", crate::utils::bytes_to_hex_spaced(frame));
        link.write_frame(frame, true)
    }

    /// ATR_REQ addressed to the target's NFCID2, followed by the LLCP magic
    /// and link TLVs.
    pub fn send_atr_req<L: FrameLink + ?Sized>(
        &mut self,
        link: &mut L,
        llcp: &Llcp,
        target: &Nfcid2,
    ) -> Result<()> {
        let mut body = Vec::with_capacity(40);
        body.extend_from_slice(Nfcid3::from_nfcid2(target).as_bytes());
        // DID, BSi, BRi
        body.extend_from_slice(&[0x00, 0x00, 0x00, PP_GENERAL_BYTES]);
        body.extend_from_slice(&LLCP_MAGIC);
        body.extend_from_slice(&llcp.params().link_tlvs());
        self.send(link, &frame(DepCommand::AtrReq, &body)?)
    }

    pub fn send_atr_res<L: FrameLink + ?Sized>(&mut self, link: &mut L, llcp: &Llcp) -> Result<()> {
        let mut body = Vec::with_capacity(40);
        body.extend_from_slice(self.nfcid3.as_bytes());
        // DID, BSt, BRt
        body.extend_from_slice(&[0x00, 0x00, 0x00, ATR_RES_TO, PP_GENERAL_BYTES]);
        body.extend_from_slice(&LLCP_MAGIC);
        body.extend_from_slice(&llcp.params().link_tlvs());
        self.send(link, &frame(DepCommand::AtrRes, &body)?)
    }

    /// Ask the target to step up to 424 kbit/s.
    pub fn send_psl_req<L: FrameLink + ?Sized>(&mut self, link: &mut L) -> Result<()> {
        // DID 0, BRS 424 both ways, FSL 254 bytes
        self.send(link, &frame(DepCommand::PslReq, &[0x00, 0x12, 0x03])?)
    }

    pub fn send_psl_res<L: FrameLink + ?Sized>(&mut self, link: &mut L) -> Result<()> {
        self.send(link, &frame(DepCommand::PslRes, &[0x00])?)
    }

    /// DEP_REQ carrying the next LLCP PDU, or the RTOX acknowledgement when
    /// the target asked for more time.
    pub fn send_dep_req<L: FrameLink + ?Sized>(&mut self, link: &mut L, llcp: &mut Llcp) -> Result<()> {
        let body = match self.pfb {
            Pfb::Rtox => vec![Pfb::RTOX, self.rtox],
            Pfb::Ack => {
                let b = vec![Pfb::ACK | self.pni];
                self.advance_pni();
                b
            }
            _ => {
                let mut b = vec![self.pni];
                b.extend(llcp.state_machine()?);
                self.advance_pni();
                b
            }
        };
        self.send(link, &frame(DepCommand::DepReq, &body)?)
    }

    pub fn send_dep_res<L: FrameLink + ?Sized>(&mut self, link: &mut L, llcp: &mut Llcp) -> Result<()> {
        let body = match self.pfb {
            Pfb::Attention => vec![Pfb::ATTENTION],
            _ => {
                let mut b = vec![self.pni];
                b.extend(llcp.state_machine()?);
                self.advance_pni();
                b
            }
        };
        self.send(link, &frame(DepCommand::DepRes, &body)?)
    }

    /// Initiator round trip: DEP_REQ, then wait for the DEP_RES. A single
    /// RTOX request from the target is honoured with one extended wait.
    pub fn exchange<L: FrameLink + ?Sized>(
        &mut self,
        link: &mut L,
        llcp: &mut Llcp,
        timeout_ms: u64,
    ) -> Result<DepStatus> {
        self.send_dep_req(link, llcp)?;
        let status = self.await_response(link, llcp, timeout_ms)?;
        if status != DepStatus::Success || self.pfb != Pfb::Rtox {
            return Ok(status);
        }

        let wait = rtox_wait_ms(self.rtox);
        debug!("rtox {} -> waiting {} ms", self.rtox, wait);
        self.send_dep_req(link, llcp)?;
        self.pfb = Pfb::Information;
        let status = self.await_response(link, llcp, wait)?;
        if self.pfb == Pfb::Rtox {
            warn!("second rtox request not honoured");
            self.pfb = Pfb::Information;
            return Ok(DepStatus::Fail);
        }
        Ok(status)
    }

    fn await_response<L: FrameLink + ?Sized>(
        &mut self,
        link: &mut L,
        llcp: &mut Llcp,
        timeout_ms: u64,
    ) -> Result<DepStatus> {
        match link.wait_event(timeout_ms)? {
            IrqStatus::RxComplete => {
                let data = link.received().to_vec();
                self.process_received_data(&data, llcp)
            }
            IrqStatus::Timeout => Ok(DepStatus::Timeout),
            other => {
                debug!("dep wait ended with {}", other);
                Ok(DepStatus::Fail)
            }
        }
    }

    /// Initiator side: handle a response from the target.
    pub fn process_received_data(&mut self, data: &[u8], llcp: &mut Llcp) -> Result<DepStatus> {
        let Some(f) = trimmed(data) else {
            return Ok(DepStatus::Fail);
        };
        trace!("dep rx {}", crate::utils::bytes_to_hex_spaced(f));
        match DepCommand::from_code(be_u16_at(f, 1)?) {
            Some(DepCommand::AtrRes) => {
                if f.len() < ATR_RES_TLV_OFFSET
                    || f[ATR_RES_MAGIC_OFFSET..ATR_RES_TLV_OFFSET] != LLCP_MAGIC
                {
                    warn!("atr_res without llcp magic");
                    return Ok(DepStatus::Fail);
                }
                self.peer_nfcid3 = Some(Nfcid3::try_from(&f[3..13])?);
                if let Err(e) = llcp.process_tlvs(&f[ATR_RES_TLV_OFFSET..]) {
                    warn!("atr_res tlvs: {}", e);
                    return Ok(DepStatus::Fail);
                }
                self.pni = 0;
                self.pfb = Pfb::Information;
                debug!("atr_res ok, lto {} ms", llcp.lto_ms());
                Ok(DepStatus::Success)
            }
            Some(DepCommand::PslRes) if f.len() >= 4 && f[3] == 0x00 => Ok(DepStatus::Success),
            Some(DepCommand::DepRes) if f.len() >= 4 => match Pfb::classify(f[3]) {
                Some(Pfb::Rtox) if f.len() >= 5 => {
                    self.rtox = f[4] & 0x3F;
                    self.pfb = Pfb::Rtox;
                    Ok(DepStatus::Success)
                }
                Some(Pfb::Information) => {
                    self.pfb = Pfb::Information;
                    match llcp.process_received_data(&f[4..]) {
                        Ok(_) => Ok(DepStatus::Success),
                        Err(e) => {
                            warn!("llcp: {}", e);
                            Ok(DepStatus::Fail)
                        }
                    }
                }
                Some(Pfb::Ack) | Some(Pfb::Attention) => Ok(DepStatus::Success),
                _ => Ok(DepStatus::Fail),
            },
            Some(DepCommand::DslRes) => Ok(DepStatus::Deselected),
            Some(DepCommand::RslRes) => Ok(DepStatus::Released),
            _ => Ok(DepStatus::Fail),
        }
    }

    /// Target side: handle a request from the initiator and answer it.
    pub fn process_received_request<L: FrameLink + ?Sized>(
        &mut self,
        link: &mut L,
        data: &[u8],
        our_nfcid2: &Nfcid2,
        llcp: &mut Llcp,
    ) -> Result<DepStatus> {
        let Some(f) = trimmed(data) else {
            return Ok(DepStatus::Fail);
        };
        trace!("dep rx {}", crate::utils::bytes_to_hex_spaced(f));
        match DepCommand::from_code(be_u16_at(f, 1)?) {
            Some(DepCommand::AtrReq) if f.len() >= ATR_REQ_TLV_OFFSET => {
                if !self.active && f[3..11] != our_nfcid2.as_bytes()[..] {
                    debug!("atr_req for another nfcid2");
                    return Ok(DepStatus::Fail);
                }
                self.peer_nfcid3 = Some(Nfcid3::try_from(&f[3..13])?);
                if let Err(e) = llcp.process_tlvs(&f[ATR_REQ_TLV_OFFSET..]) {
                    warn!("atr_req tlvs: {}", e);
                }
                self.send_atr_res(link, llcp)?;
                self.pni = 0;
                self.pfb = Pfb::Information;
                Ok(DepStatus::Success)
            }
            Some(DepCommand::PslReq) if f.len() >= 5 => {
                let (brs, fsl) = (f[4], f.get(5).copied().unwrap_or(0));
                if (brs & 0x38) == 0x10 && (brs & 0x07) == 0x02 {
                    self.send_psl_res(link)?;
                    link.set_mode(TrfMode::P2pPassiveTarget, Frequency::Kbps424)?;
                    debug!("psl_req accepted, fsl {}", fsl & 0x03);
                    Ok(DepStatus::Success)
                } else {
                    warn!("psl_req brs {:#04x} not supported", brs);
                    Ok(DepStatus::Fail)
                }
            }
            Some(DepCommand::DepReq) if f.len() >= 4 => {
                self.pni = f[3] & 0x03;
                match Pfb::classify(f[3]) {
                    Some(Pfb::Information) => {
                        self.pfb = Pfb::Information;
                        if let Err(e) = llcp.process_received_data(&f[4..]) {
                            warn!("llcp: {}", e);
                            return Ok(DepStatus::Fail);
                        }
                    }
                    Some(Pfb::Attention) => self.pfb = Pfb::Attention,
                    Some(_) => self.pfb = Pfb::Information,
                    None => return Ok(DepStatus::Fail),
                }
                self.send_dep_res(link, llcp)?;
                self.pfb = Pfb::Information;
                Ok(DepStatus::Success)
            }
            Some(DepCommand::DslReq) => {
                self.send(link, &frame(DepCommand::DslRes, &[])?)?;
                Ok(DepStatus::Deselected)
            }
            Some(DepCommand::RslReq) if f.len() == 3 => {
                self.send(link, &frame(DepCommand::RslRes, &[])?)?;
                Ok(DepStatus::Released)
            }
            _ => Ok(DepStatus::Fail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::p2p::llcp::{pdu_header, PduType};
    use crate::transport::mock::MockLink;

    fn atr_res(nfcid3: &Nfcid3, tlvs: &[u8]) -> Vec<u8> {
        let mut body = nfcid3.as_bytes().to_vec();
        body.extend_from_slice(&[0, 0, 0, 0x07, 0x32]);
        body.extend_from_slice(&LLCP_MAGIC);
        body.extend_from_slice(tlvs);
        frame(DepCommand::AtrRes, &body).unwrap()
    }

    #[test]
    fn atr_req_layout() {
        let mut link = MockLink::new();
        let mut dep = Dep::default();
        let llcp = Llcp::default();
        dep.send_atr_req(&mut link, &llcp, &Nfcid2::DEFAULT).unwrap();
        let f = link.last_sent().unwrap();
        assert_eq!(f[0] as usize, f.len());
        assert_eq!(&f[1..3], &[0xD4, 0x00]);
        assert_eq!(&f[3..11], Nfcid2::DEFAULT.as_bytes());
        assert_eq!(&f[11..13], &[0, 0]);
        assert_eq!(f[16], 0x32);
        assert_eq!(&f[17..20], &LLCP_MAGIC);
        assert_eq!(&f[20..], &llcp.params().link_tlvs()[..]);
    }

    #[test]
    fn atr_res_is_parsed() {
        let mut dep = Dep::default();
        let mut llcp = Llcp::default();
        let peer = Nfcid3::from_bytes([9; 10]);
        let res = atr_res(&peer, &[0x04, 0x01, 0x0A]);
        assert_eq!(dep.process_received_data(&res, &mut llcp).unwrap(), DepStatus::Success);
        assert_eq!(dep.peer_nfcid3(), Some(&peer));
        assert_eq!(llcp.lto_ms(), 100);

        let mut bad = res.clone();
        bad[19] = 0x00;
        assert_eq!(dep.process_received_data(&bad, &mut llcp).unwrap(), DepStatus::Fail);
    }

    #[test]
    fn dep_req_wraps_llcp_and_counts_pni() {
        let mut link = MockLink::new();
        let mut dep = Dep::default();
        let mut llcp = Llcp::default();
        for pni in 0..5u8 {
            dep.send_dep_req(&mut link, &mut llcp).unwrap();
            assert_eq!(link.last_sent().unwrap(), &[0x06, 0xD4, 0x06, pni % 4, 0x00, 0x00]);
        }
    }

    #[test]
    fn rtox_gets_one_extension() {
        let mut link = MockLink::new();
        link.push_rx(vec![0x05, 0xD5, 0x07, 0x90, 0x05]);
        link.push_rx(vec![0x06, 0xD5, 0x07, 0x00, 0x00, 0x00]);
        let mut dep = Dep::default();
        let mut llcp = Llcp::default();
        assert_eq!(dep.exchange(&mut link, &mut llcp, 100).unwrap(), DepStatus::Success);
        assert_eq!(link.sent[1], vec![0x05, 0xD4, 0x06, 0x90, 0x05]);
        assert_eq!(link.waits, vec![100, rtox_wait_ms(5)]);
        assert_eq!(dep.pfb(), Pfb::Information);
    }

    #[test]
    fn second_rtox_fails() {
        let mut link = MockLink::new();
        link.push_rx(vec![0x05, 0xD5, 0x07, 0x90, 0x01]);
        link.push_rx(vec![0x05, 0xD5, 0x07, 0x90, 0x01]);
        let mut dep = Dep::default();
        let mut llcp = Llcp::default();
        assert_eq!(dep.exchange(&mut link, &mut llcp, 100).unwrap(), DepStatus::Fail);
        assert_eq!(link.sent.len(), 2);
    }

    #[test]
    fn exchange_timeout() {
        let mut link = MockLink::new();
        let mut dep = Dep::default();
        let mut llcp = Llcp::default();
        assert_eq!(dep.exchange(&mut link, &mut llcp, 50).unwrap(), DepStatus::Timeout);
    }

    #[test]
    fn target_answers_atr_req_for_its_nfcid2() {
        let mut initiator = MockLink::new();
        let llcp_i = Llcp::default();
        Dep::default()
            .send_atr_req(&mut initiator, &llcp_i, &Nfcid2::DEFAULT)
            .unwrap();
        let req = initiator.last_sent().unwrap().to_vec();

        let mut link = MockLink::new();
        let mut dep = Dep::new(Nfcid3::from_bytes([7; 10]));
        let mut llcp = Llcp::default();
        let status = dep
            .process_received_request(&mut link, &req, &Nfcid2::DEFAULT, &mut llcp)
            .unwrap();
        assert_eq!(status, DepStatus::Success);
        let res = link.last_sent().unwrap();
        assert_eq!(&res[1..3], &[0xD5, 0x01]);
        assert_eq!(&res[3..13], &[7; 10]);
        assert_eq!(&res[18..21], &LLCP_MAGIC);
        assert_eq!(llcp.miu(), 248);

        let other = Nfcid2::from_bytes([0x01, 0xFE, 0, 0, 0, 0, 0, 0]);
        let status = dep
            .process_received_request(&mut link, &req, &other, &mut llcp)
            .unwrap();
        assert_eq!(status, DepStatus::Fail);
        dep.set_active(true);
        let status = dep
            .process_received_request(&mut link, &req, &other, &mut llcp)
            .unwrap();
        assert_eq!(status, DepStatus::Success);
    }

    #[test]
    fn target_psl_switches_to_424() {
        let mut link = MockLink::new();
        let mut dep = Dep::default();
        let mut llcp = Llcp::default();
        let req = [0x06, 0xD4, 0x04, 0x00, 0x12, 0x03];
        let status = dep
            .process_received_request(&mut link, &req, &Nfcid2::DEFAULT, &mut llcp)
            .unwrap();
        assert_eq!(status, DepStatus::Success);
        assert_eq!(link.last_sent().unwrap(), &[0x04, 0xD5, 0x05, 0x00]);
        assert_eq!(
            link.mode_changes,
            vec![(TrfMode::P2pPassiveTarget, Frequency::Kbps424)]
        );

        let slow = [0x06, 0xD4, 0x04, 0x00, 0x00, 0x03];
        let status = dep
            .process_received_request(&mut link, &slow, &Nfcid2::DEFAULT, &mut llcp)
            .unwrap();
        assert_eq!(status, DepStatus::Fail);
    }

    #[test]
    fn target_dep_req_round_trip() {
        let mut link = MockLink::new();
        let mut dep = Dep::default();
        let mut llcp = Llcp::default();
        let mut req = vec![0x00, 0xD4, 0x06, 0x01];
        req.extend_from_slice(&pdu_header(0x01, PduType::Connect, 0x20));
        req[0] = req.len() as u8;
        let status = dep
            .process_received_request(&mut link, &req, &Nfcid2::DEFAULT, &mut llcp)
            .unwrap();
        assert_eq!(status, DepStatus::Success);
        let res = link.last_sent().unwrap();
        assert_eq!(&res[1..4], &[0xD5, 0x07, 0x01]);
        assert_eq!(&res[4..6], &pdu_header(0x20, PduType::Cc, 0x04));
    }

    #[test]
    fn target_dsl_rsl_and_unknown() {
        let mut link = MockLink::new();
        let mut dep = Dep::default();
        let mut llcp = Llcp::default();
        let n = Nfcid2::DEFAULT;
        assert_eq!(
            dep.process_received_request(&mut link, &[0x04, 0xD4, 0x08, 0x00], &n, &mut llcp)
                .unwrap(),
            DepStatus::Deselected
        );
        assert_eq!(link.last_sent().unwrap(), &[0x03, 0xD5, 0x09]);
        assert_eq!(
            dep.process_received_request(&mut link, &[0x03, 0xD4, 0x0A], &n, &mut llcp)
                .unwrap(),
            DepStatus::Released
        );
        assert_eq!(link.last_sent().unwrap(), &[0x03, 0xD5, 0x0B]);
        assert_eq!(
            dep.process_received_request(&mut link, &[0x03, 0xD4, 0x0C], &n, &mut llcp)
                .unwrap(),
            DepStatus::Fail
        );
        assert_eq!(
            dep.process_received_request(&mut link, &[0x09, 0xD4], &n, &mut llcp)
                .unwrap(),
            DepStatus::Fail
        );
    }
}
