// trfnfc/src/p2p/orchestrator.rs
//! Peer-to-peer session: NFC-F discovery, NFC-DEP activation and the LLCP
//! data exchange loop, pumped one step at a time by the application.

use derive_more::Display;
use log::{debug, info, warn};

use crate::constants::{ATR_TIMEOUT_MS, SENSF_TIMEOUT_MS, TARGET_POLL_TIMEOUT_MS};
use crate::device::irq::IrqStatus;
use crate::device::mode::{Frequency, TrfMode};
use crate::p2p::dep::{Dep, DepStatus};
use crate::p2p::llcp::{Llcp, LlcpParams, PduType};
use crate::p2p::nfc_f::NfcF;
use crate::p2p::snep::SnepReceive;
use crate::transport::link::FrameLink;
use crate::types::{Nfcid2, Nfcid3};
use crate::Result;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum P2pState {
    #[default]
    ProtocolActivation,
    ParameterSelection,
    DataExchange,
    Deactivation,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum P2pRole {
    Initiator,
    PassiveTarget,
    ActiveTarget,
}

impl P2pRole {
    pub fn mode(self) -> TrfMode {
        match self {
            P2pRole::Initiator => TrfMode::P2pInitiator,
            P2pRole::PassiveTarget => TrfMode::P2pPassiveTarget,
            P2pRole::ActiveTarget => TrfMode::P2pActiveTarget,
        }
    }
}

/// Identifiers this device presents on the RF link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct P2pConfig {
    pub nfcid2: Nfcid2,
    pub nfcid3: Nfcid3,
    pub llcp: LlcpParams,
}

pub struct P2pSession {
    role: P2pRole,
    frequency: Frequency,
    state: P2pState,
    config: P2pConfig,
    nfc_f: NfcF,
    dep: Dep,
    llcp: Llcp,
    tx_pending: bool,
    timeout_ms: u64,
}

impl P2pSession {
    pub fn new(role: P2pRole, frequency: Frequency, config: P2pConfig) -> Self {
        let mut dep = Dep::new(config.nfcid3);
        dep.set_active(role == P2pRole::ActiveTarget);
        Self {
            role,
            frequency,
            state: P2pState::ProtocolActivation,
            config,
            nfc_f: NfcF::new(config.nfcid2),
            dep,
            llcp: Llcp::new(config.llcp),
            tx_pending: false,
            timeout_ms: ATR_TIMEOUT_MS,
        }
    }

    pub fn role(&self) -> P2pRole {
        self.role
    }

    pub fn state(&self) -> P2pState {
        self.state
    }

    pub fn llcp(&self) -> &Llcp {
        &self.llcp
    }

    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Queue an NDEF message for a SNEP PUT. It goes out once the link is
    /// up and LLCP is free to open a connection.
    pub fn send_packet(&mut self, data: &[u8]) -> Result<()> {
        self.llcp.snep_mut().setup_packet(data)?;
        self.tx_pending = true;
        Ok(())
    }

    pub fn tx_pending(&self) -> bool {
        self.tx_pending
    }

    /// Fragment received since the last call, if any.
    pub fn receive_state(&mut self) -> SnepReceive {
        self.llcp.receive_status()
    }

    fn goto(&mut self, state: P2pState) {
        if self.state != state {
            debug!("p2p {} -> {}", self.state, state);
            self.state = state;
        }
    }

    fn restart<L: FrameLink + ?Sized>(&mut self, link: &mut L) -> Result<()> {
        self.goto(P2pState::ProtocolActivation);
        link.disable_transmitter()
    }

    /// Run one step of the state machine and return the new state.
    pub fn poll<L: FrameLink + ?Sized>(&mut self, link: &mut L) -> Result<P2pState> {
        match self.state {
            P2pState::ProtocolActivation => self.activate(link)?,
            P2pState::ParameterSelection => self.select_parameters(link)?,
            P2pState::DataExchange => self.exchange(link)?,
            P2pState::Deactivation => self.goto(P2pState::ProtocolActivation),
        }
        Ok(self.state)
    }

    fn activate<L: FrameLink + ?Sized>(&mut self, link: &mut L) -> Result<()> {
        if let Err(e) = link.init_for_mode(self.role.mode(), self.frequency) {
            debug!("{} init failed: {}", self.role, e);
            return Ok(());
        }

        match self.role {
            P2pRole::Initiator => {
                self.nfc_f.send_sensf_req(link)?;
                let found = link.wait_event(SENSF_TIMEOUT_MS)? == IrqStatus::RxComplete && {
                    let frame = link.received().to_vec();
                    self.nfc_f.process_received(link, &frame)?.is_some()
                };
                if found {
                    self.goto(P2pState::ParameterSelection);
                } else {
                    link.disable_transmitter()?;
                }
            }
            P2pRole::PassiveTarget => {
                while link.wait_event(TARGET_POLL_TIMEOUT_MS)? != IrqStatus::Timeout {
                    let frame = link.received().to_vec();
                    if self.nfc_f.process_received(link, &frame)?.is_some() {
                        self.goto(P2pState::ParameterSelection);
                        break;
                    }
                }
            }
            P2pRole::ActiveTarget => {
                self.llcp.init();
                while link.wait_event(TARGET_POLL_TIMEOUT_MS)? != IrqStatus::Timeout {
                    let frame = link.received().to_vec();
                    let status = self.dep.process_received_request(
                        link,
                        &frame,
                        &self.config.nfcid2,
                        &mut self.llcp,
                    )?;
                    if status == DepStatus::Success {
                        self.timeout_ms = ATR_TIMEOUT_MS;
                        self.goto(P2pState::DataExchange);
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn select_parameters<L: FrameLink + ?Sized>(&mut self, link: &mut L) -> Result<()> {
        self.llcp.init();
        match self.role {
            P2pRole::Initiator => {
                let target = *self.nfc_f.nfcid2();
                self.dep.send_atr_req(link, &self.llcp, &target)?;
                let status = match link.wait_event(ATR_TIMEOUT_MS)? {
                    IrqStatus::RxComplete => {
                        let frame = link.received().to_vec();
                        self.dep.process_received_data(&frame, &mut self.llcp)?
                    }
                    _ => DepStatus::Timeout,
                };
                if status != DepStatus::Success {
                    return self.restart(link);
                }

                if self.frequency == Frequency::Kbps212 {
                    self.dep.send_psl_req(link)?;
                    match link.wait_event(ATR_TIMEOUT_MS)? {
                        IrqStatus::RxComplete => {
                            let frame = link.received().to_vec();
                            if self.dep.process_received_data(&frame, &mut self.llcp)?
                                == DepStatus::Success
                            {
                                self.frequency = Frequency::Kbps424;
                                link.set_mode(TrfMode::P2pInitiator, Frequency::Kbps424)?;
                            }
                        }
                        IrqStatus::Timeout => return self.restart(link),
                        _ => {}
                    }
                }

                self.timeout_ms = self.llcp.lto_ms();
                info!("p2p link up at {}, lto {} ms", self.frequency, self.timeout_ms);
                self.goto(P2pState::DataExchange);
            }
            P2pRole::PassiveTarget | P2pRole::ActiveTarget => {
                let status = match link.wait_event(ATR_TIMEOUT_MS)? {
                    IrqStatus::RxComplete => {
                        let frame = link.received().to_vec();
                        self.dep.process_received_request(
                            link,
                            &frame,
                            &self.config.nfcid2,
                            &mut self.llcp,
                        )?
                    }
                    _ => DepStatus::Timeout,
                };
                if status == DepStatus::Success {
                    self.timeout_ms = ATR_TIMEOUT_MS;
                    self.goto(P2pState::DataExchange);
                } else {
                    self.goto(P2pState::ProtocolActivation);
                }
            }
        }
        Ok(())
    }

    fn queue_connect(&mut self) {
        if self.tx_pending && self.llcp.set_next_pdu(PduType::Connect).is_ok() {
            self.tx_pending = false;
        }
    }

    fn exchange<L: FrameLink + ?Sized>(&mut self, link: &mut L) -> Result<()> {
        match self.role {
            P2pRole::Initiator => {
                match self.dep.exchange(link, &mut self.llcp, self.timeout_ms)? {
                    DepStatus::Success => self.queue_connect(),
                    DepStatus::Timeout => {
                        warn!("p2p link timeout");
                        self.restart(link)?;
                    }
                    other => {
                        debug!("dep exchange ended with {}", other);
                        self.goto(P2pState::ProtocolActivation);
                    }
                }
            }
            P2pRole::PassiveTarget | P2pRole::ActiveTarget => loop {
                match link.wait_event(self.timeout_ms)? {
                    IrqStatus::Idle | IrqStatus::RfFieldChange => continue,
                    IrqStatus::RxComplete => {
                        self.queue_connect();
                        let frame = link.received().to_vec();
                        let status = self.dep.process_received_request(
                            link,
                            &frame,
                            &self.config.nfcid2,
                            &mut self.llcp,
                        )?;
                        if status != DepStatus::Success {
                            debug!("dep request ended with {}", status);
                            self.goto(P2pState::ProtocolActivation);
                        }
                        break;
                    }
                    other => {
                        debug!("p2p target wait ended with {}", other);
                        self.goto(P2pState::ProtocolActivation);
                        break;
                    }
                }
            },
        }
        Ok(())
    }
}
