#[path = "../common/mod.rs"]
mod common;

use trfnfc::device::irq::IrqStatus;
use trfnfc::device::mode::Frequency;
use trfnfc::p2p::nfc_f::{sensf_request, sensf_response};
use trfnfc::p2p::{Dep, Llcp, P2pConfig, P2pRole, P2pSession, P2pState};
use trfnfc::transport::mock::MockLink;
use trfnfc::types::Nfcid2;

fn atr_req_for(nfcid2: &Nfcid2) -> Vec<u8> {
    let mut scratch = MockLink::new();
    Dep::default()
        .send_atr_req(&mut scratch, &Llcp::default(), nfcid2)
        .unwrap();
    scratch.sent.pop().unwrap()
}

fn passive_target() -> P2pSession {
    P2pSession::new(P2pRole::PassiveTarget, Frequency::Kbps212, P2pConfig::default())
}

#[test]
fn passive_target_activation_and_deselect() -> anyhow::Result<()> {
    common::init_logger();
    let mut link = MockLink::new();
    let mut session = passive_target();

    link.push_rx(sensf_request().to_vec());
    assert_eq!(session.poll(&mut link)?, P2pState::ParameterSelection);
    assert_eq!(link.last_sent().unwrap(), &sensf_response(&Nfcid2::DEFAULT)[..]);

    link.push_rx(atr_req_for(&Nfcid2::DEFAULT));
    assert_eq!(session.poll(&mut link)?, P2pState::DataExchange);
    let atr_res = link.last_sent().unwrap();
    assert_eq!(&atr_res[1..3], &[0xD5, 0x01]);

    // field fluctuations are skipped while waiting for the next request
    link.push_event(IrqStatus::RfFieldChange);
    link.push_rx(vec![0x06, 0xD4, 0x06, 0x00, 0x00, 0x00]);
    assert_eq!(session.poll(&mut link)?, P2pState::DataExchange);
    assert_eq!(link.last_sent().unwrap(), &[0x06, 0xD5, 0x07, 0x00, 0x00, 0x00]);

    link.push_rx(vec![0x03, 0xD4, 0x08]);
    assert_eq!(session.poll(&mut link)?, P2pState::ProtocolActivation);
    assert_eq!(link.last_sent().unwrap(), &[0x03, 0xD5, 0x09]);
    Ok(())
}

#[test]
fn atr_req_for_another_target_is_ignored() -> anyhow::Result<()> {
    let mut link = MockLink::new();
    let mut session = passive_target();
    link.push_rx(sensf_request().to_vec());
    session.poll(&mut link)?;

    let other = common::fixtures::peer_nfcid2();
    link.push_rx(atr_req_for(&other));
    assert_eq!(session.poll(&mut link)?, P2pState::ProtocolActivation);
    assert_eq!(link.sent.len(), 1);
    Ok(())
}

#[test]
fn active_target_accepts_any_atr_req() -> anyhow::Result<()> {
    let mut link = MockLink::new();
    let mut session = P2pSession::new(P2pRole::ActiveTarget, Frequency::Kbps424, P2pConfig::default());
    link.push_rx(atr_req_for(&common::fixtures::peer_nfcid2()));
    assert_eq!(session.poll(&mut link)?, P2pState::DataExchange);
    assert_eq!(session.dep().peer_nfcid3().map(|n| n.as_bytes()[0]), Some(0x01));
    Ok(())
}

#[test]
fn target_times_out_without_initiator() -> anyhow::Result<()> {
    let mut link = MockLink::new();
    let mut session = passive_target();
    link.push_rx(sensf_request().to_vec());
    session.poll(&mut link)?;
    link.push_rx(atr_req_for(&Nfcid2::DEFAULT));
    session.poll(&mut link)?;

    assert_eq!(session.poll(&mut link)?, P2pState::ProtocolActivation);
    Ok(())
}
