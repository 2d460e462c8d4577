#[path = "../common/mod.rs"]
mod common;

use serial_test::serial;
use trfnfc::device::mode::{Frequency, TrfMode};
use trfnfc::p2p::{
    DepStatus, LlcpConnectionStatus, P2pConfig, P2pRole, P2pSession, P2pState,
    SnepConnectionStatus, SnepPacketStatus,
};
use trfnfc::transport::mock::MockLink;

use common::field::ScriptedTarget;
use common::fixtures;

#[test]
#[serial]
fn put_single_fragment_to_peer() -> anyhow::Result<()> {
    common::init_logger();
    let mut link = MockLink::new();
    let target = ScriptedTarget::new(fixtures::peer_nfcid2()).attach(&mut link);

    let mut session = P2pSession::new(P2pRole::Initiator, Frequency::Kbps424, P2pConfig::default());
    session.send_packet(&fixtures::uri_message())?;

    assert_eq!(session.poll(&mut link)?, P2pState::ParameterSelection);
    assert_eq!(session.poll(&mut link)?, P2pState::DataExchange);
    for _ in 0..10 {
        assert_eq!(session.poll(&mut link)?, P2pState::DataExchange);
    }

    assert!(!session.tx_pending());
    assert_eq!(session.llcp().status(), LlcpConnectionStatus::Idle);
    assert_eq!(session.llcp().snep().status(), SnepConnectionStatus::Idle);
    // no PSL at 424 kbit/s
    assert!(link.mode_changes.is_empty());

    let mut peer = target.borrow_mut();
    assert!(peer.statuses.iter().all(|s| *s == DepStatus::Success));
    let rx = peer.llcp.receive_status();
    assert_eq!(rx.status, SnepPacketStatus::Completed);
    assert_eq!(rx.object_len, 16);
    assert_eq!(rx.data, fixtures::uri_message());
    assert_eq!(peer.llcp.status(), LlcpConnectionStatus::Idle);
    Ok(())
}

#[test]
#[serial]
fn put_in_fragments_after_psl() -> anyhow::Result<()> {
    common::init_logger();
    let mut link = MockLink::new();
    let target = ScriptedTarget::new(fixtures::peer_nfcid2()).attach(&mut link);

    let object: Vec<u8> = (0..600u32).map(|i| (i % 251) as u8).collect();
    let mut session = P2pSession::new(P2pRole::Initiator, Frequency::Kbps212, P2pConfig::default());
    session.send_packet(&object)?;

    session.poll(&mut link)?;
    assert_eq!(session.poll(&mut link)?, P2pState::DataExchange);
    assert_eq!(link.mode_changes, vec![(TrfMode::P2pInitiator, Frequency::Kbps424)]);
    assert_eq!(session.llcp().miu(), 248);

    let mut rebuilt = Vec::new();
    let mut fragments = Vec::new();
    for _ in 0..20 {
        session.poll(&mut link)?;
        let rx = target.borrow_mut().llcp.receive_status();
        if rx.status != SnepPacketStatus::NoFragment {
            fragments.push(rx.status);
            rebuilt.extend(rx.data);
        }
    }

    assert_eq!(
        fragments,
        vec![
            SnepPacketStatus::FirstFragment,
            SnepPacketStatus::NFragment,
            SnepPacketStatus::Completed,
        ]
    );
    assert_eq!(rebuilt, object);
    assert_eq!(session.llcp().snep().status(), SnepConnectionStatus::Idle);
    assert!(link.sent.iter().all(|f| f.len() <= 255));
    Ok(())
}

#[test]
fn silent_peer_drops_back_to_activation() -> anyhow::Result<()> {
    let mut link = MockLink::new();
    let target = ScriptedTarget::new(fixtures::peer_nfcid2()).attach(&mut link);
    let mut session = P2pSession::new(P2pRole::Initiator, Frequency::Kbps424, P2pConfig::default());
    session.poll(&mut link)?;
    session.poll(&mut link)?;
    assert_eq!(session.state(), P2pState::DataExchange);

    link.set_responder(|_| None);
    drop(target);
    assert_eq!(session.poll(&mut link)?, P2pState::ProtocolActivation);
    assert_eq!(link.transmitter_disabled, 1);
    Ok(())
}
