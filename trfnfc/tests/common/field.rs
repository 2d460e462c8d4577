// field.rs: simulated card fields and a scripted NFC-DEP target peer

use std::cell::RefCell;
use std::rc::Rc;

#[cfg(feature = "iso15693")]
use trfnfc::reader::iso15693::{CardTable, Iso15693Config};
use trfnfc::test_support::{SimulatedField, SimulatedTypeA, SimulatedVicinity};
use trfnfc::types::{Nfcid2, Nfcid3, Uid};

#[cfg(feature = "p2p")]
use trfnfc::p2p::{Dep, DepStatus, Llcp, LlcpParams, NfcF};
#[cfg(feature = "p2p")]
use trfnfc::transport::mock::MockLink;

pub fn type_a_field(uids: &[Uid]) -> SimulatedField {
    uids.iter()
        .fold(SimulatedField::new(), |f, uid| f.with_type_a(SimulatedTypeA::new(*uid)))
}

pub fn vicinity_field(uids: &[[u8; 8]]) -> SimulatedField {
    uids.iter()
        .fold(SimulatedField::new(), |f, uid| f.with_vicinity(SimulatedVicinity::new(*uid)))
}

#[cfg(feature = "iso15693")]
pub fn scan(field: &mut SimulatedField) -> CardTable {
    let mut table = CardTable::new();
    trfnfc::reader::iso15693::anticollision_16_slots(
        field,
        &Iso15693Config::default(),
        &[],
        0,
        &mut table,
    )
    .unwrap();
    table
}

/// A passive NFC-DEP target built from the crate's own NFC-F, DEP and LLCP
/// layers. Each frame written by the initiator is answered synchronously.
#[cfg(feature = "p2p")]
pub struct ScriptedTarget {
    pub nfcid2: Nfcid2,
    pub nfc_f: NfcF,
    pub dep: Dep,
    pub llcp: Llcp,
    pub statuses: Vec<DepStatus>,
    link: MockLink,
}

#[cfg(feature = "p2p")]
impl ScriptedTarget {
    pub fn new(nfcid2: Nfcid2) -> Self {
        Self {
            nfcid2,
            nfc_f: NfcF::new(nfcid2),
            dep: Dep::new(Nfcid3::from_nfcid2(&nfcid2)),
            llcp: Llcp::new(LlcpParams::default()),
            statuses: Vec::new(),
            link: MockLink::new(),
        }
    }

    pub fn respond(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        self.link.sent.clear();
        if frame.get(1) == Some(&0xD4) {
            let status = self
                .dep
                .process_received_request(&mut self.link, frame, &self.nfcid2, &mut self.llcp)
                .ok()?;
            self.statuses.push(status);
        } else {
            self.nfc_f.process_received(&mut self.link, frame).ok()?;
        }
        self.link.sent.pop()
    }

    /// Install this target as the responder of `link`; the returned handle
    /// stays usable for inspection.
    pub fn attach(self, link: &mut MockLink) -> Rc<RefCell<ScriptedTarget>> {
        let shared = Rc::new(RefCell::new(self));
        let peer = Rc::clone(&shared);
        link.set_responder(move |frame| peer.borrow_mut().respond(frame));
        shared
    }
}
