#[path = "../common/mod.rs"]
mod common;

use trfnfc::hci::{drain_events, HciEventKind, RxRing};

#[test]
fn event_split_across_reads() {
    let msg = common::fixtures::hci_init_done(6);
    assert_eq!(msg.len(), 9);
    let mut ring = RxRing::new();

    let (events, dropped) = drain_events(&mut ring, &msg[..4]);
    assert!(events.is_empty());
    assert_eq!(dropped, 0);

    let (events, _) = drain_events(&mut ring, &msg[4..8]);
    assert!(events.is_empty());
    assert_eq!(ring.len(), 8);

    let (events, _) = drain_events(&mut ring, &msg[8..]);
    assert_eq!(events.len(), 1);
    let ev = events[0].as_ref().unwrap();
    assert_eq!(ev.kind(), Some(HciEventKind::DeviceInitDone));
    assert_eq!(ev.data, msg);
    assert!(ring.is_empty());
}

#[test]
fn back_to_back_events_in_one_read() {
    let mut stream = common::fixtures::hci_init_done(6);
    stream.extend(common::fixtures::hci_init_done(40));
    stream.extend_from_slice(&[0x04, 0xFF]);

    let mut ring = RxRing::new();
    let (events, dropped) = drain_events(&mut ring, &stream);
    assert_eq!(dropped, 0);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].as_ref().unwrap().data.len(), 43);
    // head of a third message stays buffered
    assert_eq!(ring.len(), 2);
}

#[test]
fn overlong_burst_drops_the_tail() {
    let mut ring = RxRing::new();
    // announces more than the ring holds, so it never completes
    let mut stream = vec![0x04, 0xFF, 0xF0];
    stream.resize(200, 0x00);
    let (events, dropped) = drain_events(&mut ring, &stream);
    assert!(events.is_empty());
    assert!(ring.is_full());
    assert_eq!(dropped, 200 - RxRing::CAPACITY);
}

#[test]
fn indices_wrap_over_many_events() {
    let mut ring = RxRing::new();
    let msg = common::fixtures::hci_init_done(20);
    for _ in 0..20 {
        let (events, dropped) = drain_events(&mut ring, &msg);
        assert_eq!((events.len(), dropped), (1, 0));
        assert_eq!(ring.read_index(), ring.write_index());
    }
}
