#[path = "../common/mod.rs"]
mod common;

use trfnfc::hci::{bond_command, drain_events, BleDevice, DeviceTable, HciEvent, HciEventKind, LtkData, RxRing};
use trfnfc::Error;

fn device_info(addr: [u8; 6], name: &str) -> Vec<u8> {
    let mut msg = vec![0x04, 0xFF, 0x00, 0x0D, 0x06, 0x00, 0x04, 0x00];
    msg.extend_from_slice(&addr);
    msg.extend_from_slice(&[0xB0, name.len() as u8 + 2, name.len() as u8 + 1, 0x09]);
    msg.extend_from_slice(name.as_bytes());
    msg[2] = (msg.len() - 3) as u8;
    msg
}

fn authentication_done(ltk: &[u8]) -> Vec<u8> {
    let mut msg = vec![0x04, 0xFF, 0x00, 0x0A, 0x06, 0x00];
    msg.resize(37, 0x00);
    msg.push(0x01);
    msg.push(ltk.len() as u8);
    msg.extend_from_slice(ltk);
    msg.extend_from_slice(&[0xD1, 0xD2]);
    msg.extend_from_slice(&[0x11; 8]);
    msg[2] = (msg.len() - 3) as u8;
    msg
}

#[test]
fn discovery_and_pairing_flow() -> anyhow::Result<()> {
    common::init_logger();
    let mut stream = device_info([0xA0, 1, 2, 3, 4, 5], "Thermo");
    stream.extend(device_info([0xB0, 1, 2, 3, 4, 5], "Scale"));
    stream.extend(authentication_done(&[0x5A; 16]));

    let mut ring = RxRing::new();
    let (events, dropped) = drain_events(&mut ring, &stream);
    assert_eq!(dropped, 0);
    let events: Vec<HciEvent> = events.into_iter().collect::<Result<_, _>>()?;
    assert_eq!(events.len(), 3);

    let mut table = DeviceTable::new();
    for ev in events.iter().filter(|e| e.kind() == Some(HciEventKind::DeviceInfo)) {
        if let Some(dev) = BleDevice::from_device_info(&ev.data)? {
            table.insert(dev)?;
        }
    }
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(0).map(|d| d.name.as_str()), Some("Thermo"));

    let auth = &events[2];
    assert_eq!(auth.kind(), Some(HciEventKind::AuthenticationDone));
    let keys = LtkData::from_authentication_done(&auth.data)?;
    assert_eq!(keys.div, [0xD1, 0xD2]);
    let idx = table.position(&[0xB0, 1, 2, 3, 4, 5]).unwrap();
    table.bond(idx, keys)?;

    let dev = table.get(idx).unwrap();
    let cmd = bond_command(0x0042, dev.ltk.as_ref().unwrap());
    assert_eq!(&cmd[..6], &[0x01, 0x0F, 0xFE, 30, 0x42, 0x00]);
    assert_eq!(cmd.len(), 4 + cmd[3] as usize);
    Ok(())
}

#[test]
fn command_status_carries_opcode() -> anyhow::Result<()> {
    let ev = HciEvent::parse(&[0x04, 0xFF, 0x06, 0x7F, 0x06, 0x00, 0x0F, 0xFE, 0x00])?;
    assert_eq!(ev.kind(), Some(HciEventKind::CommandStatus));
    assert_eq!(ev.opcode(), Some(0xFE0F));

    let plain = HciEvent::parse(&[0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00])?;
    assert!(!plain.is_vendor());
    assert_eq!(plain.opcode(), Some(0x0C03));
    Ok(())
}

#[test]
fn malformed_messages_are_reported() {
    assert!(matches!(
        HciEvent::parse(&[0x02, 0xFF, 0x01, 0x00]),
        Err(Error::UnexpectedResponse { expected: 0x04, actual: 0x02 })
    ));
    assert!(matches!(
        HciEvent::parse(&[0x04, 0xFF, 0x09, 0x00, 0x06, 0x00, 0x00]),
        Err(Error::InvalidLength { expected: 12, actual: 7 })
    ));
}

#[test]
fn full_table_rejects_new_addresses() {
    let mut table = DeviceTable::new();
    for i in 0..DeviceTable::CAPACITY as u8 {
        let dev = BleDevice::from_device_info(&device_info([i; 6], "n")).unwrap().unwrap();
        table.insert(dev).unwrap();
    }
    let dev = BleDevice::from_device_info(&device_info([0xEE; 6], "n")).unwrap().unwrap();
    assert!(matches!(table.insert(dev), Err(Error::CapacityExceeded { capacity: 3 })));
}
