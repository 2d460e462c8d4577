#[path = "../common/mod.rs"]
mod common;

use trfnfc::ndef::record::rtd;
use trfnfc::ndef::{decode_message, encode_message, NdefRecord, TextRecord, Tnf, UriRecord};
use trfnfc::Error;

#[test]
fn known_uri_message_decodes() -> anyhow::Result<()> {
    let records = decode_message(&common::fixtures::uri_message())?;
    assert_eq!(records.len(), 1);
    let uri = UriRecord::try_from(&records[0])?;
    assert_eq!(uri.uri(), "https://nfc.example");
    assert_eq!(uri.to_record().to_bytes()?, common::fixtures::uri_message());
    Ok(())
}

#[test]
fn mixed_message_keeps_record_order() -> anyhow::Result<()> {
    let text = TextRecord::new("en", "kiosk 7").to_record()?;
    let uri = UriRecord::from_uri("tel:+15550100").to_record();
    let mut media = NdefRecord::well_known(b"text/plain", b"hi".to_vec());
    media.tnf = Tnf::Media;
    media.id = b"m1".to_vec();

    let bytes = encode_message(&[text, uri, media])?;
    // MB on the first record, ME on the last, IL where an id is present
    assert_eq!(bytes[0] & 0xC0, 0x80);
    let decoded = decode_message(&bytes)?;
    assert_eq!(decoded.len(), 3);
    assert!(decoded[0].message_begin && !decoded[0].message_end);
    assert!(decoded[1].is_type(Tnf::WellKnown, rtd::URI));
    assert!(decoded[2].message_end);
    assert_eq!(decoded[2].id, b"m1".to_vec());
    assert_eq!(TextRecord::try_from(&decoded[0])?.text, "kiosk 7");
    assert_eq!(UriRecord::try_from(&decoded[1])?.uri(), "tel:+15550100");
    Ok(())
}

#[test]
fn long_payload_uses_four_byte_length() -> anyhow::Result<()> {
    let record = NdefRecord::well_known(rtd::TEXT, vec![0x02; 300]);
    let bytes = record.to_bytes()?;
    assert_eq!(bytes[0] & 0x10, 0);
    assert_eq!(&bytes[2..6], &[0x00, 0x00, 0x01, 0x2C]);
    assert_eq!(bytes.len(), record.encoded_len());
    let (back, used) = NdefRecord::decode(&bytes)?;
    assert_eq!(used, bytes.len());
    assert_eq!(back.payload.len(), 300);
    Ok(())
}

#[test]
fn records_after_message_end_are_not_read() -> anyhow::Result<()> {
    let mut bytes = common::fixtures::uri_message();
    bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
    assert_eq!(decode_message(&bytes)?.len(), 1);
    Ok(())
}

#[test]
fn truncated_message_is_rejected() {
    let bytes = common::fixtures::uri_message();
    assert!(matches!(
        decode_message(&bytes[..3]),
        Err(Error::InvalidLength { .. })
    ));
    assert!(decode_message(&bytes[..bytes.len() - 1]).is_err());
}

#[test]
fn small_buffer_is_left_untouched() {
    let record = UriRecord::from_uri("https://nfc.example").to_record();
    let mut buf = [0xEE; 8];
    assert!(matches!(
        record.encode_into(&mut buf),
        Err(Error::CapacityExceeded { capacity: 8 })
    ));
    assert_eq!(buf, [0xEE; 8]);
}
