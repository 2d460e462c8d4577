#[path = "../common/mod.rs"]
mod common;

use trfnfc::ndef::record::rtd;
use trfnfc::ndef::{decode_message, encode_message, Action, NdefRecord, SmartPoster, Tnf};

#[test]
fn poster_survives_message_round_trip() -> anyhow::Result<()> {
    let poster = SmartPoster::new("https://www.example.com/menu")
        .with_title("en", "Lunch menu")
        .with_action(Action::SaveForLater);
    let bytes = encode_message(&[poster.to_record()?])?;

    let records = decode_message(&bytes)?;
    assert!(records[0].is_type(Tnf::WellKnown, rtd::SMART_POSTER));
    let back = SmartPoster::try_from(&records[0])?;
    assert_eq!(back, poster);
    assert_eq!(back.uri.code, 0x02);
    assert_eq!(back.uri.uri(), "https://www.example.com/menu");
    Ok(())
}

#[test]
fn extra_inner_records_are_skipped() -> anyhow::Result<()> {
    let mut inner = vec![
        NdefRecord::well_known(rtd::SIZE, vec![0, 0, 0x10, 0]),
        trfnfc::ndef::UriRecord::from_uri("http://a.example").to_record(),
    ];
    let mut icon = NdefRecord::well_known(b"image/png", vec![0x89, 0x50]);
    icon.tnf = Tnf::Media;
    inner.push(icon);
    let outer = NdefRecord::well_known(rtd::SMART_POSTER, encode_message(&inner)?);

    let poster = SmartPoster::try_from(&outer)?;
    assert_eq!(poster.uri.uri(), "http://a.example");
    assert_eq!(poster.title, None);
    assert_eq!(poster.action, None);
    Ok(())
}

#[test]
fn poster_without_uri_or_wrong_type_fails() -> anyhow::Result<()> {
    let title_only = NdefRecord::well_known(
        rtd::SMART_POSTER,
        encode_message(&[trfnfc::ndef::TextRecord::new("en", "x").to_record()?])?,
    );
    assert!(SmartPoster::try_from(&title_only).is_err());
    assert!(SmartPoster::try_from(&NdefRecord::well_known(rtd::URI, vec![0x00])).is_err());
    Ok(())
}
