use super::*;
use crate::packetizer::{Depacketizer, Payloader};

#[test]
fn test_opus_passthrough() {
    let mut pkt = OpusPacket::default();
    let raw = Bytes::from_static(&[0x78, 0x01, 0x02, 0x03, 0x04]);
    assert_eq!(pkt.depacketize(&raw).unwrap(), raw);
    assert_eq!(pkt.toc(), Some(0x78));
    assert_eq!(pkt.config(), Some(0x0F));
    assert_eq!(pkt.is_stereo(), Some(false));
}

#[test]
fn test_opus_empty_errors() {
    let mut pkt = OpusPacket::default();
    assert_eq!(
        pkt.depacketize(&Bytes::new()),
        Err(Error::ErrOpusPayloadEmpty)
    );
}

#[test]
fn test_opus_dtx_detection() {
    assert!(is_dtx(&[0x78]));
    assert!(is_dtx(&[0x78, 0x00, 0x00]));
    assert!(!is_dtx(&[0x78, 0x00, 0x00, 0x00]));
    assert!(!is_dtx(&[]));
}

#[test]
fn test_opus_payloader_single() {
    let mut p = OpusPayloader;
    let raw = Bytes::from_static(&[0x01, 0x02]);
    assert_eq!(p.payload(1200, &raw).unwrap(), vec![raw.clone()]);
    assert!(p.payload(1200, &Bytes::new()).unwrap().is_empty());
}
