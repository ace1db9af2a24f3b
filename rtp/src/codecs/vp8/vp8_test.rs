use super::*;
use crate::packetizer::{Depacketizer, Payloader};

#[test]
fn test_vp8_depacketize_bare_descriptor() {
    let mut packet = Vp8Packet::default();
    // S=1, PID=0, then frame bytes. First frame byte LSB 0 => keyframe.
    let raw = Bytes::from_static(&[0x10, 0x00, 0x01, 0x02, 0x03]);
    let payload = packet.depacketize(&raw).unwrap();
    assert_eq!(packet.s, 1);
    assert_eq!(packet.x, 0);
    assert_eq!(payload, Bytes::from_static(&[0x00, 0x01, 0x02, 0x03]));
    assert!(is_keyframe(&payload));
}

#[test]
fn test_vp8_depacketize_extended_picture_id() {
    let mut packet = Vp8Packet::default();
    // X=1, S=1; I=1 with M=1 15-bit picture id 0x1234.
    let raw = Bytes::from_static(&[0x90, 0x80, 0x92, 0x34, 0xAB, 0xCD]);
    let payload = packet.depacketize(&raw).unwrap();
    assert_eq!(packet.i, 1);
    assert_eq!(packet.picture_id, 0x1234);
    assert_eq!(payload, Bytes::from_static(&[0xAB, 0xCD]));
    assert!(!is_keyframe(&payload), "P bit set means interframe");
}

#[test]
fn test_vp8_depacketize_too_small() {
    let mut packet = Vp8Packet::default();
    assert_eq!(
        packet.depacketize(&Bytes::from_static(&[0x10, 0x00])),
        Err(Error::ErrVp8PayloadTooSmall)
    );
}

#[test]
fn test_vp8_payloader_fragments() {
    let mut payloader = Vp8Payloader::default();
    let frame = Bytes::from(vec![0x05u8; 50]);
    let payloads = payloader.payload(21, &frame).unwrap();
    assert_eq!(payloads.len(), 3);
    // Only the first fragment carries the S bit.
    assert_eq!(payloads[0][0] & 0x10, 0x10);
    assert_eq!(payloads[1][0] & 0x10, 0x00);
    assert_eq!(payloads[2][0] & 0x10, 0x00);
    let total: usize = payloads.iter().map(|p| p.len() - 1).sum();
    assert_eq!(total, 50);
}

#[test]
fn test_vp8_partition_head() {
    let packet = Vp8Packet::default();
    assert!(packet.is_partition_head(&Bytes::from_static(&[0x10, 0x00])));
    assert!(!packet.is_partition_head(&Bytes::from_static(&[0x00, 0x00])));
}
