use super::*;
use crate::packetizer::Depacketizer;

#[test]
fn test_vp9_depacketize_simple() {
    let mut p = Vp9Packet::default();
    // B=1,E=1, no optional fields.
    let raw = Bytes::from_static(&[0x0C, 0xDE, 0xAD]);
    let payload = p.depacketize(&raw).unwrap();
    assert!(p.b && p.e);
    assert!(!p.i && !p.p && !p.l && !p.f && !p.v);
    assert_eq!(payload, Bytes::from_static(&[0xDE, 0xAD]));
}

#[test]
fn test_vp9_depacketize_picture_id() {
    let mut p = Vp9Packet::default();
    // I=1, 15-bit picture id 0x0203.
    let raw = Bytes::from_static(&[0x88, 0x82, 0x03, 0xAA]);
    p.depacketize(&raw).unwrap();
    assert!(p.i);
    assert_eq!(p.picture_id, 0x0203);
}

#[test]
fn test_vp9_depacketize_layer_info_non_flexible() {
    let mut p = Vp9Packet::default();
    // L=1, F=0: one layer byte plus TL0PICIDX.
    let raw = Bytes::from_static(&[0x28, 0b010_1_001_1, 0x42, 0xAA]);
    p.depacketize(&raw).unwrap();
    assert_eq!(p.tid, 2);
    assert!(p.u);
    assert_eq!(p.sid, 1);
    assert!(p.d);
    assert_eq!(p.tl0picidx, 0x42);
}

#[test]
fn test_vp9_depacketize_short() {
    let mut p = Vp9Packet::default();
    assert!(p.depacketize(&Bytes::new()).is_err());
    // I flag set but no picture id byte.
    assert!(p.depacketize(&Bytes::from_static(&[0x80])).is_err());
}

#[test]
fn test_vp9_keyframe_flag() {
    // P=0 with B=1 is a keyframe start.
    assert!(is_keyframe(&[0x08, 0x00]));
    // P=1 is a predicted frame.
    assert!(!is_keyframe(&[0x48, 0x00]));
}
