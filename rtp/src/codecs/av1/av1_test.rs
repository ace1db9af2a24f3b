use super::*;
use crate::packetizer::{Depacketizer, Payloader};

#[test]
fn test_leb128_roundtrip() {
    for value in [0usize, 1, 127, 128, 255, 16383, 16384, 1 << 20, (1 << 32) - 1] {
        let encoded = leb128::encode(value);
        let (decoded, consumed) = leb128::decode(&encoded).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(consumed, encoded.len());
    }
}

#[test]
fn test_av1_depacketize_length_prefixed() {
    let mut pkt = Av1Packet::default();
    // W=0: every element is length prefixed. Two elements of 2 and 3 bytes.
    let raw = Bytes::from_static(&[0x00, 0x02, 0xAA, 0xBB, 0x03, 0xCC, 0xDD, 0xEE]);
    let payload = pkt.depacketize(&raw).unwrap();
    assert_eq!(pkt.obu_elements.len(), 2);
    assert_eq!(pkt.obu_elements[0], Bytes::from_static(&[0xAA, 0xBB]));
    assert_eq!(pkt.obu_elements[1], Bytes::from_static(&[0xCC, 0xDD, 0xEE]));
    assert_eq!(payload, Bytes::from_static(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE]));
}

#[test]
fn test_av1_depacketize_w_counted() {
    let mut pkt = Av1Packet::default();
    // W=2: first element prefixed, last element runs to the end.
    let raw = Bytes::from_static(&[0x20, 0x01, 0xAA, 0xBB, 0xCC]);
    pkt.depacketize(&raw).unwrap();
    assert_eq!(pkt.w, 2);
    assert_eq!(pkt.obu_elements[0], Bytes::from_static(&[0xAA]));
    assert_eq!(pkt.obu_elements[1], Bytes::from_static(&[0xBB, 0xCC]));
}

#[test]
fn test_av1_depacketize_corrupt_length() {
    let mut pkt = Av1Packet::default();
    let raw = Bytes::from_static(&[0x00, 0x09, 0xAA]);
    assert_eq!(pkt.depacketize(&raw), Err(Error::ErrAv1CorruptedObu));
}

#[test]
fn test_av1_keyframe_detection() {
    // N bit set.
    assert!(is_keyframe(&[0x08, 0x01, 0xAA]));
    // Sequence header OBU (type 1 << 3 = 0x08 in the OBU header).
    assert!(is_keyframe(&[0x00, 0x01, 0x08]));
    // Frame OBU without N.
    assert!(!is_keyframe(&[0x00, 0x01, 0x30]));
}

#[test]
fn test_av1_payloader_fragments_and_z_y_flags() {
    let mut payloader = Av1Payloader::default();
    let payload = Bytes::from(vec![0x11u8; 40]);
    let payloads = payloader.payload(20, &payload).unwrap();
    assert!(payloads.len() >= 2);
    for (i, p) in payloads.iter().enumerate() {
        let z = p[0] & AV1_Z_MASK != 0;
        let y = p[0] & AV1_Y_MASK != 0;
        assert_eq!(z, i != 0, "Z set on continuation packets");
        assert_eq!(y, i != payloads.len() - 1, "Y set when continuing");
    }
}
