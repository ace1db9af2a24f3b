use super::*;
use crate::packetizer::{Depacketizer, Payloader};

#[test]
fn test_h264_single_nalu_depacketize() {
    let mut pkt = H264Packet::default();
    let raw = Bytes::from_static(&[0x65, 0x01, 0x02]);
    let out = pkt.depacketize(&raw).unwrap();
    assert_eq!(&out[..4], &[0x00, 0x00, 0x00, 0x01]);
    assert_eq!(&out[4..], &[0x65, 0x01, 0x02]);
    assert!(is_keyframe(&raw));
}

#[test]
fn test_h264_stapa_depacketize() {
    // STAP-A with two NALUs: [len=2][0x67 0x00] [len=1][0x68]
    let mut pkt = H264Packet::default();
    let raw = Bytes::from_static(&[0x78, 0x00, 0x02, 0x67, 0x00, 0x00, 0x01, 0x68]);
    let out = pkt.depacketize(&raw).unwrap();
    let expected: &[u8] = &[
        0x00, 0x00, 0x00, 0x01, 0x67, 0x00, 0x00, 0x00, 0x00, 0x01, 0x68,
    ];
    assert_eq!(&out[..], expected);
}

#[test]
fn test_h264_fua_reassembly() {
    let mut pkt = H264Packet::default();
    // Start fragment of an IDR (type 5), NRI 0x60.
    let start = Bytes::from_static(&[0x7C, 0x85, 0xAA, 0xBB]);
    assert_eq!(pkt.depacketize(&start).unwrap(), Bytes::new());
    // End fragment.
    let end = Bytes::from_static(&[0x7C, 0x45, 0xCC]);
    let out = pkt.depacketize(&end).unwrap();
    let expected: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x65, 0xAA, 0xBB, 0xCC];
    assert_eq!(&out[..], expected);

    assert!(is_keyframe(&start));
    assert!(!is_keyframe(&end));
}

#[test]
fn test_h264_payloader_annexb_split() {
    let mut payloader = H264Payloader::default();
    // Two NALUs behind 4- and 3-byte start codes.
    let stream = Bytes::from_static(&[
        0x00, 0x00, 0x00, 0x01, 0x41, 0x01, 0x02, 0x00, 0x00, 0x01, 0x41, 0x03,
    ]);
    let payloads = payloader.payload(1200, &stream).unwrap();
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0], Bytes::from_static(&[0x41, 0x01, 0x02]));
    assert_eq!(payloads[1], Bytes::from_static(&[0x41, 0x03]));
}

#[test]
fn test_h264_payloader_fua_fragmentation() {
    let mut payloader = H264Payloader::default();
    let mut stream = vec![0x00, 0x00, 0x01, 0x65];
    stream.extend(vec![0xABu8; 30]);
    let payloads = payloader.payload(14, &Bytes::from(stream)).unwrap();
    assert!(payloads.len() > 1);
    // All fragments carry the FU-A type, only first has S, only last E.
    for (i, p) in payloads.iter().enumerate() {
        assert_eq!(p[0] & NALU_TYPE_BITMASK, FUA_NALU_TYPE);
        assert_eq!(p[1] & FU_START_BITMASK != 0, i == 0);
        assert_eq!(p[1] & FU_END_BITMASK != 0, i == payloads.len() - 1);
        assert_eq!(p[1] & NALU_TYPE_BITMASK, 0x05);
    }
}

#[test]
fn test_h264_partition_head() {
    let pkt = H264Packet::default();
    assert!(pkt.is_partition_head(&Bytes::from_static(&[0x65, 0x00])));
    assert!(pkt.is_partition_head(&Bytes::from_static(&[0x7C, 0x85])));
    assert!(!pkt.is_partition_head(&Bytes::from_static(&[0x7C, 0x05])));
}
