use bytes::{Bytes, BytesMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use super::*;
use crate::header::*;

fn sample_packet() -> Packet {
    let mut header = Header {
        version: 2,
        marker: true,
        payload_type: 96,
        sequence_number: 27023,
        timestamp: 3653407706,
        ssrc: 476325762,
        csrc: vec![0x11111111, 0x22222222],
        ..Default::default()
    };
    header
        .set_extension(5, &[0xde, 0xad])
        .unwrap();
    Packet {
        header,
        payload: Bytes::from_static(&[0x98, 0x36, 0xbe, 0x88, 0x9e]),
        padding_size: 0,
    }
}

#[test]
fn test_packet_roundtrip() {
    let p = sample_packet();
    let raw = p.marshal().unwrap();
    assert_eq!(raw.len(), p.marshal_size());

    let mut buf = &raw[..];
    let decoded = Packet::unmarshal(&mut buf).unwrap();
    assert_eq!(decoded, p);
}

#[test]
fn test_packet_roundtrip_with_padding() {
    let mut p = sample_packet();
    p.header.padding = true;
    p.padding_size = 4;

    let raw = p.marshal().unwrap();
    // Last byte carries the padding count.
    assert_eq!(raw[raw.len() - 1], 4);

    let mut buf = &raw[..];
    let decoded = Packet::unmarshal(&mut buf).unwrap();
    assert_eq!(decoded, p);
    assert_eq!(decoded.payload, p.payload);
}

#[test]
fn test_header_extension_aad_length() {
    // The serialized header length includes extension words: required for
    // AEAD SRTP which authenticates the full header.
    let p = sample_packet();
    let without_ext = Header {
        extension: false,
        extension_profile: 0,
        extensions: vec![],
        ..p.header.clone()
    };
    assert_eq!(p.header.marshal_size(), without_ext.marshal_size() + 4 + 4);
}

#[test]
fn test_one_byte_extension_ids() {
    let mut header = Header {
        version: 2,
        ..Default::default()
    };
    header.set_extension(1, &[0xaa]).unwrap();
    header.set_extension(7, &[0xbb, 0xcc]).unwrap();
    assert_eq!(header.extension_profile, EXTENSION_PROFILE_ONE_BYTE);
    assert_eq!(header.get_extension_ids(), vec![1, 7]);
    assert_eq!(header.get_extension(7), Some(&[0xbb, 0xcc][..]));

    header.del_extension(1).unwrap();
    assert_eq!(header.get_extension(1), None);
    assert!(header.del_extension(1).is_err());
}

#[test]
fn test_two_byte_extension_fallback() {
    let mut header = Header {
        version: 2,
        ..Default::default()
    };
    // 20-byte payload cannot ride a one-byte extension.
    let large = [0x55u8; 20];
    header.set_extension(3, &large).unwrap();
    assert_eq!(header.extension_profile, EXTENSION_PROFILE_TWO_BYTE);

    let packet = Packet {
        header,
        payload: Bytes::from_static(&[1, 2, 3]),
        padding_size: 0,
    };
    let raw = packet.marshal().unwrap();
    let mut buf = &raw[..];
    let decoded = Packet::unmarshal(&mut buf).unwrap();
    assert_eq!(decoded.header.get_extension(3), Some(&large[..]));
}

#[test]
fn test_unmarshal_too_short() {
    let mut buf = &[0x80u8, 0x60, 0x00][..];
    assert!(Packet::unmarshal(&mut buf).is_err());
}

#[test]
fn test_marshal_buffer_too_short() {
    let p = sample_packet();
    let mut small = BytesMut::with_capacity(4);
    small.resize(4, 0);
    assert!(p.marshal_to(&mut small).is_err());
}
