use bytes::Bytes;
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use super::*;

#[test]
fn test_header_basic_roundtrip() {
    let header = Header {
        version: 2,
        payload_type: 111,
        sequence_number: 65535,
        timestamp: 0xFFFFFFFF,
        ssrc: 0x12345678,
        ..Default::default()
    };
    let raw = header.marshal().unwrap();
    assert_eq!(raw.len(), 12);
    let mut buf = &raw[..];
    assert_eq!(Header::unmarshal(&mut buf).unwrap(), header);
}

#[test]
fn test_header_one_byte_extension_parse() {
    // Hand-built packet header with a one-byte extension, id 5, len 2.
    let raw = Bytes::from_static(&[
        0x90, 0x60, 0x69, 0x8f, // v=2, ext, pt=96
        0xd9, 0xc2, 0x93, 0xda, // timestamp
        0x1c, 0x64, 0x27, 0x82, // ssrc
        0xbe, 0xde, 0x00, 0x01, // one-byte profile, 1 word
        0x50, 0xaa, 0xbb, 0x00, // id=5 len=2, payload, padding
    ]);
    let mut buf = &raw[..];
    let header = Header::unmarshal(&mut buf).unwrap();
    assert!(header.extension);
    assert_eq!(header.extension_profile, EXTENSION_PROFILE_ONE_BYTE);
    assert_eq!(header.get_extension(5), Some(&[0xaa, 0xbb][..]));
}

#[test]
fn test_header_csrc_parse() {
    let mut header = Header {
        version: 2,
        payload_type: 96,
        ..Default::default()
    };
    header.csrc = vec![1, 2, 3];
    let raw = header.marshal().unwrap();
    assert_eq!(raw.len(), 12 + 12);
    let mut buf = &raw[..];
    let parsed = Header::unmarshal(&mut buf).unwrap();
    assert_eq!(parsed.csrc, vec![1, 2, 3]);
}

#[test]
fn test_header_extension_truncated() {
    let raw = Bytes::from_static(&[
        0x90, 0x60, 0x69, 0x8f, 0xd9, 0xc2, 0x93, 0xda, 0x1c, 0x64, 0x27, 0x82, 0xbe, 0xde,
        0x00, 0x03, 0x50, 0xaa,
    ]);
    let mut buf = &raw[..];
    assert!(Header::unmarshal(&mut buf).is_err());
}
