use crate::addr::XorMappedAddress;
use crate::attributes::*;
use crate::error_code::*;
use crate::fingerprint::FINGERPRINT;
use crate::integrity::MessageIntegrity;
use crate::message::*;
use crate::textattrs::TextAttribute;

use std::net::{IpAddr, Ipv4Addr};

#[test]
fn test_message_type_value() {
    let tests = vec![
        (
            MessageType::new(METHOD_BINDING, CLASS_REQUEST),
            0x0001u16,
        ),
        (
            MessageType::new(METHOD_BINDING, CLASS_SUCCESS_RESPONSE),
            0x0101,
        ),
        (MessageType::new(METHOD_BINDING, CLASS_ERROR_RESPONSE), 0x0111),
        (MessageType::new(METHOD_ALLOCATE, CLASS_REQUEST), 0x0003),
        (
            MessageType::new(METHOD_CREATE_PERMISSION, CLASS_REQUEST),
            0x0008,
        ),
        (MessageType::new(METHOD_SEND, CLASS_INDICATION), 0x0016),
        (MessageType::new(METHOD_DATA, CLASS_INDICATION), 0x0017),
    ];
    for (tt, expected) in tests {
        assert_eq!(tt.value(), expected, "{tt}");

        let mut decoded = MessageType::default();
        decoded.read_value(expected);
        assert_eq!(decoded, tt);
    }
}

#[test]
fn test_message_roundtrip() {
    let mut m = Message::new();
    m.set_type(BINDING_REQUEST);
    m.new_transaction_id();
    m.add(ATTR_SOFTWARE, b"rtcx test");
    XorMappedAddress {
        ip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
        port: 42187,
    }
    .add_to(&mut m)
    .unwrap();

    let mut decoded = Message::new();
    decoded.write(&m.raw).unwrap();
    assert_eq!(decoded, m);

    let mut got = XorMappedAddress::default();
    got.get_from(&decoded).unwrap();
    assert_eq!(got.ip, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
    assert_eq!(got.port, 42187);
}

#[test]
fn test_message_decode_rejects_bad_cookie() {
    let mut m = Message::new();
    m.set_type(BINDING_REQUEST);
    m.new_transaction_id();
    let mut raw = m.raw.clone();
    raw[4] = 0x99;

    let mut decoded = Message::new();
    assert!(decoded.write(&raw).is_err());
}

#[test]
fn test_message_attribute_padding() {
    let mut m = Message::new();
    m.set_type(BINDING_REQUEST);
    m.new_transaction_id();
    // 5-byte value must be padded to 8 on the wire.
    m.add(ATTR_SOFTWARE, b"hello");
    assert_eq!(m.length as usize, 4 + 8);

    let mut decoded = Message::new();
    decoded.write(&m.raw).unwrap();
    assert_eq!(decoded.get(ATTR_SOFTWARE).unwrap(), b"hello".to_vec());
}

#[test]
fn test_is_message() {
    let mut m = Message::new();
    m.set_type(BINDING_REQUEST);
    m.new_transaction_id();
    assert!(is_message(&m.raw));
    assert!(!is_message(&[0u8; 8]));
    // DTLS content types land outside the STUN method space.
    let mut not_stun = m.raw.clone();
    not_stun[4] = 0;
    assert!(!is_message(&not_stun));
}

#[test]
fn test_full_message_integrity_and_fingerprint() {
    let integrity = MessageIntegrity::new_short_term_integrity("pwd123".to_owned());

    let mut m = Message::new();
    m.set_type(BINDING_REQUEST);
    m.new_transaction_id();
    TextAttribute::new(ATTR_USERNAME, "remote:local".to_owned())
        .add_to(&mut m)
        .unwrap();
    integrity.add_to(&mut m).unwrap();
    FINGERPRINT.add_to(&mut m).unwrap();

    let mut decoded = Message::new();
    decoded.write(&m.raw).unwrap();

    FINGERPRINT.check(&decoded).unwrap();
    integrity.check(&mut decoded).unwrap();

    // Wrong key must fail.
    let bad = MessageIntegrity::new_short_term_integrity("wrong".to_owned());
    assert!(bad.check(&mut decoded).is_err());
}

#[test]
fn test_error_code_roundtrip() {
    let mut m = Message::new();
    m.set_type(BINDING_ERROR);
    m.new_transaction_id();
    CODE_ROLE_CONFLICT.add_to(&mut m).unwrap();

    let mut decoded = Message::new();
    decoded.write(&m.raw).unwrap();
    let mut code = ErrorCodeAttribute::default();
    code.get_from(&decoded).unwrap();
    assert_eq!(code.code, CODE_ROLE_CONFLICT);
    assert_eq!(code.reason, b"Role Conflict".to_vec());
}
