use super::*;
use crate::message::*;

use std::net::Ipv6Addr;

#[test]
fn test_mapped_address_roundtrip() {
    let mut m = Message::new();
    m.set_type(BINDING_SUCCESS);
    m.new_transaction_id();
    let addr = MappedAddress {
        ip: IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)),
        port: 5000,
    };
    addr.add_to(&mut m).unwrap();

    let mut got = MappedAddress::default();
    got.get_from(&m).unwrap();
    assert_eq!(got, addr);
}

#[test]
fn test_xor_mapped_address_v4() {
    let mut m = Message::new();
    m.set_type(BINDING_SUCCESS);
    m.new_transaction_id();
    let addr = XorMappedAddress {
        ip: IpAddr::V4(Ipv4Addr::new(203, 0, 113, 5)),
        port: 61000,
    };
    addr.add_to(&mut m).unwrap();

    // On the wire the bytes must differ from the plain address.
    let raw = m.get(crate::attributes::ATTR_XORMAPPED_ADDRESS).unwrap();
    assert_ne!(&raw[4..8], &[203, 0, 113, 5]);

    let mut got = XorMappedAddress::default();
    got.get_from(&m).unwrap();
    assert_eq!(got, addr);
}

#[test]
fn test_xor_mapped_address_v6_depends_on_transaction_id() {
    let mut m = Message::new();
    m.set_type(BINDING_SUCCESS);
    m.new_transaction_id();
    let addr = XorMappedAddress {
        ip: IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
        port: 443,
    };
    addr.add_to(&mut m).unwrap();

    let mut got = XorMappedAddress::default();
    got.get_from(&m).unwrap();
    assert_eq!(got, addr);

    // Decoding against a different transaction id yields a different address.
    let raw_value = m.get(crate::attributes::ATTR_XORMAPPED_ADDRESS).unwrap();
    let mut other = Message::new();
    other.set_type(BINDING_SUCCESS);
    other.new_transaction_id();
    other.add(crate::attributes::ATTR_XORMAPPED_ADDRESS, &raw_value);
    let mut mismatched = XorMappedAddress::default();
    mismatched.get_from(&other).unwrap();
    assert_ne!(mismatched.ip, addr.ip);
}
