use std::net::{IpAddr, Ipv4Addr};

use stun::message::*;

use super::*;

#[test]
fn test_channel_data_roundtrip() {
    let cd = ChannelData {
        number: ChannelNumber(0x4000),
        data: vec![1, 2, 3, 4, 5],
    };
    let raw = cd.marshal();
    assert!(is_channel_data(&raw));
    assert_eq!(ChannelData::unmarshal(&raw).unwrap(), cd);
}

#[test]
fn test_channel_data_rejects_bad_number() {
    // 0x3FFF is below the channel range and also not ChannelData framing.
    let mut raw = ChannelData {
        number: ChannelNumber(0x4000),
        data: vec![],
    }
    .marshal();
    raw[0] = 0x3F;
    raw[1] = 0xFF;
    assert_eq!(
        ChannelData::unmarshal(&raw),
        Err(crate::error::Error::ErrInvalidChannelNumber)
    );
}

#[test]
fn test_channel_number_range() {
    assert!(!ChannelNumber(0x3FFF).valid());
    assert!(ChannelNumber(MIN_CHANNEL_NUMBER).valid());
    assert!(ChannelNumber(MAX_CHANNEL_NUMBER).valid());
    assert!(!ChannelNumber(0x7FFF).valid());
}

#[test]
fn test_is_channel_data_demux() {
    assert!(is_channel_data(&[0x40, 0x00, 0x00, 0x00]));
    assert!(is_channel_data(&[0x7F, 0xFE, 0x00, 0x00]));
    assert!(!is_channel_data(&[0x00, 0x01])); // STUN binding request
    assert!(!is_channel_data(&[0x80, 0x00])); // RTP
}

#[test]
fn test_requested_transport_attr() {
    let mut m = Message::new();
    m.set_type(MessageType::new(METHOD_ALLOCATE, CLASS_REQUEST));
    m.new_transaction_id();
    RequestedTransport(PROTO_UDP).add_to(&mut m).unwrap();

    let mut decoded = Message::new();
    decoded.write(&m.raw).unwrap();
    let mut rt = RequestedTransport(0);
    rt.get_from(&decoded).unwrap();
    assert_eq!(rt.0, PROTO_UDP);
}

#[test]
fn test_peer_and_relayed_address_attrs() {
    let mut m = Message::new();
    m.set_type(MessageType::new(METHOD_SEND, CLASS_INDICATION));
    m.new_transaction_id();
    let peer = XorPeerAddress(stun::addr::XorMappedAddress {
        ip: IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9)),
        port: 4444,
    });
    peer.add_to(&mut m).unwrap();
    Data(vec![0xAA, 0xBB]).add_to(&mut m).unwrap();

    let mut decoded = Message::new();
    decoded.write(&m.raw).unwrap();
    let mut got_peer = XorPeerAddress::default();
    got_peer.get_from(&decoded).unwrap();
    assert_eq!(got_peer, peer);
    let mut got_data = Data::default();
    got_data.get_from(&decoded).unwrap();
    assert_eq!(got_data.0, vec![0xAA, 0xBB]);
}
