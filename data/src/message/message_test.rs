use bytes::BytesMut;

use super::message_channel_open::*;
use super::*;

#[test]
fn test_channel_open_roundtrip() {
    let open = DataChannelOpen {
        channel_type: ChannelType::PartialReliableRexmitUnordered,
        priority: CHANNEL_PRIORITY_NORMAL,
        reliability_parameter: 5,
        label: b"chat".to_vec(),
        protocol: b"proto".to_vec(),
    };
    let msg = Message::DataChannelOpen(open.clone());
    let mut buf = BytesMut::with_capacity(msg.marshal_size());
    msg.marshal(&mut buf);
    assert_eq!(buf.len(), msg.marshal_size());
    assert_eq!(buf[0], MESSAGE_TYPE_OPEN);

    let mut raw = &buf[..];
    let decoded = Message::unmarshal(&mut raw).unwrap();
    assert_eq!(decoded, msg);
}

#[test]
fn test_ack_roundtrip() {
    let msg = Message::DataChannelAck(DataChannelAck {});
    let mut buf = BytesMut::new();
    msg.marshal(&mut buf);
    assert_eq!(&buf[..], &[MESSAGE_TYPE_ACK]);

    let mut raw = &buf[..];
    assert_eq!(Message::unmarshal(&mut raw).unwrap(), msg);
}

#[test]
fn test_unknown_message_type() {
    let mut raw = &[0x07u8][..];
    assert_eq!(
        Message::unmarshal(&mut raw),
        Err(crate::error::Error::InvalidMessageType(0x07))
    );
}

#[test]
fn test_channel_type_unordered_bit() {
    assert!(ChannelType::ReliableUnordered.unordered());
    assert!(ChannelType::PartialReliableTimedUnordered.unordered());
    assert!(!ChannelType::Reliable.unordered());
    assert!(!ChannelType::PartialReliableRexmit.unordered());
}

#[test]
fn test_open_truncated() {
    let mut raw = &[MESSAGE_TYPE_OPEN, 0x00, 0x01][..];
    assert_eq!(
        Message::unmarshal(&mut raw),
        Err(crate::error::Error::UnexpectedEndOfBuffer)
    );
}
