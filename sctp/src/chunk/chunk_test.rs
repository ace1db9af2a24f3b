use bytes::BytesMut;

use super::*;
use crate::param::{Param, ParamOutgoingResetRequest};

fn roundtrip(chunk: Chunk) {
    let mut buf = BytesMut::new();
    chunk.marshal_to(&mut buf);
    let raw = buf.freeze();
    let (decoded, consumed) = Chunk::unmarshal(&raw).unwrap();
    assert_eq!(consumed, raw.len());
    assert_eq!(decoded, chunk);
}

#[test]
fn test_payload_data_roundtrip() {
    roundtrip(Chunk::PayloadData(ChunkPayloadData {
        unordered: true,
        beginning_fragment: true,
        ending_fragment: false,
        tsn: 0xFFFFFFFE,
        stream_identifier: 42,
        stream_sequence_number: 17,
        payload_type: PayloadProtocolIdentifier::Dcep,
        user_data: Bytes::from_static(&[1, 2, 3, 4, 5]),
        ..Default::default()
    }));
}

#[test]
fn test_init_roundtrip_with_params() {
    roundtrip(Chunk::Init(ChunkInit {
        is_ack: false,
        initiate_tag: 0xDEADBEEF,
        advertised_receiver_window_credit: 1024 * 1024,
        num_outbound_streams: 1024,
        num_inbound_streams: 2048,
        initial_tsn: 12345,
        params: vec![Param::ForwardTsnSupported],
    }));
}

#[test]
fn test_init_ack_roundtrip_with_cookie() {
    roundtrip(Chunk::Init(ChunkInit {
        is_ack: true,
        initiate_tag: 1,
        advertised_receiver_window_credit: 64 * 1024,
        num_outbound_streams: 10,
        num_inbound_streams: 10,
        initial_tsn: 5,
        params: vec![
            Param::StateCookie(Bytes::from_static(&[0xAB; 36])),
            Param::ForwardTsnSupported,
        ],
    }));
}

#[test]
fn test_sack_roundtrip() {
    roundtrip(Chunk::Sack(ChunkSelectiveAck {
        cumulative_tsn_ack: 1000,
        advertised_receiver_window_credit: 128 * 1024,
        gap_ack_blocks: vec![
            GapAckBlock { start: 2, end: 5 },
            GapAckBlock { start: 9, end: 9 },
        ],
        duplicate_tsn: vec![999, 1000],
    }));
}

#[test]
fn test_control_chunks_roundtrip() {
    roundtrip(Chunk::Heartbeat(ChunkHeartbeat {
        heartbeat_info: Bytes::from_static(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]),
    }));
    roundtrip(Chunk::Shutdown(ChunkShutdown {
        cumulative_tsn_ack: 77,
    }));
    roundtrip(Chunk::ShutdownAck(ChunkShutdownAck {}));
    roundtrip(Chunk::ShutdownComplete(ChunkShutdownComplete {
        verification_tag_reflected: false,
    }));
    roundtrip(Chunk::CookieEcho(ChunkCookieEcho {
        cookie: Bytes::from_static(&[0x42; 24]),
    }));
    roundtrip(Chunk::CookieAck(ChunkCookieAck {}));
    roundtrip(Chunk::Abort(ChunkAbort {
        error_causes: vec![ErrorCause {
            code: ERROR_CAUSE_USER_INITIATED_ABORT,
            raw: Bytes::from_static(b"done"),
        }],
    }));
}

#[test]
fn test_forward_tsn_roundtrip() {
    roundtrip(Chunk::ForwardTsn(ChunkForwardTsn {
        new_cumulative_tsn: 3333,
        streams: vec![ChunkForwardTsnStream {
            identifier: 1,
            sequence: 4,
        }],
    }));
}

#[test]
fn test_reconfig_roundtrip() {
    roundtrip(Chunk::Reconfig(ChunkReconfig {
        param_a: Some(Param::OutgoingResetRequest(ParamOutgoingResetRequest {
            reconfig_request_sequence_number: 10,
            reconfig_response_sequence_number: 20,
            sender_last_tsn: 30,
            stream_identifiers: vec![1],
        })),
        param_b: None,
    }));
}

#[test]
fn test_chunk_header_validation() {
    // Length field smaller than the header.
    let raw = Bytes::from_static(&[0x00, 0x00, 0x00, 0x02]);
    assert!(Chunk::unmarshal(&raw).is_err());
    // Length field larger than the buffer.
    let raw = Bytes::from_static(&[0x00, 0x00, 0x00, 0x20, 0x00]);
    assert!(Chunk::unmarshal(&raw).is_err());
}
