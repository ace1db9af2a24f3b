use bytes::BytesMut;

use super::*;

fn roundtrip(p: Param) {
    let mut buf = BytesMut::new();
    p.marshal_to(&mut buf);
    for _ in 0..get_padding_size(buf.len()) {
        buf.extend_from_slice(&[0]);
    }
    let raw = buf.freeze();
    let (decoded, consumed) = Param::unmarshal(&raw).unwrap();
    assert_eq!(consumed, raw.len());
    assert_eq!(decoded, p);
}

#[test]
fn test_param_roundtrips() {
    roundtrip(Param::HeartbeatInfo(Bytes::from_static(&[1, 2, 3, 4])));
    roundtrip(Param::StateCookie(Bytes::from_static(&[9; 32])));
    roundtrip(Param::ForwardTsnSupported);
    roundtrip(Param::OutgoingResetRequest(ParamOutgoingResetRequest {
        reconfig_request_sequence_number: 1,
        reconfig_response_sequence_number: 2,
        sender_last_tsn: 3,
        stream_identifiers: vec![7, 9],
    }));
    roundtrip(Param::ReconfigResponse(ParamReconfigResponse {
        reconfig_response_sequence_number: 1,
        result: RECONFIG_RESULT_SUCCESS_PERFORMED,
    }));
}

#[test]
fn test_param_header_length_validation() {
    // Self-reported length larger than the buffer.
    let raw = Bytes::from_static(&[0x00, 0x07, 0x00, 0x20, 0xAA]);
    assert_eq!(
        Param::unmarshal(&raw),
        Err(Error::ErrParamHeaderSelfReportedLengthLonger)
    );
    // Shorter than the TLV header itself.
    let raw = Bytes::from_static(&[0x00, 0x07, 0x00, 0x02]);
    assert_eq!(
        Param::unmarshal(&raw),
        Err(Error::ErrParamHeaderSelfReportedLengthShorter)
    );
}
