#[cfg(test)]
mod rtx_test {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn test_rtx_roundtrip() {
        let payload = Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]);
        let wrapped = wrap_payload(1234, &payload);
        let (osn, unwrapped) = unwrap_payload(&wrapped).unwrap();
        assert_eq!(osn, 1234);
        assert_eq!(unwrapped, payload);
    }

    #[test]
    fn test_rtx_too_small() {
        assert!(unwrap_payload(&Bytes::from_static(&[0x01])).is_err());
    }
}

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

// RFC 4588: a retransmission payload is the original payload prefixed
// with the 16-bit original sequence number (OSN).
pub fn wrap_payload(original_sequence_number: u16, payload: &Bytes) -> Bytes {
    let mut out = BytesMut::with_capacity(2 + payload.len());
    out.put_u16(original_sequence_number);
    out.put_slice(payload);
    out.freeze()
}

pub fn unwrap_payload(payload: &Bytes) -> Result<(u16, Bytes)> {
    if payload.len() < 2 {
        return Err(Error::ErrRtxPayloadTooSmall);
    }
    let osn = u16::from_be_bytes([payload[0], payload[1]]);
    Ok((osn, payload.slice(2..)))
}
