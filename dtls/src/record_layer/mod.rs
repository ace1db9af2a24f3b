#[cfg(test)]
mod record_layer_test {
    use super::*;

    #[test]
    fn test_record_header_roundtrip() {
        let header = RecordLayerHeader {
            content_type: ContentType::Handshake,
            protocol_version: PROTOCOL_VERSION1_2,
            epoch: 1,
            sequence_number: 0x0000AABBCCDD,
            content_len: 42,
        };
        let raw = header.marshal();
        assert_eq!(raw.len(), RECORD_LAYER_HEADER_SIZE);
        let parsed = RecordLayerHeader::unmarshal(&raw).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_record_header_rejects_short() {
        assert!(RecordLayerHeader::unmarshal(&[0u8; 12]).is_err());
    }

    #[test]
    fn test_sequence_number_is_48_bit() {
        let header = RecordLayerHeader {
            content_type: ContentType::ApplicationData,
            protocol_version: PROTOCOL_VERSION1_2,
            epoch: 2,
            sequence_number: MAX_SEQUENCE_NUMBER,
            content_len: 0,
        };
        let raw = header.marshal();
        let parsed = RecordLayerHeader::unmarshal(&raw).unwrap();
        assert_eq!(parsed.sequence_number, MAX_SEQUENCE_NUMBER);
    }
}

use crate::content::ContentType;
use crate::error::{Error, Result};

pub const RECORD_LAYER_HEADER_SIZE: usize = 13;
pub const MAX_SEQUENCE_NUMBER: u64 = 0x0000_FFFF_FFFF_FFFF;
pub const DTLS_MAX_RECORD_LEN: usize = 16384 + 2048;

// DTLS on-the-wire version numbers (1.2 = {254, 253}).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

pub const PROTOCOL_VERSION1_0: ProtocolVersion = ProtocolVersion {
    major: 0xfe,
    minor: 0xff,
};
pub const PROTOCOL_VERSION1_2: ProtocolVersion = ProtocolVersion {
    major: 0xfe,
    minor: 0xfd,
};

// RecordLayerHeader is the 13-byte DTLS record prefix: type, version,
// epoch, 48-bit sequence number and payload length.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RecordLayerHeader {
    pub content_type: ContentType,
    pub protocol_version: ProtocolVersion,
    pub epoch: u16,
    pub sequence_number: u64,
    pub content_len: u16,
}

impl RecordLayerHeader {
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_LAYER_HEADER_SIZE);
        out.push(self.content_type as u8);
        out.push(self.protocol_version.major);
        out.push(self.protocol_version.minor);
        out.extend_from_slice(&self.epoch.to_be_bytes());
        out.extend_from_slice(&self.sequence_number.to_be_bytes()[2..8]);
        out.extend_from_slice(&self.content_len.to_be_bytes());
        out
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.len() < RECORD_LAYER_HEADER_SIZE {
            return Err(Error::ErrBufferTooSmall);
        }
        let content_type = ContentType::from(raw[0]);
        if content_type == ContentType::Invalid {
            return Err(Error::ErrInvalidContentType);
        }
        let protocol_version = ProtocolVersion {
            major: raw[1],
            minor: raw[2],
        };
        // Tolerate 1.0 in the first flight, as RFC 6347 requires.
        if protocol_version != PROTOCOL_VERSION1_2 && protocol_version != PROTOCOL_VERSION1_0 {
            return Err(Error::ErrUnsupportedProtocolVersion);
        }
        let epoch = u16::from_be_bytes([raw[3], raw[4]]);
        let sequence_number = u64::from_be_bytes([
            0, 0, raw[5], raw[6], raw[7], raw[8], raw[9], raw[10],
        ]);
        let content_len = u16::from_be_bytes([raw[11], raw[12]]);
        Ok(RecordLayerHeader {
            content_type,
            protocol_version,
            epoch,
            sequence_number,
            content_len,
        })
    }
}

// split_records iterates the records packed into one datagram.
pub fn split_records(datagram: &[u8]) -> Vec<(RecordLayerHeader, Vec<u8>)> {
    let mut out = vec![];
    let mut offset = 0;
    while offset + RECORD_LAYER_HEADER_SIZE <= datagram.len() {
        let Ok(header) = RecordLayerHeader::unmarshal(&datagram[offset..]) else {
            break;
        };
        let body_start = offset + RECORD_LAYER_HEADER_SIZE;
        let body_end = body_start + header.content_len as usize;
        if body_end > datagram.len() {
            break;
        }
        out.push((header, datagram[body_start..body_end].to_vec()));
        offset = body_end;
    }
    out
}
