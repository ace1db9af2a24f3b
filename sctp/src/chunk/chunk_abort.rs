use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{write_chunk_header, ChunkType};
use crate::error::Result;

// ErrorCause is a cause TLV inside ABORT or ERROR chunks (RFC 4960 §3.3.10).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorCause {
    pub code: u16,
    pub raw: Bytes,
}

pub const ERROR_CAUSE_INVALID_MANDATORY_PARAMETER: u16 = 7;
pub const ERROR_CAUSE_UNRECOGNIZED_CHUNK_TYPE: u16 = 6;
pub const ERROR_CAUSE_PROTOCOL_VIOLATION: u16 = 13;
pub const ERROR_CAUSE_USER_INITIATED_ABORT: u16 = 12;

fn unmarshal_causes(value: &Bytes) -> Vec<ErrorCause> {
    let mut causes = vec![];
    let mut offset = 0;
    while offset + 4 <= value.len() {
        let mut buf = &value[offset..];
        let code = buf.get_u16();
        let length = buf.get_u16() as usize;
        if length < 4 || offset + length > value.len() {
            break;
        }
        causes.push(ErrorCause {
            code,
            raw: value.slice(offset + 4..offset + length),
        });
        offset += length + (4 - length % 4) % 4;
    }
    causes
}

fn marshal_causes(causes: &[ErrorCause], buf: &mut BytesMut) {
    for c in causes {
        let len = 4 + c.raw.len();
        buf.put_u16(c.code);
        buf.put_u16(len as u16);
        buf.put_slice(&c.raw);
        for _ in 0..(4 - len % 4) % 4 {
            buf.put_u8(0);
        }
    }
}

fn causes_length(causes: &[ErrorCause]) -> usize {
    causes
        .iter()
        .map(|c| {
            let l = 4 + c.raw.len();
            l + (4 - l % 4) % 4
        })
        .sum()
}

// ChunkAbort closes an association immediately (RFC 4960 §3.3.7).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkAbort {
    pub error_causes: Vec<ErrorCause>,
}

impl ChunkAbort {
    pub(crate) fn unmarshal(value: &Bytes) -> Result<Self> {
        Ok(ChunkAbort {
            error_causes: unmarshal_causes(value),
        })
    }

    pub(crate) fn marshal_to(&self, buf: &mut BytesMut) {
        write_chunk_header(buf, ChunkType::Abort, 0, causes_length(&self.error_causes));
        marshal_causes(&self.error_causes, buf);
    }
}

// ChunkError reports non-fatal error causes (RFC 4960 §3.3.10).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkError {
    pub error_causes: Vec<ErrorCause>,
}

impl ChunkError {
    pub(crate) fn unmarshal(value: &Bytes) -> Result<Self> {
        Ok(ChunkError {
            error_causes: unmarshal_causes(value),
        })
    }

    pub(crate) fn marshal_to(&self, buf: &mut BytesMut) {
        write_chunk_header(buf, ChunkType::Error, 0, causes_length(&self.error_causes));
        marshal_causes(&self.error_causes, buf);
    }
}
