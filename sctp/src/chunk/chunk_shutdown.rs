use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{write_chunk_header, ChunkType};
use crate::error::{Error, Result};

// ChunkShutdown starts a graceful teardown (RFC 4960 §3.3.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkShutdown {
    pub cumulative_tsn_ack: u32,
}

impl ChunkShutdown {
    pub(crate) fn unmarshal(value: &Bytes) -> Result<Self> {
        if value.len() < 4 {
            return Err(Error::ErrChunkValueNotLongEnough);
        }
        let mut buf = &value[..];
        Ok(ChunkShutdown {
            cumulative_tsn_ack: buf.get_u32(),
        })
    }

    pub(crate) fn marshal_to(&self, buf: &mut BytesMut) {
        write_chunk_header(buf, ChunkType::Shutdown, 0, 4);
        buf.put_u32(self.cumulative_tsn_ack);
    }
}

// ChunkShutdownAck (RFC 4960 §3.3.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkShutdownAck {}

// ChunkShutdownComplete (RFC 4960 §3.3.13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkShutdownComplete {
    pub verification_tag_reflected: bool,
}
