use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{write_chunk_header, ChunkType};
use crate::error::{Error, Result};

// ChunkForwardTsnStream tells the receiver to move a stream's sequence
// cursor past abandoned messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkForwardTsnStream {
    pub identifier: u16,
    pub sequence: u16,
}

// ChunkForwardTsn advances the peer's cumulative TSN over abandoned
// chunks (RFC 3758 §3.2).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkForwardTsn {
    pub new_cumulative_tsn: u32,
    pub streams: Vec<ChunkForwardTsnStream>,
}

impl ChunkForwardTsn {
    pub(crate) fn unmarshal(value: &Bytes) -> Result<Self> {
        if value.len() < 4 {
            return Err(Error::ErrChunkTypeNotForwardTsn);
        }
        let mut buf = &value[..];
        let new_cumulative_tsn = buf.get_u32();
        let mut streams = vec![];
        while buf.remaining() >= 4 {
            streams.push(ChunkForwardTsnStream {
                identifier: buf.get_u16(),
                sequence: buf.get_u16(),
            });
        }
        Ok(ChunkForwardTsn {
            new_cumulative_tsn,
            streams,
        })
    }

    pub(crate) fn marshal_to(&self, buf: &mut BytesMut) {
        write_chunk_header(
            buf,
            ChunkType::ForwardTsn,
            0,
            4 + self.streams.len() * 4,
        );
        buf.put_u32(self.new_cumulative_tsn);
        for s in &self.streams {
            buf.put_u16(s.identifier);
            buf.put_u16(s.sequence);
        }
    }
}
