use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{write_chunk_header, ChunkType};
use crate::error::{Error, Result};

// GapAckBlock describes a received run above the cumulative TSN, as
// offsets relative to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GapAckBlock {
    pub start: u16,
    pub end: u16,
}

// ChunkSelectiveAck is a SACK chunk (RFC 4960 §3.3.4).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkSelectiveAck {
    pub cumulative_tsn_ack: u32,
    pub advertised_receiver_window_credit: u32,
    pub gap_ack_blocks: Vec<GapAckBlock>,
    pub duplicate_tsn: Vec<u32>,
}

const SELECTIVE_ACK_HEADER_SIZE: usize = 12;

impl ChunkSelectiveAck {
    pub(crate) fn unmarshal(value: &Bytes) -> Result<Self> {
        if value.len() < SELECTIVE_ACK_HEADER_SIZE {
            return Err(Error::ErrSackSizeNotLargeEnoughInfo);
        }
        let mut buf = &value[..];
        let cumulative_tsn_ack = buf.get_u32();
        let advertised_receiver_window_credit = buf.get_u32();
        let n_gaps = buf.get_u16() as usize;
        let n_dups = buf.get_u16() as usize;

        if value.len() < SELECTIVE_ACK_HEADER_SIZE + n_gaps * 4 + n_dups * 4 {
            return Err(Error::ErrSackSizeNotLargeEnoughInfo);
        }

        let mut gap_ack_blocks = Vec::with_capacity(n_gaps);
        for _ in 0..n_gaps {
            gap_ack_blocks.push(GapAckBlock {
                start: buf.get_u16(),
                end: buf.get_u16(),
            });
        }
        let mut duplicate_tsn = Vec::with_capacity(n_dups);
        for _ in 0..n_dups {
            duplicate_tsn.push(buf.get_u32());
        }

        Ok(ChunkSelectiveAck {
            cumulative_tsn_ack,
            advertised_receiver_window_credit,
            gap_ack_blocks,
            duplicate_tsn,
        })
    }

    pub(crate) fn marshal_to(&self, buf: &mut BytesMut) {
        let value_len = SELECTIVE_ACK_HEADER_SIZE
            + self.gap_ack_blocks.len() * 4
            + self.duplicate_tsn.len() * 4;
        write_chunk_header(buf, ChunkType::Sack, 0, value_len);
        buf.put_u32(self.cumulative_tsn_ack);
        buf.put_u32(self.advertised_receiver_window_credit);
        buf.put_u16(self.gap_ack_blocks.len() as u16);
        buf.put_u16(self.duplicate_tsn.len() as u16);
        for gap in &self.gap_ack_blocks {
            buf.put_u16(gap.start);
            buf.put_u16(gap.end);
        }
        for dup in &self.duplicate_tsn {
            buf.put_u32(*dup);
        }
    }
}
