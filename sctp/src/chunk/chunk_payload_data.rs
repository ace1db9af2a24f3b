use std::time::Instant;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{write_chunk_header, ChunkType, CHUNK_HEADER_SIZE};
use crate::error::{Error, Result};

pub(crate) const PAYLOAD_DATA_ENDING_FRAGMENT_BITMASK: u8 = 1;
pub(crate) const PAYLOAD_DATA_BEGINNING_FRAGMENT_BITMASK: u8 = 2;
pub(crate) const PAYLOAD_DATA_UNORDERED_BITMASK: u8 = 4;
pub(crate) const PAYLOAD_DATA_IMMEDIATE_SACK: u8 = 8;

pub(crate) const PAYLOAD_DATA_HEADER_SIZE: usize = 12;

// PayloadProtocolIdentifier is the application protocol carried in a DATA
// chunk; WebRTC uses the DCEP values of RFC 8831 §8.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum PayloadProtocolIdentifier {
    #[default]
    Unknown = 0,
    Dcep = 50,
    String = 51,
    Binary = 53,
    StringEmpty = 56,
    BinaryEmpty = 57,
}

impl From<u32> for PayloadProtocolIdentifier {
    fn from(v: u32) -> Self {
        match v {
            50 => PayloadProtocolIdentifier::Dcep,
            51 => PayloadProtocolIdentifier::String,
            53 => PayloadProtocolIdentifier::Binary,
            56 => PayloadProtocolIdentifier::StringEmpty,
            57 => PayloadProtocolIdentifier::BinaryEmpty,
            _ => PayloadProtocolIdentifier::Unknown,
        }
    }
}

// ChunkPayloadData is a DATA chunk (RFC 4960 §3.3.1) plus the
// bookkeeping the sender needs for retransmission and abandonment.
#[derive(Debug, Clone)]
pub struct ChunkPayloadData {
    pub unordered: bool,
    pub beginning_fragment: bool,
    pub ending_fragment: bool,
    pub immediate_sack: bool,

    pub tsn: u32,
    pub stream_identifier: u16,
    pub stream_sequence_number: u16,
    pub payload_type: PayloadProtocolIdentifier,
    pub user_data: Bytes,

    // Sender-side state, never on the wire.
    pub nsent: u32,
    pub since: Option<Instant>,
    pub acked: bool,
    pub abandoned: bool,
    pub all_inflight: bool,
    pub retransmit: bool,
    pub miss_indicator: u32,
    // Remaining retransmit budget for partial reliability, None when the
    // channel is fully reliable.
    pub max_retransmits: Option<u32>,
    pub lifetime: Option<std::time::Duration>,
}

impl Default for ChunkPayloadData {
    fn default() -> Self {
        ChunkPayloadData {
            unordered: false,
            beginning_fragment: false,
            ending_fragment: false,
            immediate_sack: false,
            tsn: 0,
            stream_identifier: 0,
            stream_sequence_number: 0,
            payload_type: PayloadProtocolIdentifier::Unknown,
            user_data: Bytes::new(),
            nsent: 0,
            since: None,
            acked: false,
            abandoned: false,
            all_inflight: false,
            retransmit: false,
            miss_indicator: 0,
            max_retransmits: None,
            lifetime: None,
        }
    }
}

impl PartialEq for ChunkPayloadData {
    fn eq(&self, other: &Self) -> bool {
        self.unordered == other.unordered
            && self.beginning_fragment == other.beginning_fragment
            && self.ending_fragment == other.ending_fragment
            && self.immediate_sack == other.immediate_sack
            && self.tsn == other.tsn
            && self.stream_identifier == other.stream_identifier
            && self.stream_sequence_number == other.stream_sequence_number
            && self.payload_type == other.payload_type
            && self.user_data == other.user_data
    }
}

impl ChunkPayloadData {
    pub(crate) fn unmarshal(flags: u8, value: &Bytes) -> Result<Self> {
        if value.len() < PAYLOAD_DATA_HEADER_SIZE {
            return Err(Error::ErrChunkTypeNotPayloadData);
        }
        let mut buf = &value[..];
        let tsn = buf.get_u32();
        let stream_identifier = buf.get_u16();
        let stream_sequence_number = buf.get_u16();
        let payload_type = PayloadProtocolIdentifier::from(buf.get_u32());

        Ok(ChunkPayloadData {
            unordered: flags & PAYLOAD_DATA_UNORDERED_BITMASK != 0,
            beginning_fragment: flags & PAYLOAD_DATA_BEGINNING_FRAGMENT_BITMASK != 0,
            ending_fragment: flags & PAYLOAD_DATA_ENDING_FRAGMENT_BITMASK != 0,
            immediate_sack: flags & PAYLOAD_DATA_IMMEDIATE_SACK != 0,
            tsn,
            stream_identifier,
            stream_sequence_number,
            payload_type,
            user_data: value.slice(PAYLOAD_DATA_HEADER_SIZE..),
            ..Default::default()
        })
    }

    pub(crate) fn marshal_to(&self, buf: &mut BytesMut) {
        let mut flags = 0u8;
        if self.ending_fragment {
            flags |= PAYLOAD_DATA_ENDING_FRAGMENT_BITMASK;
        }
        if self.beginning_fragment {
            flags |= PAYLOAD_DATA_BEGINNING_FRAGMENT_BITMASK;
        }
        if self.unordered {
            flags |= PAYLOAD_DATA_UNORDERED_BITMASK;
        }
        if self.immediate_sack {
            flags |= PAYLOAD_DATA_IMMEDIATE_SACK;
        }

        write_chunk_header(
            buf,
            ChunkType::PayloadData,
            flags,
            PAYLOAD_DATA_HEADER_SIZE + self.user_data.len(),
        );
        buf.put_u32(self.tsn);
        buf.put_u16(self.stream_identifier);
        buf.put_u16(self.stream_sequence_number);
        buf.put_u32(self.payload_type as u32);
        buf.put_slice(&self.user_data);
    }

    pub(crate) fn chunk_size(&self) -> usize {
        CHUNK_HEADER_SIZE + PAYLOAD_DATA_HEADER_SIZE + self.user_data.len()
    }
}
