#[cfg(test)]
mod chunk_test;

pub mod chunk_abort;
pub mod chunk_cookie;
pub mod chunk_forward_tsn;
pub mod chunk_heartbeat;
pub mod chunk_init;
pub mod chunk_payload_data;
pub mod chunk_reconfig;
pub mod chunk_selective_ack;
pub mod chunk_shutdown;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::param::get_padding_size;

pub use chunk_abort::*;
pub use chunk_cookie::*;
pub use chunk_forward_tsn::*;
pub use chunk_heartbeat::*;
pub use chunk_init::*;
pub use chunk_payload_data::*;
pub use chunk_reconfig::*;
pub use chunk_selective_ack::*;
pub use chunk_shutdown::*;

pub const CHUNK_HEADER_SIZE: usize = 4;

// ChunkType per RFC 4960 §3.2 plus the extensions this stack speaks.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkType {
    PayloadData = 0,
    Init = 1,
    InitAck = 2,
    Sack = 3,
    Heartbeat = 4,
    HeartbeatAck = 5,
    Abort = 6,
    Shutdown = 7,
    ShutdownAck = 8,
    Error = 9,
    CookieEcho = 10,
    CookieAck = 11,
    ShutdownComplete = 14,
    Reconfig = 130,
    ForwardTsn = 192,
    Unknown = 255,
}

impl From<u8> for ChunkType {
    fn from(v: u8) -> Self {
        match v {
            0 => ChunkType::PayloadData,
            1 => ChunkType::Init,
            2 => ChunkType::InitAck,
            3 => ChunkType::Sack,
            4 => ChunkType::Heartbeat,
            5 => ChunkType::HeartbeatAck,
            6 => ChunkType::Abort,
            7 => ChunkType::Shutdown,
            8 => ChunkType::ShutdownAck,
            9 => ChunkType::Error,
            10 => ChunkType::CookieEcho,
            11 => ChunkType::CookieAck,
            14 => ChunkType::ShutdownComplete,
            130 => ChunkType::Reconfig,
            192 => ChunkType::ForwardTsn,
            _ => ChunkType::Unknown,
        }
    }
}

// ChunkHeader is the type/flags/length prefix every chunk carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub typ: ChunkType,
    pub flags: u8,
    // Length of the chunk including this header, excluding padding.
    pub value_length: usize,
}

impl ChunkHeader {
    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        if raw.len() < CHUNK_HEADER_SIZE {
            return Err(Error::ErrChunkHeaderTooSmall);
        }
        let mut buf = &raw[..];
        let typ = ChunkType::from(buf.get_u8());
        let flags = buf.get_u8();
        let length = buf.get_u16() as usize;
        if length < CHUNK_HEADER_SIZE {
            return Err(Error::ErrChunkHeaderInvalidLength);
        }
        if length > raw.len() {
            return Err(Error::ErrChunkHeaderNotEnoughSpace);
        }
        Ok(ChunkHeader {
            typ,
            flags,
            value_length: length - CHUNK_HEADER_SIZE,
        })
    }
}

// write_chunk_header emits the shared type/flags/length prefix.
pub(crate) fn write_chunk_header(buf: &mut BytesMut, typ: ChunkType, flags: u8, value_len: usize) {
    buf.put_u8(typ as u8);
    buf.put_u8(flags);
    buf.put_u16((CHUNK_HEADER_SIZE + value_len) as u16);
}

// Chunk is every chunk kind this association understands. Unknown chunks
// are preserved for stats but never acted upon.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    PayloadData(ChunkPayloadData),
    Init(ChunkInit),
    Sack(ChunkSelectiveAck),
    Heartbeat(ChunkHeartbeat),
    HeartbeatAck(ChunkHeartbeatAck),
    Abort(ChunkAbort),
    Shutdown(ChunkShutdown),
    ShutdownAck(ChunkShutdownAck),
    ShutdownComplete(ChunkShutdownComplete),
    Error(ChunkError),
    CookieEcho(ChunkCookieEcho),
    CookieAck(ChunkCookieAck),
    Reconfig(ChunkReconfig),
    ForwardTsn(ChunkForwardTsn),
    Unknown { typ: u8, flags: u8, value: Bytes },
}

impl Chunk {
    // unmarshal reads one chunk, returning it and the consumed byte count
    // including inter-chunk padding.
    pub fn unmarshal(raw: &Bytes) -> Result<(Chunk, usize)> {
        let header = ChunkHeader::unmarshal(raw)?;
        let total = CHUNK_HEADER_SIZE + header.value_length;
        let value = raw.slice(CHUNK_HEADER_SIZE..total);

        let chunk = match header.typ {
            ChunkType::PayloadData => {
                Chunk::PayloadData(ChunkPayloadData::unmarshal(header.flags, &value)?)
            }
            ChunkType::Init | ChunkType::InitAck => Chunk::Init(ChunkInit::unmarshal(
                header.typ == ChunkType::InitAck,
                &value,
            )?),
            ChunkType::Sack => Chunk::Sack(ChunkSelectiveAck::unmarshal(&value)?),
            ChunkType::Heartbeat => Chunk::Heartbeat(ChunkHeartbeat::unmarshal(&value)?),
            ChunkType::HeartbeatAck => Chunk::HeartbeatAck(ChunkHeartbeatAck::unmarshal(&value)?),
            ChunkType::Abort => Chunk::Abort(ChunkAbort::unmarshal(&value)?),
            ChunkType::Shutdown => Chunk::Shutdown(ChunkShutdown::unmarshal(&value)?),
            ChunkType::ShutdownAck => Chunk::ShutdownAck(ChunkShutdownAck {}),
            ChunkType::ShutdownComplete => Chunk::ShutdownComplete(ChunkShutdownComplete {
                verification_tag_reflected: header.flags & 1 != 0,
            }),
            ChunkType::Error => Chunk::Error(ChunkError::unmarshal(&value)?),
            ChunkType::CookieEcho => Chunk::CookieEcho(ChunkCookieEcho { cookie: value }),
            ChunkType::CookieAck => Chunk::CookieAck(ChunkCookieAck {}),
            ChunkType::Reconfig => Chunk::Reconfig(ChunkReconfig::unmarshal(&value)?),
            ChunkType::ForwardTsn => Chunk::ForwardTsn(ChunkForwardTsn::unmarshal(&value)?),
            ChunkType::Unknown => Chunk::Unknown {
                typ: raw[0],
                flags: header.flags,
                value,
            },
        };

        let padded = total + get_padding_size(total);
        Ok((chunk, padded.min(raw.len())))
    }

    pub fn marshal_to(&self, buf: &mut BytesMut) {
        let start = buf.len();
        match self {
            Chunk::PayloadData(c) => c.marshal_to(buf),
            Chunk::Init(c) => c.marshal_to(buf),
            Chunk::Sack(c) => c.marshal_to(buf),
            Chunk::Heartbeat(c) => c.marshal_to(buf),
            Chunk::HeartbeatAck(c) => c.marshal_to(buf),
            Chunk::Abort(c) => c.marshal_to(buf),
            Chunk::Shutdown(c) => c.marshal_to(buf),
            Chunk::ShutdownAck(_) => {
                buf.put_u8(ChunkType::ShutdownAck as u8);
                buf.put_u8(0);
                buf.put_u16(CHUNK_HEADER_SIZE as u16);
            }
            Chunk::ShutdownComplete(c) => {
                buf.put_u8(ChunkType::ShutdownComplete as u8);
                buf.put_u8(u8::from(c.verification_tag_reflected));
                buf.put_u16(CHUNK_HEADER_SIZE as u16);
            }
            Chunk::Error(c) => c.marshal_to(buf),
            Chunk::CookieEcho(c) => {
                buf.put_u8(ChunkType::CookieEcho as u8);
                buf.put_u8(0);
                buf.put_u16((CHUNK_HEADER_SIZE + c.cookie.len()) as u16);
                buf.put_slice(&c.cookie);
            }
            Chunk::CookieAck(_) => {
                buf.put_u8(ChunkType::CookieAck as u8);
                buf.put_u8(0);
                buf.put_u16(CHUNK_HEADER_SIZE as u16);
            }
            Chunk::Reconfig(c) => c.marshal_to(buf),
            Chunk::ForwardTsn(c) => c.marshal_to(buf),
            Chunk::Unknown { typ, flags, value } => {
                buf.put_u8(*typ);
                buf.put_u8(*flags);
                buf.put_u16((CHUNK_HEADER_SIZE + value.len()) as u16);
                buf.put_slice(value);
            }
        }
        // Chunks are padded to 4-byte boundaries on the wire.
        let written = buf.len() - start;
        for _ in 0..get_padding_size(written) {
            buf.put_u8(0);
        }
    }
}
