#[cfg(test)]
mod transport_layer_cc_test;

use std::any::Any;
use std::fmt;

use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;
use crate::util::get_padding_size;

// draft-holmer-rmcat-transport-wide-cc-extensions-01, §3.1:
//
// 0                   1                   2                   3
// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |V=2|P|  FMT=15 |    PT=205     |           length              |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                     SSRC of packet sender                     |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                      SSRC of media source                     |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |      base sequence number     |      packet status count      |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                 reference time                | fb pkt. count |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |          packet chunk         |         packet chunk          |
// ...
// |           recv delta          |  recv delta   | zero padding  |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

// Packet status symbols.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
#[repr(u16)]
pub enum SymbolTypeTcc {
    #[default]
    PacketNotReceived = 0,
    PacketReceivedSmallDelta = 1,
    PacketReceivedLargeDelta = 2,
    PacketReceivedWithoutDelta = 3,
}

impl From<u16> for SymbolTypeTcc {
    fn from(val: u16) -> Self {
        match val {
            0 => SymbolTypeTcc::PacketNotReceived,
            1 => SymbolTypeTcc::PacketReceivedSmallDelta,
            2 => SymbolTypeTcc::PacketReceivedLargeDelta,
            _ => SymbolTypeTcc::PacketReceivedWithoutDelta,
        }
    }
}

#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
#[repr(u16)]
pub enum SymbolSizeTypeTcc {
    #[default]
    OneBit = 0,
    TwoBit = 1,
}

impl From<u16> for SymbolSizeTypeTcc {
    fn from(val: u16) -> Self {
        match val {
            0 => SymbolSizeTypeTcc::OneBit,
            _ => SymbolSizeTypeTcc::TwoBit,
        }
    }
}

const TYPE_TCC_RUN_LENGTH_CHUNK: u16 = 0;
const TYPE_TCC_STATUS_VECTOR_CHUNK: u16 = 1;

// Deltas are expressed in multiples of 250 µs.
pub const TYPE_TCC_DELTA_SCALE_FACTOR: i64 = 250;

pub const PACKET_STATUS_CHUNK_LENGTH: usize = 2;

// PacketStatusChunk is either a run-length chunk or a status vector chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketStatusChunk {
    RunLengthChunk(RunLengthChunk),
    StatusVectorChunk(StatusVectorChunk),
}

impl PacketStatusChunk {
    // symbols expands the chunk into one symbol per covered packet.
    pub fn symbols(&self) -> Vec<SymbolTypeTcc> {
        match self {
            PacketStatusChunk::RunLengthChunk(c) => {
                vec![c.packet_status_symbol; c.run_length as usize]
            }
            PacketStatusChunk::StatusVectorChunk(c) => c.symbol_list.clone(),
        }
    }
}

impl MarshalSize for PacketStatusChunk {
    fn marshal_size(&self) -> usize {
        PACKET_STATUS_CHUNK_LENGTH
    }
}

impl Marshal for PacketStatusChunk {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        if buf.remaining_mut() < PACKET_STATUS_CHUNK_LENGTH {
            return Err(Error::BufferTooShort.into());
        }
        match self {
            PacketStatusChunk::RunLengthChunk(c) => {
                if c.run_length > 0x1FFF {
                    return Err(Error::WrongRunLengthChunkSize.into());
                }
                let word = (TYPE_TCC_RUN_LENGTH_CHUNK << 15)
                    | ((c.packet_status_symbol as u16) << 13)
                    | c.run_length;
                buf.put_u16(word);
            }
            PacketStatusChunk::StatusVectorChunk(c) => {
                let mut word = (TYPE_TCC_STATUS_VECTOR_CHUNK << 15)
                    | ((c.symbol_size as u16) << 14);
                match c.symbol_size {
                    SymbolSizeTypeTcc::OneBit => {
                        if c.symbol_list.len() != 14 {
                            return Err(Error::WrongStatusVectorChunkSize.into());
                        }
                        for (i, s) in c.symbol_list.iter().enumerate() {
                            if *s != SymbolTypeTcc::PacketNotReceived {
                                word |= 1 << (13 - i);
                            }
                        }
                    }
                    SymbolSizeTypeTcc::TwoBit => {
                        if c.symbol_list.len() != 7 {
                            return Err(Error::WrongStatusVectorChunkSize.into());
                        }
                        for (i, s) in c.symbol_list.iter().enumerate() {
                            word |= (*s as u16) << (12 - 2 * i);
                        }
                    }
                }
                buf.put_u16(word);
            }
        }
        Ok(PACKET_STATUS_CHUNK_LENGTH)
    }
}

impl Unmarshal for PacketStatusChunk {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        if raw_packet.remaining() < PACKET_STATUS_CHUNK_LENGTH {
            return Err(Error::PacketTooShort.into());
        }
        let word = raw_packet.get_u16();
        if word >> 15 == TYPE_TCC_RUN_LENGTH_CHUNK {
            Ok(PacketStatusChunk::RunLengthChunk(RunLengthChunk {
                packet_status_symbol: SymbolTypeTcc::from((word >> 13) & 0x3),
                run_length: word & 0x1FFF,
            }))
        } else {
            let symbol_size = SymbolSizeTypeTcc::from((word >> 14) & 0x1);
            let mut symbol_list = vec![];
            match symbol_size {
                SymbolSizeTypeTcc::OneBit => {
                    for i in 0..14 {
                        let bit = (word >> (13 - i)) & 0x1;
                        symbol_list.push(SymbolTypeTcc::from(bit));
                    }
                }
                SymbolSizeTypeTcc::TwoBit => {
                    for i in 0..7 {
                        symbol_list.push(SymbolTypeTcc::from((word >> (12 - 2 * i)) & 0x3));
                    }
                }
            }
            Ok(PacketStatusChunk::StatusVectorChunk(StatusVectorChunk {
                symbol_size,
                symbol_list,
            }))
        }
    }
}

// RunLengthChunk encodes run_length packets sharing one status symbol.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunLengthChunk {
    pub packet_status_symbol: SymbolTypeTcc,
    // 13-bit count.
    pub run_length: u16,
}

// StatusVectorChunk encodes up to 14 one-bit or 7 two-bit symbols.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusVectorChunk {
    pub symbol_size: SymbolSizeTypeTcc,
    pub symbol_list: Vec<SymbolTypeTcc>,
}

// RecvDelta is the receive time delta of one received packet.
// Small deltas are a single unsigned byte covering [0, 63.75] ms, large
// deltas two signed bytes covering [-8192, 8191.75] ms, both in 250 µs
// steps. The delta field here is in microseconds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecvDelta {
    pub type_tcc_packet: SymbolTypeTcc,
    pub delta: i64,
}

impl MarshalSize for RecvDelta {
    fn marshal_size(&self) -> usize {
        match self.type_tcc_packet {
            SymbolTypeTcc::PacketReceivedSmallDelta => 1,
            SymbolTypeTcc::PacketReceivedLargeDelta => 2,
            _ => 0,
        }
    }
}

impl Marshal for RecvDelta {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        let delta = self.delta / TYPE_TCC_DELTA_SCALE_FACTOR;

        match self.type_tcc_packet {
            SymbolTypeTcc::PacketReceivedSmallDelta
                if (0..=u8::MAX as i64).contains(&delta) =>
            {
                if buf.remaining_mut() < 1 {
                    return Err(Error::BufferTooShort.into());
                }
                buf.put_u8(delta as u8);
                Ok(1)
            }
            SymbolTypeTcc::PacketReceivedLargeDelta
                if (i16::MIN as i64..=i16::MAX as i64).contains(&delta) =>
            {
                if buf.remaining_mut() < 2 {
                    return Err(Error::BufferTooShort.into());
                }
                buf.put_i16(delta as i16);
                Ok(2)
            }
            _ => Err(Error::DeltaExceedLimit.into()),
        }
    }
}

impl RecvDelta {
    // unmarshal_with_type reads a delta knowing its symbol from the chunk.
    pub fn unmarshal_with_type<B>(
        raw_packet: &mut B,
        typ: SymbolTypeTcc,
    ) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        match typ {
            SymbolTypeTcc::PacketReceivedSmallDelta => {
                if raw_packet.remaining() < 1 {
                    return Err(Error::PacketTooShort.into());
                }
                Ok(RecvDelta {
                    type_tcc_packet: typ,
                    delta: TYPE_TCC_DELTA_SCALE_FACTOR * raw_packet.get_u8() as i64,
                })
            }
            SymbolTypeTcc::PacketReceivedLargeDelta => {
                if raw_packet.remaining() < 2 {
                    return Err(Error::PacketTooShort.into());
                }
                Ok(RecvDelta {
                    type_tcc_packet: typ,
                    delta: TYPE_TCC_DELTA_SCALE_FACTOR * raw_packet.get_i16() as i64,
                })
            }
            _ => Err(Error::WrongTypeTcc.into()),
        }
    }
}

const BASE_SEQUENCE_NUMBER_OFFSET: usize = 8;
const PACKET_STATUS_COUNT_OFFSET: usize = 10;
const REFERENCE_TIME_OFFSET: usize = 12;
const FB_PKT_COUNT_OFFSET: usize = 15;
const PACKET_CHUNK_OFFSET: usize = 16;

// TransportLayerCc is the transport-wide congestion control feedback
// message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransportLayerCc {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    pub base_sequence_number: u16,
    pub packet_status_count: u16,
    // 24-bit, in multiples of 64 ms.
    pub reference_time: u32,
    pub fb_pkt_count: u8,
    pub packet_chunks: Vec<PacketStatusChunk>,
    pub recv_deltas: Vec<RecvDelta>,
}

impl fmt::Display for TransportLayerCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransportLayerCc sender={:x} media={:x} base={} count={} refTime={} fbPktCount={}",
            self.sender_ssrc,
            self.media_ssrc,
            self.base_sequence_number,
            self.packet_status_count,
            self.reference_time,
            self.fb_pkt_count
        )
    }
}

impl Packet for TransportLayerCc {
    fn header(&self) -> Header {
        Header {
            padding: false,
            count: FORMAT_TCC,
            packet_type: PacketType::TransportSpecificFeedback,
            length: ((self.marshal_size() / 4) - 1) as u16,
        }
    }

    fn destination_ssrc(&self) -> Vec<u32> {
        vec![self.media_ssrc]
    }

    fn raw_size(&self) -> usize {
        let mut n = HEADER_LENGTH + PACKET_CHUNK_OFFSET
            + self.packet_chunks.len() * PACKET_STATUS_CHUNK_LENGTH;
        for d in &self.recv_deltas {
            n += d.marshal_size();
        }
        n
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &(dyn Packet + Send + Sync)) -> bool {
        other
            .as_any()
            .downcast_ref::<TransportLayerCc>()
            .is_some_and(|a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet + Send + Sync> {
        Box::new(self.clone())
    }
}

impl MarshalSize for TransportLayerCc {
    fn marshal_size(&self) -> usize {
        let l = self.raw_size();
        l + get_padding_size(l)
    }
}

impl Marshal for TransportLayerCc {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::BufferTooShort.into());
        }

        let h = self.header();
        let n = h.marshal_to(buf)?;
        buf = &mut buf[n..];

        buf.put_u32(self.sender_ssrc);
        buf.put_u32(self.media_ssrc);
        buf.put_u16(self.base_sequence_number);
        buf.put_u16(self.packet_status_count);
        buf.put_u8((self.reference_time >> 16) as u8);
        buf.put_u8((self.reference_time >> 8) as u8);
        buf.put_u8(self.reference_time as u8);
        buf.put_u8(self.fb_pkt_count);

        for chunk in &self.packet_chunks {
            let n = chunk.marshal_to(buf)?;
            buf = &mut buf[n..];
        }

        for delta in &self.recv_deltas {
            let n = delta.marshal_to(buf)?;
            buf = &mut buf[n..];
        }

        for _ in 0..get_padding_size(self.raw_size()) {
            buf.put_u8(0);
        }

        Ok(self.marshal_size())
    }
}

impl Unmarshal for TransportLayerCc {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        let total_len = raw_packet.remaining();
        if total_len < HEADER_LENGTH + PACKET_CHUNK_OFFSET {
            return Err(Error::PacketTooShort.into());
        }

        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::TransportSpecificFeedback
            || header.count != FORMAT_TCC
        {
            return Err(Error::WrongType.into());
        }

        let sender_ssrc = raw_packet.get_u32();
        let media_ssrc = raw_packet.get_u32();
        let base_sequence_number = raw_packet.get_u16();
        let packet_status_count = raw_packet.get_u16();
        let b0 = raw_packet.get_u8() as u32;
        let b1 = raw_packet.get_u8() as u32;
        let b2 = raw_packet.get_u8() as u32;
        let reference_time = b0 << 16 | b1 << 8 | b2;
        let fb_pkt_count = raw_packet.get_u8();

        // Read chunks until every status is covered.
        let mut packet_chunks = vec![];
        let mut covered = 0usize;
        while covered < packet_status_count as usize {
            let chunk = PacketStatusChunk::unmarshal(raw_packet)?;
            covered += chunk.symbols().len();
            packet_chunks.push(chunk);
        }

        // One delta per received symbol, in order. Symbols past
        // packet_status_count are vector padding and carry no delta.
        let mut recv_deltas = vec![];
        let mut symbol_index = 0usize;
        'outer: for chunk in &packet_chunks {
            for symbol in chunk.symbols() {
                if symbol_index >= packet_status_count as usize {
                    break 'outer;
                }
                symbol_index += 1;
                match symbol {
                    SymbolTypeTcc::PacketReceivedSmallDelta
                    | SymbolTypeTcc::PacketReceivedLargeDelta => {
                        recv_deltas.push(RecvDelta::unmarshal_with_type(raw_packet, symbol)?);
                    }
                    _ => {}
                }
            }
        }

        // Swallow trailing padding.
        raw_packet.advance(raw_packet.remaining());

        Ok(TransportLayerCc {
            sender_ssrc,
            media_ssrc,
            base_sequence_number,
            packet_status_count,
            reference_time,
            fb_pkt_count,
            packet_chunks,
            recv_deltas,
        })
    }
}
