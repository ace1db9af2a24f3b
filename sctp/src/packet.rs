#[cfg(test)]
mod packet_test {
    use super::*;
    use crate::chunk::*;

    #[test]
    fn test_packet_roundtrip() {
        let packet = Packet {
            source_port: 5000,
            destination_port: 5000,
            verification_tag: 0x11223344,
            chunks: vec![Chunk::PayloadData(ChunkPayloadData {
                beginning_fragment: true,
                ending_fragment: true,
                tsn: 42,
                stream_identifier: 1,
                stream_sequence_number: 0,
                payload_type: PayloadProtocolIdentifier::Binary,
                user_data: Bytes::from_static(&[0xDE, 0xAD]),
                ..Default::default()
            })],
        };
        let raw = packet.marshal().unwrap();
        let decoded = Packet::unmarshal(&raw).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_packet_bad_checksum_rejected() {
        let packet = Packet {
            source_port: 5000,
            destination_port: 5000,
            verification_tag: 1,
            chunks: vec![Chunk::CookieAck(ChunkCookieAck {})],
        };
        let mut raw = BytesMut::from(&packet.marshal().unwrap()[..]);
        raw[9] ^= 0xFF;
        assert_eq!(
            Packet::unmarshal(&raw.freeze()),
            Err(Error::ErrChecksumMismatch)
        );
    }

    #[test]
    fn test_packet_too_small() {
        assert_eq!(
            Packet::unmarshal(&Bytes::from_static(&[0u8; 8])),
            Err(Error::ErrPacketRawTooSmall)
        );
    }

    #[test]
    fn test_packet_multiple_chunks() {
        let packet = Packet {
            source_port: 5000,
            destination_port: 5000,
            verification_tag: 9,
            chunks: vec![
                Chunk::Sack(ChunkSelectiveAck {
                    cumulative_tsn_ack: 100,
                    advertised_receiver_window_credit: 65536,
                    gap_ack_blocks: vec![GapAckBlock { start: 2, end: 3 }],
                    duplicate_tsn: vec![],
                }),
                Chunk::CookieAck(ChunkCookieAck {}),
            ],
        };
        let raw = packet.marshal().unwrap();
        let decoded = Packet::unmarshal(&raw).unwrap();
        assert_eq!(decoded.chunks.len(), 2);
        assert_eq!(decoded, packet);
    }
}

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_32_ISCSI};

use crate::chunk::Chunk;
use crate::error::{Error, Result};

pub(crate) const PACKET_HEADER_SIZE: usize = 12;

// Packet is one SCTP packet: the common header (RFC 4960 §3.1) followed
// by chunks. The checksum is CRC-32C with the checksum field zeroed.
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Source Port Number        |     Destination Port Number   |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                      Verification Tag                         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                           Checksum                            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packet {
    pub source_port: u16,
    pub destination_port: u16,
    pub verification_tag: u32,
    pub chunks: Vec<Chunk>,
}

impl Packet {
    pub fn unmarshal(raw: &Bytes) -> Result<Self> {
        if raw.len() < PACKET_HEADER_SIZE {
            return Err(Error::ErrPacketRawTooSmall);
        }

        let mut buf = &raw[..];
        let source_port = buf.get_u16();
        let destination_port = buf.get_u16();
        let verification_tag = buf.get_u32();
        let their_checksum = buf.get_u32_le();

        let mut zeroed = BytesMut::from(&raw[..]);
        zeroed[8] = 0;
        zeroed[9] = 0;
        zeroed[10] = 0;
        zeroed[11] = 0;
        let our_checksum = Crc::<u32>::new(&CRC_32_ISCSI).checksum(&zeroed);
        if their_checksum != our_checksum {
            return Err(Error::ErrChecksumMismatch);
        }

        let mut chunks = vec![];
        let mut offset = PACKET_HEADER_SIZE;
        while offset + 4 <= raw.len() {
            let remaining = raw.slice(offset..);
            let (chunk, consumed) = Chunk::unmarshal(&remaining)?;
            chunks.push(chunk);
            if consumed == 0 {
                break;
            }
            offset += consumed;
        }

        Ok(Packet {
            source_port,
            destination_port,
            verification_tag,
            chunks,
        })
    }

    pub fn marshal(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(PACKET_HEADER_SIZE + 1500);
        buf.put_u16(self.source_port);
        buf.put_u16(self.destination_port);
        buf.put_u32(self.verification_tag);
        // Checksum placeholder, filled in after the chunks.
        buf.put_u32(0);

        for chunk in &self.chunks {
            chunk.marshal_to(&mut buf);
        }

        let checksum = Crc::<u32>::new(&CRC_32_ISCSI).checksum(&buf);
        buf[8..12].copy_from_slice(&checksum.to_le_bytes());

        Ok(buf.freeze())
    }
}
