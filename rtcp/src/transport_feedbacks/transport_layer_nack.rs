#[cfg(test)]
mod transport_layer_nack_test {
    use util::marshal::{Marshal, Unmarshal};

    use super::*;

    #[test]
    fn test_nack_pair_packet_list() {
        let pair = NackPair {
            packet_id: 42,
            lost_packets: 0b1010,
        };
        assert_eq!(pair.packet_list(), vec![42, 44, 46]);
    }

    #[test]
    fn test_nack_pairs_grouping() {
        // Consecutive gaps collapse into one PID/BLP pair, distant
        // losses start a new pair.
        let pairs = nack_pairs_from_sequence_numbers(&[105, 106, 107, 150]);
        assert_eq!(
            pairs,
            vec![
                NackPair {
                    packet_id: 105,
                    lost_packets: 0b11,
                },
                NackPair {
                    packet_id: 150,
                    lost_packets: 0,
                },
            ]
        );
    }

    #[test]
    fn test_nack_pairs_every_seq_once() {
        let seqs: Vec<u16> = vec![1, 2, 3, 20, 21, 40, 58];
        let pairs = nack_pairs_from_sequence_numbers(&seqs);
        let mut recovered: Vec<u16> = pairs.iter().flat_map(|p| p.packet_list()).collect();
        recovered.sort_unstable();
        assert_eq!(recovered, seqs);
    }

    #[test]
    fn test_nack_roundtrip() {
        let nack = TransportLayerNack {
            sender_ssrc: 0x902f9e2e,
            media_ssrc: 0x902f9e2e,
            nacks: vec![NackPair {
                packet_id: 0xaaa,
                lost_packets: 0x5555,
            }],
        };
        let raw = nack.marshal().unwrap();
        assert_eq!(raw[0] & 0x1F, 1);
        assert_eq!(raw[1], 205);
        let mut buf = &raw[..];
        assert_eq!(TransportLayerNack::unmarshal(&mut buf).unwrap(), nack);
    }
}

use std::any::Any;
use std::fmt;

use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;

// NackPair is a generic NACK FCI field: the earliest lost packet id and a
// bitmask of the 16 following sequence numbers (RFC 4585 §6.2.1).
#[derive(Debug, PartialEq, Eq, Default, Clone, Copy)]
pub struct NackPair {
    pub packet_id: u16,
    pub lost_packets: u16,
}

impl NackPair {
    // packet_list expands the pair into every sequence number it names.
    pub fn packet_list(&self) -> Vec<u16> {
        let mut out = vec![self.packet_id];
        let mut b = self.lost_packets;
        let mut i = 0u16;
        while b != 0 {
            if b & 1 != 0 {
                out.push(self.packet_id.wrapping_add(i + 1));
            }
            b >>= 1;
            i += 1;
        }
        out
    }

    pub fn range<F>(&self, f: F)
    where
        F: Fn(u16) -> bool,
    {
        for seq in self.packet_list() {
            if !f(seq) {
                return;
            }
        }
    }
}

// nack_pairs_from_sequence_numbers packs sorted sequence numbers into the
// minimal set of PID/BLP pairs. Every input appears in exactly one pair.
pub fn nack_pairs_from_sequence_numbers(seqs: &[u16]) -> Vec<NackPair> {
    if seqs.is_empty() {
        return vec![];
    }

    let mut pairs = vec![];
    let mut pair = NackPair {
        packet_id: seqs[0],
        lost_packets: 0,
    };
    for &seq in &seqs[1..] {
        let diff = seq.wrapping_sub(pair.packet_id);
        if diff > 0 && diff <= 16 {
            pair.lost_packets |= 1 << (diff - 1);
        } else {
            pairs.push(pair);
            pair = NackPair {
                packet_id: seq,
                lost_packets: 0,
            };
        }
    }
    pairs.push(pair);
    pairs
}

const TLN_LENGTH: usize = 2; // 32-bit words past the header for the SSRCs
const NACK_OFFSET: usize = 8;

// TransportLayerNack is a generic NACK feedback message.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct TransportLayerNack {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    pub nacks: Vec<NackPair>,
}

impl fmt::Display for TransportLayerNack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = format!("TransportLayerNack from {:x}\n", self.sender_ssrc);
        out += format!("\tMedia Ssrc {:x}\n", self.media_ssrc).as_str();
        out += "\tID\tLostPackets\n";
        for nack in &self.nacks {
            out += format!("\t{}\t{:b}\n", nack.packet_id, nack.lost_packets).as_str();
        }
        write!(f, "{out}")
    }
}

impl Packet for TransportLayerNack {
    fn header(&self) -> Header {
        Header {
            padding: false,
            count: FORMAT_TLN,
            packet_type: PacketType::TransportSpecificFeedback,
            length: ((self.marshal_size() / 4) - 1) as u16,
        }
    }

    fn destination_ssrc(&self) -> Vec<u32> {
        vec![self.media_ssrc]
    }

    fn raw_size(&self) -> usize {
        HEADER_LENGTH + NACK_OFFSET + self.nacks.len() * 4
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &(dyn Packet + Send + Sync)) -> bool {
        other
            .as_any()
            .downcast_ref::<TransportLayerNack>()
            .is_some_and(|a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet + Send + Sync> {
        Box::new(self.clone())
    }
}

impl MarshalSize for TransportLayerNack {
    fn marshal_size(&self) -> usize {
        self.raw_size()
    }
}

impl Marshal for TransportLayerNack {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::BufferTooShort.into());
        }

        let h = self.header();
        let n = h.marshal_to(buf)?;
        buf = &mut buf[n..];

        buf.put_u32(self.sender_ssrc);
        buf.put_u32(self.media_ssrc);

        for nack in &self.nacks {
            buf.put_u16(nack.packet_id);
            buf.put_u16(nack.lost_packets);
        }

        Ok(self.marshal_size())
    }
}

impl Unmarshal for TransportLayerNack {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        if raw_packet.remaining() < HEADER_LENGTH + NACK_OFFSET {
            return Err(Error::PacketTooShort.into());
        }

        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::TransportSpecificFeedback
            || header.count != FORMAT_TLN
        {
            return Err(Error::WrongType.into());
        }

        let sender_ssrc = raw_packet.get_u32();
        let media_ssrc = raw_packet.get_u32();

        let mut nacks = vec![];
        while raw_packet.remaining() >= 4 {
            nacks.push(NackPair {
                packet_id: raw_packet.get_u16(),
                lost_packets: raw_packet.get_u16(),
            });
        }

        Ok(TransportLayerNack {
            sender_ssrc,
            media_ssrc,
            nacks,
        })
    }
}
