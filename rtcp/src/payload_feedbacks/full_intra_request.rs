#[cfg(test)]
mod full_intra_request_test {
    use util::marshal::{Marshal, Unmarshal};

    use super::*;

    #[test]
    fn test_fir_roundtrip() {
        let fir = FullIntraRequest {
            sender_ssrc: 0x0,
            media_ssrc: 0x4bc4fcb4,
            fir: vec![FirEntry {
                ssrc: 0x12345678,
                sequence_number: 0x42,
            }],
        };
        let raw = fir.marshal().unwrap();
        // FMT=4, PT=206
        assert_eq!(raw[0] & 0x1F, 4);
        assert_eq!(raw[1], 206);

        let mut buf = &raw[..];
        assert_eq!(FullIntraRequest::unmarshal(&mut buf).unwrap(), fir);
    }

    #[test]
    fn test_fir_multiple_entries() {
        let fir = FullIntraRequest {
            sender_ssrc: 1,
            media_ssrc: 2,
            fir: vec![
                FirEntry {
                    ssrc: 3,
                    sequence_number: 10,
                },
                FirEntry {
                    ssrc: 4,
                    sequence_number: 11,
                },
            ],
        };
        let raw = fir.marshal().unwrap();
        let mut buf = &raw[..];
        assert_eq!(FullIntraRequest::unmarshal(&mut buf).unwrap(), fir);
    }
}

use std::any::Any;
use std::fmt;

use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;

// FirEntry is one FCI entry in a FIR: the target SSRC and a command
// sequence number that must increase for each new request to be honored.
#[derive(Debug, PartialEq, Eq, Default, Clone, Copy)]
pub struct FirEntry {
    pub ssrc: u32,
    pub sequence_number: u8,
}

// FullIntraRequest (RFC 5104 §4.3.1) demands a full intra picture, used
// for decoder refresh in situations PLI does not cover.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct FullIntraRequest {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
    pub fir: Vec<FirEntry>,
}

const FIR_OFFSET: usize = 8;

impl fmt::Display for FullIntraRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = format!("FullIntraRequest {:x} {:x}", self.sender_ssrc, self.media_ssrc);
        for e in &self.fir {
            out += format!(" ({:x} {})", e.ssrc, e.sequence_number).as_str();
        }
        write!(f, "{out}")
    }
}

impl Packet for FullIntraRequest {
    fn header(&self) -> Header {
        Header {
            padding: false,
            count: FORMAT_FIR,
            packet_type: PacketType::PayloadSpecificFeedback,
            length: ((self.marshal_size() / 4) - 1) as u16,
        }
    }

    fn destination_ssrc(&self) -> Vec<u32> {
        self.fir.iter().map(|e| e.ssrc).collect()
    }

    fn raw_size(&self) -> usize {
        HEADER_LENGTH + FIR_OFFSET + self.fir.len() * 8
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &(dyn Packet + Send + Sync)) -> bool {
        other
            .as_any()
            .downcast_ref::<FullIntraRequest>()
            .is_some_and(|a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet + Send + Sync> {
        Box::new(self.clone())
    }
}

impl MarshalSize for FullIntraRequest {
    fn marshal_size(&self) -> usize {
        self.raw_size()
    }
}

impl Marshal for FullIntraRequest {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::BufferTooShort.into());
        }

        let h = self.header();
        let n = h.marshal_to(buf)?;
        buf = &mut buf[n..];

        buf.put_u32(self.sender_ssrc);
        buf.put_u32(self.media_ssrc);

        for fir in &self.fir {
            buf.put_u32(fir.ssrc);
            buf.put_u8(fir.sequence_number);
            buf.put_u8(0);
            buf.put_u16(0);
        }

        Ok(self.marshal_size())
    }
}

impl Unmarshal for FullIntraRequest {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        if raw_packet.remaining() < HEADER_LENGTH + FIR_OFFSET {
            return Err(Error::PacketTooShort.into());
        }

        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::PayloadSpecificFeedback || header.count != FORMAT_FIR
        {
            return Err(Error::WrongType.into());
        }

        let sender_ssrc = raw_packet.get_u32();
        let media_ssrc = raw_packet.get_u32();

        let mut fir = vec![];
        while raw_packet.remaining() >= 8 {
            let ssrc = raw_packet.get_u32();
            let sequence_number = raw_packet.get_u8();
            raw_packet.advance(3);
            fir.push(FirEntry {
                ssrc,
                sequence_number,
            });
        }

        Ok(FullIntraRequest {
            sender_ssrc,
            media_ssrc,
            fir,
        })
    }
}
