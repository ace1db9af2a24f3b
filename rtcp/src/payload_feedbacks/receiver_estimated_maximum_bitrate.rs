#[cfg(test)]
mod receiver_estimated_maximum_bitrate_test {
    use util::marshal::{Marshal, Unmarshal};

    use super::*;

    #[test]
    fn test_remb_roundtrip() {
        let remb = ReceiverEstimatedMaximumBitrate {
            sender_ssrc: 1,
            bitrate: 8927168.0,
            ssrcs: vec![0x2428af3a],
        };
        let raw = remb.marshal().unwrap();
        let mut buf = &raw[..];
        let decoded = ReceiverEstimatedMaximumBitrate::unmarshal(&mut buf).unwrap();
        assert_eq!(decoded.ssrcs, remb.ssrcs);
        let delta = (decoded.bitrate - remb.bitrate).abs();
        assert!(delta < remb.bitrate / 1000.0, "bitrate within mantissa precision");
    }
}

use std::any::Any;
use std::fmt;

use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;

const REMB_IDENTIFIER: [u8; 4] = *b"REMB";

// ReceiverEstimatedMaximumBitrate is the Google REMB feedback message
// (draft-alvestrand-rmcat-remb). Browsers still emit it alongside TWCC,
// so it is parsed and surfaced in stats.
#[derive(Debug, PartialEq, Default, Clone)]
pub struct ReceiverEstimatedMaximumBitrate {
    pub sender_ssrc: u32,
    // Estimated bitrate in bits per second.
    pub bitrate: f32,
    pub ssrcs: Vec<u32>,
}

impl fmt::Display for ReceiverEstimatedMaximumBitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReceiverEstimatedMaximumBitrate {:x} {}bps",
            self.sender_ssrc, self.bitrate
        )
    }
}

impl Packet for ReceiverEstimatedMaximumBitrate {
    fn header(&self) -> Header {
        Header {
            padding: false,
            count: FORMAT_REMB,
            packet_type: PacketType::PayloadSpecificFeedback,
            length: ((self.marshal_size() / 4) - 1) as u16,
        }
    }

    fn destination_ssrc(&self) -> Vec<u32> {
        self.ssrcs.clone()
    }

    fn raw_size(&self) -> usize {
        HEADER_LENGTH + 8 + 4 + 4 + self.ssrcs.len() * 4
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &(dyn Packet + Send + Sync)) -> bool {
        other
            .as_any()
            .downcast_ref::<ReceiverEstimatedMaximumBitrate>()
            .is_some_and(|a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet + Send + Sync> {
        Box::new(self.clone())
    }
}

impl MarshalSize for ReceiverEstimatedMaximumBitrate {
    fn marshal_size(&self) -> usize {
        self.raw_size()
    }
}

impl Marshal for ReceiverEstimatedMaximumBitrate {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::BufferTooShort.into());
        }

        let h = self.header();
        let n = h.marshal_to(buf)?;
        buf = &mut buf[n..];

        buf.put_u32(self.sender_ssrc);
        buf.put_u32(0); // media SSRC is always 0 for REMB

        buf.put_slice(&REMB_IDENTIFIER);

        // Bitrate as 6-bit exponent and 18-bit mantissa.
        let mut exp = 0u32;
        let mut mantissa = self.bitrate.max(0.0) as u64;
        while mantissa >= (1 << 18) {
            mantissa >>= 1;
            exp += 1;
        }
        if exp > 63 {
            exp = 63;
            mantissa = (1 << 18) - 1;
        }

        buf.put_u8(self.ssrcs.len() as u8);
        buf.put_u8(((exp << 2) | ((mantissa >> 16) as u32 & 0x03)) as u8);
        buf.put_u8((mantissa >> 8) as u8);
        buf.put_u8(mantissa as u8);

        for ssrc in &self.ssrcs {
            buf.put_u32(*ssrc);
        }

        Ok(self.marshal_size())
    }
}

impl Unmarshal for ReceiverEstimatedMaximumBitrate {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        if raw_packet.remaining() < HEADER_LENGTH + 16 {
            return Err(Error::PacketTooShort.into());
        }

        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::PayloadSpecificFeedback
            || header.count != FORMAT_REMB
        {
            return Err(Error::WrongType.into());
        }

        let sender_ssrc = raw_packet.get_u32();
        let _media_ssrc = raw_packet.get_u32();

        let mut identifier = [0u8; 4];
        raw_packet.copy_to_slice(&mut identifier);
        if identifier != REMB_IDENTIFIER {
            return Err(Error::WrongType.into());
        }

        let num_ssrcs = raw_packet.get_u8() as usize;
        let b = raw_packet.get_u8();
        let exp = (b >> 2) as u32;
        let mantissa = (((b & 0x03) as u64) << 16)
            | ((raw_packet.get_u8() as u64) << 8)
            | raw_packet.get_u8() as u64;
        let bitrate = if exp > 46 {
            f32::MAX
        } else {
            (mantissa << exp) as f32
        };

        if raw_packet.remaining() < num_ssrcs * 4 {
            return Err(Error::PacketTooShort.into());
        }
        let mut ssrcs = Vec::with_capacity(num_ssrcs);
        for _ in 0..num_ssrcs {
            ssrcs.push(raw_packet.get_u32());
        }

        Ok(ReceiverEstimatedMaximumBitrate {
            sender_ssrc,
            bitrate,
            ssrcs,
        })
    }
}
