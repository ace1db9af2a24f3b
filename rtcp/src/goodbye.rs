#[cfg(test)]
mod goodbye_test {
    use bytes::Bytes;
    use util::marshal::{Marshal, Unmarshal};

    use super::*;

    #[test]
    fn test_goodbye_roundtrip() {
        let bye = Goodbye {
            sources: vec![0x902f9e2e, 0xbc5e9a40],
            reason: Bytes::from_static(b"shutting down"),
        };
        let raw = bye.marshal().unwrap();
        let mut buf = &raw[..];
        assert_eq!(Goodbye::unmarshal(&mut buf).unwrap(), bye);
    }

    #[test]
    fn test_goodbye_no_reason() {
        let bye = Goodbye {
            sources: vec![1],
            reason: Bytes::new(),
        };
        let raw = bye.marshal().unwrap();
        assert_eq!(raw.len(), 8);
        let mut buf = &raw[..];
        assert_eq!(Goodbye::unmarshal(&mut buf).unwrap(), bye);
    }
}

use std::any::Any;
use std::fmt;

use bytes::{Buf, BufMut, Bytes};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;
use crate::util::get_padding_size;

// Goodbye is an RTCP BYE packet (RFC 3550 §6.6).
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct Goodbye {
    pub sources: Vec<u32>,
    pub reason: Bytes,
}

impl fmt::Display for Goodbye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Goodbye: sources={:?} reason={:?}", self.sources, self.reason)
    }
}

impl Packet for Goodbye {
    fn header(&self) -> Header {
        Header {
            padding: false,
            count: self.sources.len() as u8,
            packet_type: PacketType::Goodbye,
            length: ((self.marshal_size() / 4) - 1) as u16,
        }
    }

    fn destination_ssrc(&self) -> Vec<u32> {
        self.sources.clone()
    }

    fn raw_size(&self) -> usize {
        let srcs_length = self.sources.len() * SSRC_LENGTH;
        let mut reason_length = 0;
        if !self.reason.is_empty() {
            reason_length = 1 + self.reason.len();
        }
        HEADER_LENGTH + srcs_length + reason_length
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &(dyn Packet + Send + Sync)) -> bool {
        other
            .as_any()
            .downcast_ref::<Goodbye>()
            .is_some_and(|a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet + Send + Sync> {
        Box::new(self.clone())
    }
}

impl MarshalSize for Goodbye {
    fn marshal_size(&self) -> usize {
        let l = self.raw_size();
        l + get_padding_size(l)
    }
}

impl Marshal for Goodbye {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        if self.sources.len() > COUNT_MAX {
            return Err(Error::TooManyReports.into());
        }
        if self.reason.len() > SDES_MAX_OCTET_COUNT {
            return Err(Error::ReasonTooLong.into());
        }
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::BufferTooShort.into());
        }

        let h = self.header();
        let n = h.marshal_to(buf)?;
        buf = &mut buf[n..];

        for source in &self.sources {
            buf.put_u32(*source);
        }

        if !self.reason.is_empty() {
            buf.put_u8(self.reason.len() as u8);
            buf.put_slice(&self.reason);
            let written = self.raw_size();
            for _ in 0..get_padding_size(written) {
                buf.put_u8(0);
            }
        }

        Ok(self.marshal_size())
    }
}

impl Unmarshal for Goodbye {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        if raw_packet.remaining() < HEADER_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::Goodbye {
            return Err(Error::WrongType.into());
        }

        if raw_packet.remaining() < header.count as usize * SSRC_LENGTH {
            return Err(Error::PacketTooShort.into());
        }
        let mut sources = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            sources.push(raw_packet.get_u32());
        }

        let reason = if raw_packet.has_remaining() {
            let reason_len = raw_packet.get_u8() as usize;
            if raw_packet.remaining() < reason_len {
                return Err(Error::PacketTooShort.into());
            }
            raw_packet.copy_to_bytes(reason_len)
        } else {
            Bytes::new()
        };
        // Discard any padding that trails the reason.
        raw_packet.advance(raw_packet.remaining());

        Ok(Goodbye { sources, reason })
    }
}
