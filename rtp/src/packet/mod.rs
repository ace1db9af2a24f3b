#[cfg(test)]
mod packet_test;

use std::fmt;

use bytes::{Buf, BufMut, Bytes};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::Header;

// Packet is a parsed RTP packet: header, payload and trailing padding.
#[derive(Debug, Eq, PartialEq, Default, Clone)]
pub struct Packet {
    pub header: Header,
    pub payload: Bytes,
    // Number of trailing padding bytes, including the count byte itself.
    pub padding_size: u8,
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = "RTP PACKET:\n".to_string();
        out += format!("\tVersion: {}\n", self.header.version).as_str();
        out += format!("\tMarker: {}\n", self.header.marker).as_str();
        out += format!("\tPayload Type: {}\n", self.header.payload_type).as_str();
        out += format!("\tSequence Number: {}\n", self.header.sequence_number).as_str();
        out += format!("\tTimestamp: {}\n", self.header.timestamp).as_str();
        out += format!("\tSSRC: {} ({:x})\n", self.header.ssrc, self.header.ssrc).as_str();
        out += format!("\tPayload Length: {}\n", self.payload.len()).as_str();
        write!(f, "{out}")
    }
}

impl MarshalSize for Packet {
    fn marshal_size(&self) -> usize {
        self.header.marshal_size() + self.payload.len() + self.padding_size as usize
    }
}

impl Unmarshal for Packet {
    // unmarshal parses the passed byte slice and stores the result in the
    // Packet. Padding, when flagged, is stripped from the payload and kept
    // as padding_size so marshal round-trips the original bytes.
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        let header = Header::unmarshal(raw_packet)?;
        let payload_len = raw_packet.remaining();
        if header.padding {
            if payload_len == 0 {
                return Err(Error::ErrInvalidRtpPadding.into());
            }
            let payload = raw_packet.copy_to_bytes(payload_len);
            let padding_size = payload[payload_len - 1];
            if padding_size as usize > payload_len {
                return Err(Error::ErrInvalidRtpPadding.into());
            }
            Ok(Packet {
                header,
                payload: payload.slice(..payload_len - padding_size as usize),
                padding_size,
            })
        } else {
            Ok(Packet {
                header,
                payload: raw_packet.copy_to_bytes(payload_len),
                padding_size: 0,
            })
        }
    }
}

impl Marshal for Packet {
    fn marshal_to(&self, buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        let n = self.header.marshal_to(buf)?;
        let mut buf = &mut buf[n..];
        if buf.remaining_mut() < self.payload.len() + self.padding_size as usize {
            return Err(util::Error::ErrBufferShort);
        }
        buf.put_slice(&self.payload);
        if self.header.padding {
            if self.padding_size == 0 {
                return Err(Error::ErrInvalidRtpPadding.into());
            }
            for _ in 0..self.padding_size - 1 {
                buf.put_u8(0);
            }
            buf.put_u8(self.padding_size);
        }
        Ok(n + self.payload.len() + self.padding_size as usize)
    }
}
