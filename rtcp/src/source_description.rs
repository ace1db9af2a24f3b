#[cfg(test)]
mod source_description_test {
    use util::marshal::{Marshal, Unmarshal};

    use super::*;

    #[test]
    fn test_sdes_cname_roundtrip() {
        let sdes = SourceDescription {
            chunks: vec![SourceDescriptionChunk {
                source: 0x902f9e2e,
                items: vec![SourceDescriptionItem {
                    sdes_type: SdesType::SdesCname,
                    text: "endpoint@rtcx".to_owned(),
                }],
            }],
        };
        let raw = sdes.marshal().unwrap();
        let mut buf = &raw[..];
        let decoded = SourceDescription::unmarshal(&mut buf).unwrap();
        assert_eq!(decoded, sdes);
    }

    #[test]
    fn test_sdes_multiple_chunks() {
        let sdes = SourceDescription {
            chunks: vec![
                SourceDescriptionChunk {
                    source: 1,
                    items: vec![SourceDescriptionItem {
                        sdes_type: SdesType::SdesCname,
                        text: "a".to_owned(),
                    }],
                },
                SourceDescriptionChunk {
                    source: 2,
                    items: vec![SourceDescriptionItem {
                        sdes_type: SdesType::SdesCname,
                        text: "bb".to_owned(),
                    }],
                },
            ],
        };
        let raw = sdes.marshal().unwrap();
        let mut buf = &raw[..];
        assert_eq!(SourceDescription::unmarshal(&mut buf).unwrap(), sdes);
    }
}

use std::any::Any;
use std::fmt;

use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;
use crate::util::get_padding_size;

pub const SDES_SOURCE_LEN: usize = 4;
pub const SDES_TYPE_LEN: usize = 1;
pub const SDES_OCTET_COUNT_LEN: usize = 1;
pub const SDES_MAX_OCTET_COUNT_ITEM: usize = (1 << 8) - 1;
pub const SDES_TEXT_OFFSET: usize = 2;

// SdesType identifies one SDES item (RFC 3550 §6.5).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SdesType {
    #[default]
    SdesEnd = 0,
    SdesCname = 1,
    SdesName = 2,
    SdesEmail = 3,
    SdesPhone = 4,
    SdesLocation = 5,
    SdesTool = 6,
    SdesNote = 7,
    SdesPrivate = 8,
}

impl From<u8> for SdesType {
    fn from(b: u8) -> Self {
        match b {
            1 => SdesType::SdesCname,
            2 => SdesType::SdesName,
            3 => SdesType::SdesEmail,
            4 => SdesType::SdesPhone,
            5 => SdesType::SdesLocation,
            6 => SdesType::SdesTool,
            7 => SdesType::SdesNote,
            8 => SdesType::SdesPrivate,
            _ => SdesType::SdesEnd,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct SourceDescriptionItem {
    pub sdes_type: SdesType,
    pub text: String,
}

impl SourceDescriptionItem {
    fn length(&self) -> usize {
        SDES_TYPE_LEN + SDES_OCTET_COUNT_LEN + self.text.len()
    }
}

// SourceDescriptionChunk is one SSRC with its items.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct SourceDescriptionChunk {
    pub source: u32,
    pub items: Vec<SourceDescriptionItem>,
}

impl SourceDescriptionChunk {
    // length includes the null terminator and padding to a word boundary.
    fn length(&self) -> usize {
        let mut len = SDES_SOURCE_LEN;
        for item in &self.items {
            len += item.length();
        }
        len += 1; // null terminator
        len + get_padding_size(len)
    }
}

// SourceDescription is an RTCP SDES packet carrying at least the CNAME of
// each active source.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct SourceDescription {
    pub chunks: Vec<SourceDescriptionChunk>,
}

impl SourceDescription {
    // cname builds the canonical single-chunk SDES every compound report
    // is required to carry.
    pub fn cname(ssrc: u32, cname: &str) -> Self {
        SourceDescription {
            chunks: vec![SourceDescriptionChunk {
                source: ssrc,
                items: vec![SourceDescriptionItem {
                    sdes_type: SdesType::SdesCname,
                    text: cname.to_owned(),
                }],
            }],
        }
    }
}

impl fmt::Display for SourceDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = "Source Descriptions:\n".to_string();
        for c in &self.chunks {
            out += format!("\t{:x}\n", c.source).as_str();
            for it in &c.items {
                out += format!("\t\t{:?}:{}\n", it.sdes_type, it.text).as_str();
            }
        }
        write!(f, "{out}")
    }
}

impl Packet for SourceDescription {
    fn header(&self) -> Header {
        Header {
            padding: false,
            count: self.chunks.len() as u8,
            packet_type: PacketType::SourceDescription,
            length: ((self.marshal_size() / 4) - 1) as u16,
        }
    }

    fn destination_ssrc(&self) -> Vec<u32> {
        self.chunks.iter().map(|c| c.source).collect()
    }

    fn raw_size(&self) -> usize {
        let mut chunks_length = 0;
        for c in &self.chunks {
            chunks_length += c.length();
        }
        HEADER_LENGTH + chunks_length
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &(dyn Packet + Send + Sync)) -> bool {
        other
            .as_any()
            .downcast_ref::<SourceDescription>()
            .is_some_and(|a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet + Send + Sync> {
        Box::new(self.clone())
    }
}

impl MarshalSize for SourceDescription {
    fn marshal_size(&self) -> usize {
        self.raw_size()
    }
}

impl Marshal for SourceDescription {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        if self.chunks.len() > COUNT_MAX {
            return Err(Error::TooManyReports.into());
        }
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::BufferTooShort.into());
        }

        let h = self.header();
        let n = h.marshal_to(buf)?;
        buf = &mut buf[n..];

        for chunk in &self.chunks {
            buf.put_u32(chunk.source);
            let mut written = SDES_SOURCE_LEN;
            for item in &chunk.items {
                if item.text.len() > SDES_MAX_OCTET_COUNT_ITEM {
                    return Err(Error::SdesTextTooLong.into());
                }
                buf.put_u8(item.sdes_type as u8);
                buf.put_u8(item.text.len() as u8);
                buf.put_slice(item.text.as_bytes());
                written += item.length();
            }
            // Null terminator plus padding to the next 32-bit boundary.
            buf.put_u8(SdesType::SdesEnd as u8);
            written += 1;
            for _ in 0..get_padding_size(written) {
                buf.put_u8(0);
            }
        }

        Ok(self.marshal_size())
    }
}

impl Unmarshal for SourceDescription {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        if raw_packet.remaining() < HEADER_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::SourceDescription {
            return Err(Error::WrongType.into());
        }

        let mut chunks = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            if raw_packet.remaining() < SDES_SOURCE_LEN {
                return Err(Error::PacketTooShort.into());
            }
            let source = raw_packet.get_u32();
            let mut items = vec![];
            let mut consumed = SDES_SOURCE_LEN;
            loop {
                if raw_packet.remaining() < 1 {
                    return Err(Error::PacketMissingNullTermination.into());
                }
                let sdes_type = SdesType::from(raw_packet.get_u8());
                consumed += 1;
                if sdes_type == SdesType::SdesEnd {
                    // Swallow the chunk padding.
                    let pad = get_padding_size(consumed);
                    if raw_packet.remaining() < pad {
                        return Err(Error::PacketTooShort.into());
                    }
                    raw_packet.advance(pad);
                    break;
                }
                if raw_packet.remaining() < 1 {
                    return Err(Error::PacketTooShort.into());
                }
                let octet_count = raw_packet.get_u8() as usize;
                consumed += 1;
                if raw_packet.remaining() < octet_count {
                    return Err(Error::PacketTooShort.into());
                }
                let text = raw_packet.copy_to_bytes(octet_count);
                consumed += octet_count;
                items.push(SourceDescriptionItem {
                    sdes_type,
                    text: String::from_utf8_lossy(&text).to_string(),
                });
            }
            chunks.push(SourceDescriptionChunk { source, items });
        }

        Ok(SourceDescription { chunks })
    }
}
