#[cfg(test)]
mod header_test;

use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::{Error, Result};

pub const HEADER_LENGTH: usize = 4;
pub const VERSION_SHIFT: u8 = 6;
pub const VERSION_MASK: u8 = 0x3;
pub const PADDING_SHIFT: u8 = 5;
pub const PADDING_MASK: u8 = 0x1;
pub const EXTENSION_SHIFT: u8 = 4;
pub const EXTENSION_MASK: u8 = 0x1;
pub const EXTENSION_PROFILE_ONE_BYTE: u16 = 0xBEDE;
pub const EXTENSION_PROFILE_TWO_BYTE: u16 = 0x1000;
pub const EXTENSION_ID_RESERVED: u8 = 0xF;
pub const CC_MASK: u8 = 0xF;
pub const MARKER_SHIFT: u8 = 7;
pub const MARKER_MASK: u8 = 0x1;
pub const PT_MASK: u8 = 0x7F;
pub const SEQ_NUM_OFFSET: usize = 2;
pub const SEQ_NUM_LENGTH: usize = 2;
pub const TIMESTAMP_OFFSET: usize = 4;
pub const TIMESTAMP_LENGTH: usize = 4;
pub const SSRC_OFFSET: usize = 8;
pub const SSRC_LENGTH: usize = 4;
pub const CSRC_OFFSET: usize = 12;
pub const CSRC_LENGTH: usize = 4;

// One RFC 8285 header extension element.
#[derive(Debug, Eq, PartialEq, Default, Clone)]
pub struct Extension {
    pub id: u8,
    pub payload: Vec<u8>,
}

// Header is an RTP packet header (RFC 3550 §5.1) with optional RFC 8285
// one- or two-byte general extensions.
#[derive(Debug, Eq, PartialEq, Default, Clone)]
pub struct Header {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    pub extension_profile: u16,
    pub extensions: Vec<Extension>,
}

impl Header {
    fn extension_payload_len(&self) -> usize {
        let mut len = 0;
        match self.extension_profile {
            EXTENSION_PROFILE_ONE_BYTE => {
                for extension in &self.extensions {
                    len += 1 + extension.payload.len();
                }
            }
            EXTENSION_PROFILE_TWO_BYTE => {
                for extension in &self.extensions {
                    len += 2 + extension.payload.len();
                }
            }
            _ => {
                for extension in &self.extensions {
                    len += extension.payload.len();
                }
            }
        }
        len
    }

    // set_extension sets an RTP header extension, enabling the extension
    // bit and picking a profile if none was set yet.
    pub fn set_extension(&mut self, id: u8, payload: &[u8]) -> Result<()> {
        if self.extension {
            match self.extension_profile {
                EXTENSION_PROFILE_ONE_BYTE => {
                    if !(1..=14).contains(&id) {
                        return Err(Error::ErrRfc8285oneByteHeaderIdRange);
                    }
                    if payload.len() > 16 {
                        return Err(Error::ErrRfc8285oneByteHeaderSize);
                    }
                }
                EXTENSION_PROFILE_TWO_BYTE => {
                    if id < 1 {
                        return Err(Error::ErrRfc8285twoByteHeaderIdRange);
                    }
                    if payload.len() > 255 {
                        return Err(Error::ErrRfc8285twoByteHeaderSize);
                    }
                }
                _ => {
                    if id != 0 {
                        return Err(Error::ErrRfc3550headerIdRange);
                    }
                }
            }

            for extension in &mut self.extensions {
                if extension.id == id {
                    extension.payload = payload.to_vec();
                    return Ok(());
                }
            }
            self.extensions.push(Extension {
                id,
                payload: payload.to_vec(),
            });
            return Ok(());
        }

        // No extensions yet: default to the one-byte profile, falling back
        // to two-byte when the payload does not fit.
        self.extension = true;
        self.extension_profile = if (1..=14).contains(&id) && payload.len() <= 16 {
            EXTENSION_PROFILE_ONE_BYTE
        } else {
            EXTENSION_PROFILE_TWO_BYTE
        };
        self.extensions.push(Extension {
            id,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    pub fn get_extension(&self, id: u8) -> Option<&[u8]> {
        if !self.extension {
            return None;
        }
        self.extensions
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.payload.as_slice())
    }

    pub fn get_extension_ids(&self) -> Vec<u8> {
        self.extensions.iter().map(|e| e.id).collect()
    }

    pub fn del_extension(&mut self, id: u8) -> Result<()> {
        if !self.extension {
            return Err(Error::ErrHeaderExtensionsNotEnabled);
        }
        match self.extensions.iter().position(|e| e.id == id) {
            Some(index) => {
                self.extensions.remove(index);
                Ok(())
            }
            None => Err(Error::ErrHeaderExtensionNotFound),
        }
    }
}

impl MarshalSize for Header {
    // marshal_size returns the header length on the wire including any
    // extension words; this is also the AAD length for AEAD SRTP.
    fn marshal_size(&self) -> usize {
        let mut size = 12 + (self.csrc.len() * CSRC_LENGTH);
        if self.extension {
            let payload_len = self.extension_payload_len();
            size += 4 + ((payload_len + 3) / 4) * 4;
        }
        size
    }
}

impl Unmarshal for Header {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        if raw_packet.remaining() < 12 {
            return Err(Error::ErrHeaderSizeInsufficient.into());
        }

        let b0 = raw_packet.get_u8();
        let version = b0 >> VERSION_SHIFT & VERSION_MASK;
        let padding = (b0 >> PADDING_SHIFT & PADDING_MASK) > 0;
        let extension = (b0 >> EXTENSION_SHIFT & EXTENSION_MASK) > 0;
        let cc = (b0 & CC_MASK) as usize;

        let b1 = raw_packet.get_u8();
        let marker = (b1 >> MARKER_SHIFT & MARKER_MASK) > 0;
        let payload_type = b1 & PT_MASK;

        let sequence_number = raw_packet.get_u16();
        let timestamp = raw_packet.get_u32();
        let ssrc = raw_packet.get_u32();

        if raw_packet.remaining() < cc * CSRC_LENGTH {
            return Err(Error::ErrHeaderSizeInsufficient.into());
        }
        let mut csrc = Vec::with_capacity(cc);
        for _ in 0..cc {
            csrc.push(raw_packet.get_u32());
        }

        let (extension_profile, extensions) = if extension {
            if raw_packet.remaining() < 4 {
                return Err(Error::ErrHeaderSizeInsufficientForExtension.into());
            }
            let extension_profile = raw_packet.get_u16();
            let extension_length = raw_packet.get_u16() as usize * 4;
            if raw_packet.remaining() < extension_length {
                return Err(Error::ErrHeaderSizeInsufficientForExtension.into());
            }

            let mut extensions = vec![];
            match extension_profile {
                EXTENSION_PROFILE_ONE_BYTE => {
                    let mut remaining = extension_length;
                    while remaining > 0 {
                        let b = raw_packet.get_u8();
                        remaining -= 1;
                        if b == 0x00 {
                            // padding
                            continue;
                        }
                        let ext_id = b >> 4;
                        let len = ((b & 0x0F) + 1) as usize;
                        if ext_id == EXTENSION_ID_RESERVED {
                            break;
                        }
                        if remaining < len {
                            return Err(Error::ErrHeaderSizeInsufficientForExtension.into());
                        }
                        let mut payload = vec![0u8; len];
                        raw_packet.copy_to_slice(&mut payload);
                        remaining -= len;
                        extensions.push(Extension {
                            id: ext_id,
                            payload,
                        });
                    }
                }
                EXTENSION_PROFILE_TWO_BYTE => {
                    let mut remaining = extension_length;
                    while remaining > 0 {
                        let b = raw_packet.get_u8();
                        remaining -= 1;
                        if b == 0x00 {
                            continue;
                        }
                        let ext_id = b;
                        if remaining < 1 {
                            return Err(Error::ErrHeaderSizeInsufficientForExtension.into());
                        }
                        let len = raw_packet.get_u8() as usize;
                        remaining -= 1;
                        if remaining < len {
                            return Err(Error::ErrHeaderSizeInsufficientForExtension.into());
                        }
                        let mut payload = vec![0u8; len];
                        raw_packet.copy_to_slice(&mut payload);
                        remaining -= len;
                        extensions.push(Extension {
                            id: ext_id,
                            payload,
                        });
                    }
                }
                _ => {
                    // RFC 3550 profile-specific extension, opaque payload.
                    let mut payload = vec![0u8; extension_length];
                    raw_packet.copy_to_slice(&mut payload);
                    extensions.push(Extension { id: 0, payload });
                }
            }
            (extension_profile, extensions)
        } else {
            (0, vec![])
        };

        Ok(Header {
            version,
            padding,
            extension,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
            extension_profile,
            extensions,
        })
    }
}

impl Marshal for Header {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        let size = self.marshal_size();
        if buf.remaining_mut() < size {
            return Err(util::Error::ErrBufferShort);
        }

        let mut b0 = (self.version << VERSION_SHIFT) | self.csrc.len() as u8;
        if self.padding {
            b0 |= 1 << PADDING_SHIFT;
        }
        if self.extension {
            b0 |= 1 << EXTENSION_SHIFT;
        }
        buf.put_u8(b0);

        let mut b1 = self.payload_type;
        if self.marker {
            b1 |= 1 << MARKER_SHIFT;
        }
        buf.put_u8(b1);

        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        for csrc in &self.csrc {
            buf.put_u32(*csrc);
        }

        if self.extension {
            let payload_len = self.extension_payload_len();
            let padded_len = ((payload_len + 3) / 4) * 4;

            buf.put_u16(self.extension_profile);
            buf.put_u16((padded_len / 4) as u16);

            match self.extension_profile {
                EXTENSION_PROFILE_ONE_BYTE => {
                    for extension in &self.extensions {
                        buf.put_u8(extension.id << 4 | (extension.payload.len() as u8 - 1));
                        buf.put_slice(&extension.payload);
                    }
                }
                EXTENSION_PROFILE_TWO_BYTE => {
                    for extension in &self.extensions {
                        buf.put_u8(extension.id);
                        buf.put_u8(extension.payload.len() as u8);
                        buf.put_slice(&extension.payload);
                    }
                }
                _ => {
                    for extension in &self.extensions {
                        buf.put_slice(&extension.payload);
                    }
                }
            }
            for _ in payload_len..padded_len {
                buf.put_u8(0);
            }
        }

        Ok(size)
    }
}
