#[cfg(test)]
mod av1_test;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::packetizer::{Depacketizer, Payloader};

// Aggregation header bits (RFC 9411 §4.4).
pub const AV1_Z_MASK: u8 = 0x80; // continues an OBU from the previous packet
pub const AV1_Y_MASK: u8 = 0x40; // last OBU continues in the next packet
pub const AV1_W_MASK: u8 = 0x30; // OBU element count, 0 = length-prefixed all
pub const AV1_N_MASK: u8 = 0x08; // first packet of a new coded video sequence

pub const OBU_TYPE_SEQUENCE_HEADER: u8 = 1;
pub const OBU_TYPE_FRAME_HEADER: u8 = 3;
pub const OBU_TYPE_FRAME: u8 = 6;

// leb128 encoding used by the OBU length fields.
pub mod leb128 {
    use super::{Error, Result};

    pub fn encode(mut value: usize) -> Vec<u8> {
        let mut out = vec![];
        loop {
            let mut b = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                b |= 0x80;
            }
            out.push(b);
            if value == 0 {
                return out;
            }
        }
    }

    // decode returns the value and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(usize, usize)> {
        let mut value: usize = 0;
        for (i, &b) in buf.iter().enumerate().take(8) {
            value |= ((b & 0x7F) as usize) << (7 * i);
            if b & 0x80 == 0 {
                return Ok((value, i + 1));
            }
        }
        Err(Error::ErrAv1CorruptedObu)
    }
}

// Av1Payloader splits a temporal unit of OBUs into RTP payloads with
// length-prefixed OBU elements (W=0).
#[derive(Default, Debug, Clone)]
pub struct Av1Payloader {}

impl Payloader for Av1Payloader {
    fn payload(&mut self, mtu: usize, payload: &Bytes) -> Result<Vec<Bytes>> {
        if payload.is_empty() || mtu <= 1 {
            return Ok(vec![]);
        }

        let mut payloads = vec![];
        let mut remaining = &payload[..];
        let mut is_first = true;

        while !remaining.is_empty() {
            let chunk = remaining.len().min(mtu - 1 - 2);
            let mut out = BytesMut::with_capacity(1 + 2 + chunk);
            let mut header = 0u8;
            if !is_first {
                header |= AV1_Z_MASK;
            }
            if chunk < remaining.len() {
                header |= AV1_Y_MASK;
            }
            out.put_u8(header);
            out.put_slice(&leb128::encode(chunk));
            out.put_slice(&remaining[..chunk]);
            payloads.push(out.freeze());
            remaining = &remaining[chunk..];
            is_first = false;
        }

        Ok(payloads)
    }

    fn clone_to(&self) -> Box<dyn Payloader + Send + Sync> {
        Box::new(self.clone())
    }
}

// Av1Packet is a parsed AV1 RTP payload: the aggregation header flags and
// the concatenated OBU elements.
#[derive(PartialEq, Eq, Debug, Default, Clone)]
pub struct Av1Packet {
    pub z: bool,
    pub y: bool,
    pub w: u8,
    pub n: bool,
    pub obu_elements: Vec<Bytes>,

    pub payload: Bytes,
}

impl Depacketizer for Av1Packet {
    fn depacketize(&mut self, packet: &Bytes) -> Result<Bytes> {
        if packet.len() <= 1 {
            return Err(Error::ErrAv1PayloadTooSmall);
        }

        let header = packet[0];
        self.z = header & AV1_Z_MASK != 0;
        self.y = header & AV1_Y_MASK != 0;
        self.w = (header & AV1_W_MASK) >> 4;
        self.n = header & AV1_N_MASK != 0;

        self.obu_elements.clear();
        let mut offset = 1;
        let mut element_index = 0;
        while offset < packet.len() {
            // With W != 0 the last element has no length prefix.
            let is_last = self.w != 0 && element_index == self.w as usize - 1;
            let element = if is_last {
                packet.slice(offset..)
            } else {
                let (length, consumed) = leb128::decode(&packet[offset..])?;
                offset += consumed;
                if offset + length > packet.len() {
                    return Err(Error::ErrAv1CorruptedObu);
                }
                packet.slice(offset..offset + length)
            };
            offset += element.len();
            self.obu_elements.push(element);
            element_index += 1;
        }

        let mut payload = BytesMut::new();
        for e in &self.obu_elements {
            payload.put_slice(e);
        }
        self.payload = payload.freeze();
        Ok(self.payload.clone())
    }

    // is_partition_head is true unless the payload continues an OBU
    // started in the previous packet (Z bit).
    fn is_partition_head(&self, payload: &Bytes) -> bool {
        if payload.is_empty() {
            return false;
        }
        payload[0] & AV1_Z_MASK == 0
    }

    fn is_partition_tail(&self, marker: bool, payload: &Bytes) -> bool {
        if payload.is_empty() {
            return marker;
        }
        // Y clear means the last OBU element ends in this packet.
        marker || payload[0] & AV1_Y_MASK == 0
    }
}

// is_keyframe reports whether the payload starts a new coded video
// sequence (N bit) or carries a sequence header OBU.
pub fn is_keyframe(payload: &[u8]) -> bool {
    if payload.is_empty() {
        return false;
    }
    if payload[0] & AV1_N_MASK != 0 {
        return true;
    }
    // Inspect the first OBU element header.
    let mut offset = 1;
    let w = (payload[0] & AV1_W_MASK) >> 4;
    if w == 0 {
        match leb128::decode(&payload[offset..]) {
            Ok((_, consumed)) => offset += consumed,
            Err(_) => return false,
        }
    }
    if offset >= payload.len() {
        return false;
    }
    let obu_type = (payload[offset] >> 3) & 0x0F;
    obu_type == OBU_TYPE_SEQUENCE_HEADER
}
