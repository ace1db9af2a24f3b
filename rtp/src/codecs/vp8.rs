#[cfg(test)]
mod vp8_test;

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::packetizer::{Depacketizer, Payloader};

pub const VP8_HEADER_SIZE: usize = 1;

// Vp8Payloader payloads VP8 frames per RFC 7741.
#[derive(Default, Debug, Copy, Clone)]
pub struct Vp8Payloader {
    pub enable_picture_id: bool,
    picture_id: u16,
}

impl Payloader for Vp8Payloader {
    fn payload(&mut self, mtu: usize, payload: &Bytes) -> Result<Vec<Bytes>> {
        if payload.is_empty() || mtu == 0 {
            return Ok(vec![]);
        }

        // The descriptor is either the bare required byte or the required
        // byte plus the extension byte and a two-byte picture id.
        let using_header_size = if self.enable_picture_id {
            VP8_HEADER_SIZE + 3
        } else {
            VP8_HEADER_SIZE
        };

        let max_fragment_size = mtu as isize - using_header_size as isize;
        if max_fragment_size <= 0 {
            return Err(Error::ErrBufferTooSmall);
        }

        let mut payloads = vec![];
        let mut payload_remaining = payload.len();
        let mut payload_index: usize = 0;
        let mut first = true;
        while payload_remaining > 0 {
            let current_size = (max_fragment_size as usize).min(payload_remaining);
            let mut out = BytesMut::with_capacity(using_header_size + current_size);

            // S bit marks the first packet of the frame, PID is 0.
            let mut b0 = 0u8;
            if first {
                b0 |= 0x10;
                first = false;
            }
            if self.enable_picture_id {
                b0 |= 0x80; // X
                out.extend_from_slice(&[
                    b0,
                    0x80, // I
                    0x80 | (self.picture_id >> 8) as u8,
                    (self.picture_id & 0xFF) as u8,
                ]);
            } else {
                out.extend_from_slice(&[b0]);
            }

            out.extend_from_slice(&payload[payload_index..payload_index + current_size]);
            payloads.push(out.freeze());

            payload_remaining -= current_size;
            payload_index += current_size;
        }
        self.picture_id = (self.picture_id + 1) & 0x7FFF;

        Ok(payloads)
    }

    fn clone_to(&self) -> Box<dyn Payloader + Send + Sync> {
        Box::new(*self)
    }
}

// Vp8Packet is the parsed VP8 payload descriptor plus the VP8 payload.
//
//  0 1 2 3 4 5 6 7
// +-+-+-+-+-+-+-+-+
// |X|R|N|S|R| PID | (REQUIRED)
// +-+-+-+-+-+-+-+-+
// X: |I|L|T|K| RSV | (OPTIONAL)
// I:   |M| PictureID | (OPTIONAL 7 or 15 bit)
// L:   |   TL0PICIDX  | (OPTIONAL)
// T/K: |TID|Y| KEYIDX  | (OPTIONAL)
#[derive(PartialEq, Eq, Debug, Default, Clone)]
pub struct Vp8Packet {
    pub x: u8,
    pub n: u8,
    pub s: u8,
    pub pid: u8,
    pub i: u8,
    pub l: u8,
    pub t: u8,
    pub k: u8,
    pub m: u8,
    pub picture_id: u16,
    pub tl0_pic_idx: u8,
    pub tid: u8,
    pub y: u8,
    pub key_idx: u8,

    pub payload: Bytes,
}

impl Depacketizer for Vp8Packet {
    fn depacketize(&mut self, packet: &Bytes) -> Result<Bytes> {
        let payload_len = packet.len();
        if payload_len < 4 {
            return Err(Error::ErrVp8PayloadTooSmall);
        }

        let mut payload_index = 0;

        self.x = (packet[payload_index] & 0x80) >> 7;
        self.n = (packet[payload_index] & 0x20) >> 5;
        self.s = (packet[payload_index] & 0x10) >> 4;
        self.pid = packet[payload_index] & 0x07;
        payload_index += 1;

        if self.x == 1 {
            self.i = (packet[payload_index] & 0x80) >> 7;
            self.l = (packet[payload_index] & 0x40) >> 6;
            self.t = (packet[payload_index] & 0x20) >> 5;
            self.k = (packet[payload_index] & 0x10) >> 4;
            payload_index += 1;
        } else {
            self.i = 0;
            self.l = 0;
            self.t = 0;
            self.k = 0;
        }

        if self.i == 1 {
            self.m = (packet[payload_index] & 0x80) >> 7;
            if self.m == 1 {
                self.picture_id = (((packet[payload_index] & 0x7F) as u16) << 8)
                    | packet[payload_index + 1] as u16;
                payload_index += 2;
            } else {
                self.picture_id = (packet[payload_index] & 0x7F) as u16;
                payload_index += 1;
            }
        }

        if self.l == 1 {
            self.tl0_pic_idx = packet[payload_index];
            payload_index += 1;
        }

        if self.t == 1 || self.k == 1 {
            if self.t == 1 {
                self.tid = packet[payload_index] >> 6;
                self.y = (packet[payload_index] >> 5) & 0x1;
            }
            if self.k == 1 {
                self.key_idx = packet[payload_index] & 0x1F;
            }
            payload_index += 1;
        }

        if payload_index >= payload_len {
            return Err(Error::ErrShortPacket);
        }
        self.payload = packet.slice(payload_index..);
        Ok(self.payload.clone())
    }

    // is_partition_head checks whether this is the head of a packetized
    // VP8 partition: S set and PID zero.
    fn is_partition_head(&self, payload: &Bytes) -> bool {
        if payload.is_empty() {
            return false;
        }
        (payload[0] & 0x10) != 0 && (payload[0] & 0x07) == 0
    }

    fn is_partition_tail(&self, marker: bool, _payload: &Bytes) -> bool {
        marker
    }
}

// is_keyframe reports whether a depacketized VP8 payload begins a
// keyframe: the P bit of the frame tag is zero.
pub fn is_keyframe(frame: &[u8]) -> bool {
    !frame.is_empty() && frame[0] & 0x01 == 0
}
