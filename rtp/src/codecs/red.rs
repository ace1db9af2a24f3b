#[cfg(test)]
mod red_test;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

// RFC 2198 redundant audio data. Each redundant block header is 4 bytes:
//
//  0                   1                    2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |F|   block PT  |  timestamp offset         |   block length    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
// The final header is one byte with F=0 followed by the primary data.
const RED_HEADER_SIZE: usize = 4;
const MAX_TIMESTAMP_OFFSET: u32 = (1 << 14) - 1;
const MAX_BLOCK_LENGTH: usize = (1 << 10) - 1;

// One encoding carried inside a RED payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedBlock {
    pub payload_type: u8,
    // Offset subtracted from the RTP timestamp of the carrying packet.
    // Zero for the primary encoding.
    pub timestamp_offset: u32,
    pub payload: Bytes,
}

// encode packs redundant blocks (oldest first) and the primary block into
// one RED payload.
pub fn encode(redundant: &[RedBlock], primary: &RedBlock) -> Result<Bytes> {
    let mut size = 1 + primary.payload.len();
    for b in redundant {
        if b.timestamp_offset > MAX_TIMESTAMP_OFFSET {
            return Err(Error::Other("red timestamp offset overflow".to_owned()));
        }
        if b.payload.len() > MAX_BLOCK_LENGTH {
            return Err(Error::ErrRedBlockOverrun);
        }
        size += RED_HEADER_SIZE + b.payload.len();
    }

    let mut out = BytesMut::with_capacity(size);
    for b in redundant {
        out.put_u8(0x80 | (b.payload_type & 0x7F));
        out.put_u8((b.timestamp_offset >> 6) as u8);
        out.put_u8(
            (((b.timestamp_offset & 0x3F) as u8) << 2) | ((b.payload.len() >> 8) as u8 & 0x03),
        );
        out.put_u8((b.payload.len() & 0xFF) as u8);
    }
    out.put_u8(primary.payload_type & 0x7F);
    for b in redundant {
        out.put_slice(&b.payload);
    }
    out.put_slice(&primary.payload);
    Ok(out.freeze())
}

// decode splits a RED payload into its blocks; the primary block is last.
pub fn decode(payload: &Bytes) -> Result<Vec<RedBlock>> {
    let mut headers = vec![];
    let mut offset = 0;

    loop {
        if offset >= payload.len() {
            return Err(Error::ErrRedHeaderTruncated);
        }
        let b0 = payload[offset];
        let pt = b0 & 0x7F;
        if b0 & 0x80 == 0 {
            // primary block header
            offset += 1;
            headers.push((pt, 0u32, None));
            break;
        }
        if offset + RED_HEADER_SIZE > payload.len() {
            return Err(Error::ErrRedHeaderTruncated);
        }
        let ts_offset =
            ((payload[offset + 1] as u32) << 6) | ((payload[offset + 2] as u32) >> 2);
        let block_length =
            (((payload[offset + 2] as usize) & 0x03) << 8) | payload[offset + 3] as usize;
        headers.push((pt, ts_offset, Some(block_length)));
        offset += RED_HEADER_SIZE;
    }

    let mut blocks = Vec::with_capacity(headers.len());
    for (pt, ts_offset, block_length) in headers {
        let length = match block_length {
            Some(l) => l,
            // Primary block runs to the end of the payload.
            None => payload.len() - offset,
        };
        if offset + length > payload.len() {
            return Err(Error::ErrRedBlockOverrun);
        }
        blocks.push(RedBlock {
            payload_type: pt,
            timestamp_offset: ts_offset,
            payload: payload.slice(offset..offset + length),
        });
        offset += length;
    }

    Ok(blocks)
}

// RedEncoder keeps a bounded history of primary payloads and emits each
// new primary with up to `distance` redundant generations attached.
#[derive(Debug, Clone)]
pub struct RedEncoder {
    distance: usize,
    history: Vec<RedBlock>,
}

impl RedEncoder {
    pub fn new(distance: usize) -> Self {
        RedEncoder {
            distance,
            history: vec![],
        }
    }

    pub fn push(&mut self, payload_type: u8, timestamp: u32, payload: Bytes) -> Result<Bytes> {
        let mut redundant = Vec::with_capacity(self.history.len());
        for old in &self.history {
            let offset = timestamp.wrapping_sub(old.timestamp_offset);
            // Drop generations whose offset no longer fits the 14-bit field.
            if offset > MAX_TIMESTAMP_OFFSET || old.payload.len() > MAX_BLOCK_LENGTH {
                continue;
            }
            redundant.push(RedBlock {
                payload_type: old.payload_type,
                timestamp_offset: offset,
                payload: old.payload.clone(),
            });
        }

        let primary = RedBlock {
            payload_type,
            timestamp_offset: 0,
            payload: payload.clone(),
        };
        let encoded = encode(&redundant, &primary)?;

        // The history keys blocks by their absolute timestamp, reusing the
        // timestamp_offset field for it.
        self.history.push(RedBlock {
            payload_type,
            timestamp_offset: timestamp,
            payload,
        });
        if self.history.len() > self.distance {
            let excess = self.history.len() - self.distance;
            self.history.drain(..excess);
        }

        Ok(encoded)
    }
}
