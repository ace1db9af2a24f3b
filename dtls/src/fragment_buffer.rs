#[cfg(test)]
mod fragment_buffer_test {
    use super::*;
    use crate::handshake::{HandshakeHeader, HandshakeType};

    fn fragment(
        msg_seq: u16,
        total_len: u32,
        offset: u32,
        data: &[u8],
    ) -> Vec<u8> {
        let mut out = HandshakeHeader {
            handshake_type: HandshakeType::Certificate,
            length: total_len,
            message_sequence: msg_seq,
            fragment_offset: offset,
            fragment_length: data.len() as u32,
        }
        .marshal();
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn test_unfragmented_message() {
        let mut fb = FragmentBuffer::new();
        fb.push(&fragment(0, 4, 0, &[1, 2, 3, 4])).unwrap();
        let (typ, seq, body) = fb.pop().unwrap();
        assert_eq!(typ, HandshakeType::Certificate);
        assert_eq!(seq, 0);
        assert_eq!(body, vec![1, 2, 3, 4]);
        assert!(fb.pop().is_none());
    }

    #[test]
    fn test_fragmented_out_of_order() {
        let mut fb = FragmentBuffer::new();
        fb.push(&fragment(1, 6, 4, &[5, 6])).unwrap();
        assert!(fb.pop().is_none(), "incomplete message stays buffered");
        fb.push(&fragment(1, 6, 0, &[1, 2, 3, 4])).unwrap();
        let (_, seq, body) = fb.pop().unwrap();
        assert_eq!(seq, 1);
        assert_eq!(body, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_duplicate_fragments_tolerated() {
        let mut fb = FragmentBuffer::new();
        fb.push(&fragment(0, 2, 0, &[9, 9])).unwrap();
        fb.push(&fragment(0, 2, 0, &[9, 9])).unwrap();
        let (_, _, body) = fb.pop().unwrap();
        assert_eq!(body, vec![9, 9]);
    }
}

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::handshake::{HandshakeHeader, HandshakeType, HANDSHAKE_HEADER_LENGTH};

// FragmentBuffer reassembles fragmented handshake messages keyed by
// message_seq (RFC 6347 §4.2.3).
#[derive(Default)]
pub struct FragmentBuffer {
    messages: HashMap<u16, PartialMessage>,
}

struct PartialMessage {
    handshake_type: HandshakeType,
    total_length: u32,
    data: Vec<u8>,
    received: Vec<bool>,
}

impl FragmentBuffer {
    pub fn new() -> Self {
        FragmentBuffer::default()
    }

    // push consumes one handshake fragment including its header.
    pub fn push(&mut self, raw: &[u8]) -> Result<()> {
        let header = HandshakeHeader::unmarshal(raw)?;
        let body = &raw[HANDSHAKE_HEADER_LENGTH..];
        if body.len() < header.fragment_length as usize {
            return Err(Error::ErrBufferTooSmall);
        }
        if header.fragment_offset + header.fragment_length > header.length {
            return Err(Error::ErrHandshakeMessageIncomplete);
        }

        let entry = self
            .messages
            .entry(header.message_sequence)
            .or_insert_with(|| PartialMessage {
                handshake_type: header.handshake_type,
                total_length: header.length,
                data: vec![0u8; header.length as usize],
                received: vec![false; header.length as usize],
            });

        if entry.total_length != header.length {
            return Err(Error::ErrHandshakeMessageIncomplete);
        }

        let start = header.fragment_offset as usize;
        let end = start + header.fragment_length as usize;
        entry.data[start..end].copy_from_slice(&body[..header.fragment_length as usize]);
        for r in &mut entry.received[start..end] {
            *r = true;
        }
        Ok(())
    }

    // pop returns the next fully reassembled message, lowest message_seq
    // first.
    pub fn pop(&mut self) -> Option<(HandshakeType, u16, Vec<u8>)> {
        let seq = self
            .messages
            .iter()
            .filter(|(_, m)| m.received.iter().all(|r| *r))
            .map(|(seq, _)| *seq)
            .min()?;
        let msg = self.messages.remove(&seq)?;
        Some((msg.handshake_type, seq, msg.data))
    }
}
