#[cfg(test)]
mod send_buffer_test {
    use bytes::Bytes;

    use super::*;

    fn pkt(seq: u16) -> rtp::packet::Packet {
        rtp::packet::Packet {
            header: rtp::header::Header {
                sequence_number: seq,
                ..Default::default()
            },
            payload: Bytes::from_static(&[0xAB]),
            ..Default::default()
        }
    }

    #[test]
    fn test_send_buffer_lookup() {
        let mut sb = SendBuffer::new(128).unwrap();
        for seq in 0..10u16 {
            sb.add(pkt(seq));
        }
        assert_eq!(sb.get(5).unwrap().header.sequence_number, 5);
        assert!(sb.get(100).is_none());
    }

    #[test]
    fn test_send_buffer_evicts_old() {
        let mut sb = SendBuffer::new(64).unwrap();
        for seq in 0..200u16 {
            sb.add(pkt(seq));
        }
        assert!(sb.get(10).is_none(), "outside the retained window");
        assert!(sb.get(199).is_some());
        assert!(sb.get(199 - 63).is_some());
    }

    #[test]
    fn test_send_buffer_wraparound() {
        let mut sb = SendBuffer::new(64).unwrap();
        sb.add(pkt(65530));
        sb.add(pkt(65535));
        sb.add(pkt(2));
        assert!(sb.get(65535).is_some());
        assert!(sb.get(2).is_some());
    }
}

use crate::error::{Error, Result};

// SendBuffer retains recently sent packets keyed by sequence number so a
// NACK can be answered with a retransmission. Bounded, power-of-two
// sized; old entries fall out as the window advances.
pub struct SendBuffer {
    packets: Vec<Option<rtp::packet::Packet>>,
    size: u16,
    highest_added: u16,
    started: bool,
}

impl SendBuffer {
    pub fn new(size: u16) -> Result<Self> {
        let allowed = [1u16, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384];
        if !allowed.contains(&size) {
            return Err(Error::ErrInvalidSize);
        }
        Ok(SendBuffer {
            packets: vec![None; size as usize],
            size,
            highest_added: 0,
            started: false,
        })
    }

    pub fn add(&mut self, packet: rtp::packet::Packet) {
        let seq = packet.header.sequence_number;
        self.packets[(seq % self.size) as usize] = Some(packet);
        if !self.started || seq.wrapping_sub(self.highest_added) < 0x8000 {
            self.highest_added = seq;
        }
        self.started = true;
    }

    pub fn get(&self, seq: u16) -> Option<&rtp::packet::Packet> {
        let diff = self.highest_added.wrapping_sub(seq);
        if diff >= self.size {
            return None;
        }
        self.packets[(seq % self.size) as usize]
            .as_ref()
            .filter(|p| p.header.sequence_number == seq)
    }
}
