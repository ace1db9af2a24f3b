#[cfg(test)]
mod packetizer_test {
    use bytes::Bytes;

    use super::*;
    use crate::codecs::opus::OpusPayloader;

    #[test]
    fn test_packetizer_stamps_headers() {
        let mut packetizer = new_packetizer(
            1200,
            111,
            0x1234ABCD,
            Box::new(OpusPayloader),
            Box::new(crate::sequence::new_fixed_sequencer(100)),
            48000,
        );
        let packets = packetizer
            .packetize(&Bytes::from_static(&[0x01, 0x02, 0x03]), 960)
            .unwrap();
        assert_eq!(packets.len(), 1);
        let p = &packets[0];
        assert_eq!(p.header.payload_type, 111);
        assert_eq!(p.header.ssrc, 0x1234ABCD);
        assert_eq!(p.header.sequence_number, 100);
        assert!(p.header.marker, "single packet closes the unit");

        // Timestamp advances by the sample count between calls.
        let first_ts = p.header.timestamp;
        let packets = packetizer
            .packetize(&Bytes::from_static(&[0x04]), 960)
            .unwrap();
        assert_eq!(packets[0].header.timestamp, first_ts.wrapping_add(960));
        assert_eq!(packets[0].header.sequence_number, 101);
    }
}

use std::fmt;

use bytes::Bytes;

use crate::error::Result;
use crate::header::Header;
use crate::packet::Packet;
use crate::sequence::Sequencer;

// Payloader fragments a frame into RTP payloads that fit the MTU.
pub trait Payloader: fmt::Debug {
    fn payload(&mut self, mtu: usize, b: &Bytes) -> Result<Vec<Bytes>>;
    fn clone_to(&self) -> Box<dyn Payloader + Send + Sync>;
}

impl Clone for Box<dyn Payloader + Send + Sync> {
    fn clone(&self) -> Box<dyn Payloader + Send + Sync> {
        self.clone_to()
    }
}

// Depacketizer strips the payload-format header from an RTP payload.
pub trait Depacketizer {
    fn depacketize(&mut self, b: &Bytes) -> Result<Bytes>;

    // is_partition_head checks whether the packet starts a partition.
    // Returns false when this cannot be determined from the payload; the
    // caller then falls back to timestamp discontinuities.
    fn is_partition_head(&self, payload: &Bytes) -> bool;

    // is_partition_tail checks whether the packet ends a partition.
    fn is_partition_tail(&self, marker: bool, payload: &Bytes) -> bool;
}

// Packetizer turns frames into sequenced, timestamped RTP packets.
pub trait Packetizer: fmt::Debug {
    fn packetize(&mut self, payload: &Bytes, samples: u32) -> Result<Vec<Packet>>;
    fn skip_samples(&mut self, skipped_samples: u32);
    fn clone_to(&self) -> Box<dyn Packetizer + Send + Sync>;
}

impl Clone for Box<dyn Packetizer + Send + Sync> {
    fn clone(&self) -> Box<dyn Packetizer + Send + Sync> {
        self.clone_to()
    }
}

pub fn new_packetizer(
    mtu: usize,
    payload_type: u8,
    ssrc: u32,
    payloader: Box<dyn Payloader + Send + Sync>,
    sequencer: Box<dyn Sequencer + Send + Sync>,
    clock_rate: u32,
) -> impl Packetizer {
    PacketizerImpl {
        mtu,
        payload_type,
        ssrc,
        payloader,
        sequencer,
        timestamp: rand::random::<u32>(),
        clock_rate,
    }
}

#[derive(Clone)]
struct PacketizerImpl {
    mtu: usize,
    payload_type: u8,
    ssrc: u32,
    payloader: Box<dyn Payloader + Send + Sync>,
    sequencer: Box<dyn Sequencer + Send + Sync>,
    timestamp: u32,
    clock_rate: u32,
}

impl fmt::Debug for PacketizerImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketizerImpl")
            .field("mtu", &self.mtu)
            .field("payload_type", &self.payload_type)
            .field("ssrc", &self.ssrc)
            .field("timestamp", &self.timestamp)
            .field("clock_rate", &self.clock_rate)
            .finish()
    }
}

impl Packetizer for PacketizerImpl {
    fn packetize(&mut self, payload: &Bytes, samples: u32) -> Result<Vec<Packet>> {
        let payloads = self.payloader.payload(self.mtu - 12, payload)?;
        let payloads_len = payloads.len();
        let mut packets = Vec::with_capacity(payloads_len);
        for (i, payload) in payloads.into_iter().enumerate() {
            packets.push(Packet {
                header: Header {
                    version: 2,
                    marker: i == payloads_len - 1,
                    payload_type: self.payload_type,
                    sequence_number: self.sequencer.next_sequence_number(),
                    timestamp: self.timestamp,
                    ssrc: self.ssrc,
                    ..Default::default()
                },
                payload,
                padding_size: 0,
            });
        }
        self.timestamp = self.timestamp.wrapping_add(samples);
        Ok(packets)
    }

    fn skip_samples(&mut self, skipped_samples: u32) {
        self.timestamp = self.timestamp.wrapping_add(skipped_samples);
    }

    fn clone_to(&self) -> Box<dyn Packetizer + Send + Sync> {
        Box::new(self.clone())
    }
}
