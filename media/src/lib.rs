#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod error;
pub mod jitter_buffer;

pub use error::{Error, Result};

use std::time::{Duration, SystemTime};

use bytes::Bytes;

// Sample is one decoded-ready access unit handed to the application:
// depacketized payload plus its timing and loss context.
#[derive(Debug, Clone)]
pub struct Sample {
    pub data: Bytes,
    pub timestamp: SystemTime,
    pub duration: Duration,
    pub packet_timestamp: u32,
    // Number of packets declared lost while assembling this sample.
    pub prev_dropped_packets: u16,
    pub prev_padding_packets: u16,
}

impl Default for Sample {
    fn default() -> Self {
        Sample {
            data: Bytes::new(),
            timestamp: SystemTime::UNIX_EPOCH,
            duration: Duration::from_secs(0),
            packet_timestamp: 0,
            prev_dropped_packets: 0,
            prev_padding_packets: 0,
        }
    }
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
            && self.duration == other.duration
            && self.packet_timestamp == other.packet_timestamp
            && self.prev_dropped_packets == other.prev_dropped_packets
    }
}
