#[cfg(test)]
mod opus_test;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::packetizer::{Depacketizer, Payloader};

// An Opus packet at or below this size carries no speech: DTX comfort
// noise updates are 1-3 bytes.
pub const DTX_MAX_PAYLOAD_SIZE: usize = 3;

// OpusPayloader passes Opus packets through, one frame per RTP packet.
#[derive(Default, Debug, Copy, Clone)]
pub struct OpusPayloader;

impl Payloader for OpusPayloader {
    fn payload(&mut self, mtu: usize, payload: &Bytes) -> Result<Vec<Bytes>> {
        if payload.is_empty() || mtu == 0 {
            return Ok(vec![]);
        }
        Ok(vec![payload.clone()])
    }

    fn clone_to(&self) -> Box<dyn Payloader + Send + Sync> {
        Box::new(*self)
    }
}

// OpusPacket is a pass-through depacketizer that keeps the TOC byte
// available for inspection.
#[derive(PartialEq, Eq, Debug, Default, Clone)]
pub struct OpusPacket {
    pub payload: Bytes,
}

impl Depacketizer for OpusPacket {
    fn depacketize(&mut self, packet: &Bytes) -> Result<Bytes> {
        if packet.is_empty() {
            return Err(Error::ErrOpusPayloadEmpty);
        }
        self.payload = packet.clone();
        Ok(self.payload.clone())
    }

    fn is_partition_head(&self, _payload: &Bytes) -> bool {
        true
    }

    fn is_partition_tail(&self, _marker: bool, _payload: &Bytes) -> bool {
        true
    }
}

impl OpusPacket {
    // toc returns the table-of-contents byte: config, stereo flag and
    // frame count code.
    pub fn toc(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    // config is the 5-bit mode/bandwidth/frame-duration configuration.
    pub fn config(&self) -> Option<u8> {
        self.toc().map(|t| t >> 3)
    }

    pub fn is_stereo(&self) -> Option<bool> {
        self.toc().map(|t| t & 0x04 != 0)
    }
}

// is_dtx reports whether the packet is a discontinuous-transmission
// update rather than a speech frame.
pub fn is_dtx(payload: &[u8]) -> bool {
    !payload.is_empty() && payload.len() <= DTX_MAX_PAYLOAD_SIZE
}
