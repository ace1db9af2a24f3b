use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;

pub const RECEPTION_REPORT_LENGTH: usize = 24;
pub const FRACTION_LOST_OFFSET: usize = 4;
pub const TOTAL_LOST_OFFSET: usize = 5;
pub const LAST_SEQ_OFFSET: usize = 8;
pub const JITTER_OFFSET: usize = 12;
pub const LAST_SR_OFFSET: usize = 16;
pub const DELAY_OFFSET: usize = 20;

// ReceptionReport is one block of an SR or RR describing reception of a
// single SSRC (RFC 3550 §6.4.1).
#[derive(Debug, PartialEq, Eq, Default, Clone, Copy)]
pub struct ReceptionReport {
    pub ssrc: u32,
    // Fraction of packets lost since the previous report, as a fixed
    // point number with the binary point at the left edge.
    pub fraction_lost: u8,
    // Cumulative packets lost, a 24-bit signed quantity clamped on write.
    pub total_lost: u32,
    // Extended highest sequence number: cycles in the top 16 bits.
    pub last_sequence_number: u32,
    // Interarrival jitter in timestamp units.
    pub jitter: u32,
    // Middle 32 bits of the NTP timestamp of the last SR.
    pub last_sender_report: u32,
    // Delay since the last SR in 1/65536 seconds.
    pub delay: u32,
}

impl std::fmt::Display for ReceptionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:x} lost={}/{} seq={} jitter={} lsr={:x} dlsr={}",
            self.ssrc,
            self.fraction_lost,
            self.total_lost,
            self.last_sequence_number,
            self.jitter,
            self.last_sender_report,
            self.delay
        )
    }
}

impl MarshalSize for ReceptionReport {
    fn marshal_size(&self) -> usize {
        RECEPTION_REPORT_LENGTH
    }
}

impl Marshal for ReceptionReport {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        if buf.remaining_mut() < RECEPTION_REPORT_LENGTH {
            return Err(Error::BufferTooShort.into());
        }

        buf.put_u32(self.ssrc);
        buf.put_u8(self.fraction_lost);

        // The total lost field is 24 bits, saturate rather than wrap.
        let total_lost = self.total_lost.min(0xFFFFFF);
        buf.put_u8((total_lost >> 16) as u8);
        buf.put_u8((total_lost >> 8) as u8);
        buf.put_u8(total_lost as u8);

        buf.put_u32(self.last_sequence_number);
        buf.put_u32(self.jitter);
        buf.put_u32(self.last_sender_report);
        buf.put_u32(self.delay);

        Ok(RECEPTION_REPORT_LENGTH)
    }
}

impl Unmarshal for ReceptionReport {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        if raw_packet.remaining() < RECEPTION_REPORT_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        let ssrc = raw_packet.get_u32();
        let fraction_lost = raw_packet.get_u8();
        let b0 = raw_packet.get_u8() as u32;
        let b1 = raw_packet.get_u8() as u32;
        let b2 = raw_packet.get_u8() as u32;
        let total_lost = b0 << 16 | b1 << 8 | b2;
        let last_sequence_number = raw_packet.get_u32();
        let jitter = raw_packet.get_u32();
        let last_sender_report = raw_packet.get_u32();
        let delay = raw_packet.get_u32();

        Ok(ReceptionReport {
            ssrc,
            fraction_lost,
            total_lost,
            last_sequence_number,
            jitter,
            last_sender_report,
            delay,
        })
    }
}
