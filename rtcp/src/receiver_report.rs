#[cfg(test)]
mod receiver_report_test {
    use util::marshal::{Marshal, Unmarshal};

    use super::*;

    #[test]
    fn test_receiver_report_roundtrip() {
        let rr = ReceiverReport {
            ssrc: 0x902f9e2e,
            reports: vec![ReceptionReport {
                ssrc: 0xbc5e9a40,
                fraction_lost: 81,
                total_lost: 572,
                last_sequence_number: 0x46e1,
                jitter: 273,
                last_sender_report: 0x9f36432,
                delay: 150137,
            }],
            profile_extensions: vec![],
        };
        let raw = rr.marshal().unwrap();
        let mut buf = &raw[..];
        let decoded = ReceiverReport::unmarshal(&mut buf).unwrap();
        assert_eq!(decoded, rr);
    }

    #[test]
    fn test_receiver_report_total_lost_saturates() {
        let rr = ReceiverReport {
            ssrc: 1,
            reports: vec![ReceptionReport {
                ssrc: 2,
                total_lost: 0x1FFFFFF,
                ..Default::default()
            }],
            profile_extensions: vec![],
        };
        let raw = rr.marshal().unwrap();
        let mut buf = &raw[..];
        let decoded = ReceiverReport::unmarshal(&mut buf).unwrap();
        assert_eq!(decoded.reports[0].total_lost, 0xFFFFFF);
    }

    #[test]
    fn test_receiver_report_wrong_type() {
        let rr = ReceiverReport::default();
        let mut raw = rr.marshal().unwrap().to_vec();
        raw[1] = 200; // SR packet type
        let mut buf = &raw[..];
        assert!(ReceiverReport::unmarshal(&mut buf).is_err());
    }
}

use std::any::Any;
use std::fmt;

use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;
use crate::reception_report::*;

pub const RR_SSRC_OFFSET: usize = HEADER_LENGTH;
pub const RR_REPORT_OFFSET: usize = RR_SSRC_OFFSET + SSRC_LENGTH;

// ReceiverReport is an RTCP RR packet (RFC 3550 §6.4.2) with reception
// statistics for the streams this endpoint receives.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct ReceiverReport {
    // Synchronization source of this packet's originator.
    pub ssrc: u32,
    pub reports: Vec<ReceptionReport>,
    pub profile_extensions: Vec<u8>,
}

impl fmt::Display for ReceiverReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = format!("ReceiverReport from {:x}\n", self.ssrc);
        out += "\tSSRC    \tLost\tLastSequence\n";
        for rep in &self.reports {
            out += format!(
                "\t{:x}\t{}/{}\t{}\n",
                rep.ssrc, rep.fraction_lost, rep.total_lost, rep.last_sequence_number
            )
            .as_str();
        }
        write!(f, "{out}")
    }
}

impl Packet for ReceiverReport {
    fn header(&self) -> Header {
        Header {
            padding: false,
            count: self.reports.len() as u8,
            packet_type: PacketType::ReceiverReport,
            length: ((self.marshal_size() / 4) - 1) as u16,
        }
    }

    fn destination_ssrc(&self) -> Vec<u32> {
        self.reports.iter().map(|x| x.ssrc).collect()
    }

    fn raw_size(&self) -> usize {
        let mut reps_length = 0;
        for rep in &self.reports {
            reps_length += rep.marshal_size();
        }
        HEADER_LENGTH + SSRC_LENGTH + reps_length + self.profile_extensions.len()
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &(dyn Packet + Send + Sync)) -> bool {
        other
            .as_any()
            .downcast_ref::<ReceiverReport>()
            .is_some_and(|a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet + Send + Sync> {
        Box::new(self.clone())
    }
}

impl MarshalSize for ReceiverReport {
    fn marshal_size(&self) -> usize {
        let l = self.raw_size();
        // The RTCP length field is in 32-bit words.
        l + crate::util::get_padding_size(l)
    }
}

impl Marshal for ReceiverReport {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        if self.reports.len() > COUNT_MAX {
            return Err(Error::TooManyReports.into());
        }
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::BufferTooShort.into());
        }

        let h = self.header();
        let n = h.marshal_to(buf)?;
        buf = &mut buf[n..];

        buf.put_u32(self.ssrc);

        for report in &self.reports {
            let n = report.marshal_to(buf)?;
            buf = &mut buf[n..];
        }

        buf.put_slice(&self.profile_extensions);

        Ok(self.marshal_size())
    }
}

impl Unmarshal for ReceiverReport {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        let raw_packet_len = raw_packet.remaining();
        if raw_packet_len < HEADER_LENGTH + SSRC_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::ReceiverReport {
            return Err(Error::WrongType.into());
        }

        let ssrc = raw_packet.get_u32();

        let mut offset = RR_REPORT_OFFSET;
        let mut reports = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            if offset + RECEPTION_REPORT_LENGTH > raw_packet_len {
                return Err(Error::PacketTooShort.into());
            }
            reports.push(ReceptionReport::unmarshal(raw_packet)?);
            offset += RECEPTION_REPORT_LENGTH;
        }
        let profile_extensions = raw_packet
            .copy_to_bytes(raw_packet.remaining())
            .to_vec();

        Ok(ReceiverReport {
            ssrc,
            reports,
            profile_extensions,
        })
    }
}
