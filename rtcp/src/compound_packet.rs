#[cfg(test)]
mod compound_packet_test {
    use super::*;
    use crate::payload_feedbacks::picture_loss_indication::PictureLossIndication;
    use crate::receiver_report::ReceiverReport;
    use crate::sender_report::SenderReport;

    fn cname() -> SourceDescription {
        SourceDescription::cname(1234, "cname")
    }

    #[test]
    fn test_valid_compound() {
        let cp = CompoundPacket(vec![
            Box::new(ReceiverReport::default()),
            Box::new(cname()),
        ]);
        cp.validate().unwrap();
    }

    #[test]
    fn test_compound_must_start_with_report() {
        let cp = CompoundPacket(vec![
            Box::new(cname()),
            Box::new(ReceiverReport::default()),
        ]);
        assert!(cp.validate().is_err());
    }

    #[test]
    fn test_compound_missing_cname() {
        let cp = CompoundPacket(vec![Box::new(SenderReport::default())]);
        assert!(cp.validate().is_err());
    }

    #[test]
    fn test_compound_cname_after_feedback_ok() {
        let cp = CompoundPacket(vec![
            Box::new(ReceiverReport::default()),
            Box::new(cname()),
            Box::new(PictureLossIndication::default()),
        ]);
        cp.validate().unwrap();
    }
}

use std::any::Any;
use std::fmt;

use bytes::Buf;
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::*;
use crate::source_description::*;

// CompoundPacket is a collection of RTCP packets transmitted together
// (RFC 3550 §6.1): it must begin with an SR or RR and contain a CNAME
// SDES item.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct CompoundPacket(pub Vec<Box<dyn Packet + Send + Sync>>);

impl fmt::Display for CompoundPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.0 {
            writeln!(f, "{p}")?;
        }
        Ok(())
    }
}

impl CompoundPacket {
    // validate checks the ordering constraints of RFC 3550 §6.1.
    pub fn validate(&self) -> Result<(), Error> {
        if self.0.is_empty() {
            return Err(Error::PacketTooShort);
        }

        // The first packet must be a sender or receiver report.
        let first = self.0[0].header();
        if first.packet_type != PacketType::SenderReport
            && first.packet_type != PacketType::ReceiverReport
        {
            return Err(Error::Other("compound packet must begin with SR or RR".to_owned()));
        }

        for p in &self.0[1..] {
            if let Some(sdes) = p.as_any().downcast_ref::<SourceDescription>() {
                let has_cname = sdes.chunks.iter().any(|c| {
                    c.items
                        .iter()
                        .any(|it| it.sdes_type == SdesType::SdesCname)
                });
                if has_cname {
                    return Ok(());
                }
            }
        }
        Err(Error::Other("compound packet is missing a CNAME".to_owned()))
    }

    pub fn destination_ssrc(&self) -> Vec<u32> {
        if self.0.is_empty() {
            vec![]
        } else {
            self.0[0].destination_ssrc()
        }
    }
}

impl MarshalSize for CompoundPacket {
    fn marshal_size(&self) -> usize {
        self.0.iter().map(|p| p.marshal_size()).sum()
    }
}

impl Marshal for CompoundPacket {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        self.validate().map_err(util::Error::from_std)?;
        let mut written = 0;
        for p in &self.0 {
            let n = p.marshal_to(buf)?;
            buf = &mut buf[n..];
            written += n;
        }
        Ok(written)
    }
}

impl Unmarshal for CompoundPacket {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        let packets = unmarshal(raw_packet)?;
        Ok(CompoundPacket(packets))
    }
}

impl Packet for CompoundPacket {
    fn header(&self) -> Header {
        if self.0.is_empty() {
            Header::default()
        } else {
            self.0[0].header()
        }
    }

    fn destination_ssrc(&self) -> Vec<u32> {
        CompoundPacket::destination_ssrc(self)
    }

    fn raw_size(&self) -> usize {
        self.marshal_size()
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &(dyn Packet + Send + Sync)) -> bool {
        other
            .as_any()
            .downcast_ref::<CompoundPacket>()
            .is_some_and(|a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet + Send + Sync> {
        Box::new(self.clone())
    }
}
