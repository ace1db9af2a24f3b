#[cfg(test)]
mod extended_report_test {
    use util::marshal::{Marshal, Unmarshal};

    use super::*;

    #[test]
    fn test_xr_rrt_roundtrip() {
        let xr = ExtendedReport {
            sender_ssrc: 0x902f9e2e,
            reports: vec![ReportBlock::ReceiverReferenceTime(
                ReceiverReferenceTimeReportBlock {
                    ntp_timestamp: 0x0102030405060708,
                },
            )],
        };
        let raw = xr.marshal().unwrap();
        assert_eq!(raw[1], 207);
        let mut buf = &raw[..];
        assert_eq!(ExtendedReport::unmarshal(&mut buf).unwrap(), xr);
    }

    #[test]
    fn test_xr_dlrr_roundtrip() {
        let xr = ExtendedReport {
            sender_ssrc: 1,
            reports: vec![ReportBlock::Dlrr(DlrrReportBlock {
                reports: vec![DlrrReport {
                    ssrc: 0x4bc4fcb4,
                    last_rr: 0x0102,
                    dlrr: 0x0304,
                }],
            })],
        };
        let raw = xr.marshal().unwrap();
        let mut buf = &raw[..];
        assert_eq!(ExtendedReport::unmarshal(&mut buf).unwrap(), xr);
    }

    #[test]
    fn test_xr_unknown_block_preserved() {
        let xr = ExtendedReport {
            sender_ssrc: 7,
            reports: vec![ReportBlock::Unknown(UnknownReportBlock {
                block_type: 42,
                type_specific: 0,
                body: vec![0xDE, 0xAD, 0xBE, 0xEF],
            })],
        };
        let raw = xr.marshal().unwrap();
        let mut buf = &raw[..];
        assert_eq!(ExtendedReport::unmarshal(&mut buf).unwrap(), xr);
    }
}

use std::any::Any;
use std::fmt;

use bytes::{Buf, BufMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::header::*;
use crate::packet::Packet;

pub const BLOCK_TYPE_RRT: u8 = 4;
pub const BLOCK_TYPE_DLRR: u8 = 5;

const BLOCK_HEADER_LENGTH: usize = 4;

// ReceiverReferenceTimeReportBlock (RFC 3611 §4.4) lets a receiver
// publish an NTP timestamp so senders can compute round-trip time from
// DLRR responses.
#[derive(Debug, PartialEq, Eq, Default, Clone, Copy)]
pub struct ReceiverReferenceTimeReportBlock {
    pub ntp_timestamp: u64,
}

#[derive(Debug, PartialEq, Eq, Default, Clone, Copy)]
pub struct DlrrReport {
    pub ssrc: u32,
    // Middle 32 bits of the RRT NTP timestamp this responds to.
    pub last_rr: u32,
    // Delay since that RRT in 1/65536 seconds.
    pub dlrr: u32,
}

// DlrrReportBlock (RFC 3611 §4.5), the response half of the RTT exchange.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct DlrrReportBlock {
    pub reports: Vec<DlrrReport>,
}

#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct UnknownReportBlock {
    pub block_type: u8,
    pub type_specific: u8,
    pub body: Vec<u8>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ReportBlock {
    ReceiverReferenceTime(ReceiverReferenceTimeReportBlock),
    Dlrr(DlrrReportBlock),
    Unknown(UnknownReportBlock),
}

impl ReportBlock {
    fn body_length(&self) -> usize {
        match self {
            ReportBlock::ReceiverReferenceTime(_) => 8,
            ReportBlock::Dlrr(b) => b.reports.len() * 12,
            ReportBlock::Unknown(b) => b.body.len(),
        }
    }
}

// ExtendedReport is an RTCP XR packet (RFC 3611).
#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct ExtendedReport {
    pub sender_ssrc: u32,
    pub reports: Vec<ReportBlock>,
}

impl fmt::Display for ExtendedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtendedReport from {:x}: {} blocks", self.sender_ssrc, self.reports.len())
    }
}

impl Packet for ExtendedReport {
    fn header(&self) -> Header {
        Header {
            padding: false,
            count: 0,
            packet_type: PacketType::ExtendedReport,
            length: ((self.marshal_size() / 4) - 1) as u16,
        }
    }

    fn destination_ssrc(&self) -> Vec<u32> {
        let mut out = vec![];
        for block in &self.reports {
            if let ReportBlock::Dlrr(b) = block {
                out.extend(b.reports.iter().map(|r| r.ssrc));
            }
        }
        out
    }

    fn raw_size(&self) -> usize {
        let mut n = HEADER_LENGTH + SSRC_LENGTH;
        for block in &self.reports {
            n += BLOCK_HEADER_LENGTH + block.body_length();
        }
        n
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn equal(&self, other: &(dyn Packet + Send + Sync)) -> bool {
        other
            .as_any()
            .downcast_ref::<ExtendedReport>()
            .is_some_and(|a| self == a)
    }

    fn cloned(&self) -> Box<dyn Packet + Send + Sync> {
        Box::new(self.clone())
    }
}

impl MarshalSize for ExtendedReport {
    fn marshal_size(&self) -> usize {
        self.raw_size()
    }
}

impl Marshal for ExtendedReport {
    fn marshal_to(&self, mut buf: &mut [u8]) -> std::result::Result<usize, util::Error> {
        if buf.remaining_mut() < self.marshal_size() {
            return Err(Error::BufferTooShort.into());
        }

        let h = self.header();
        let n = h.marshal_to(buf)?;
        buf = &mut buf[n..];

        buf.put_u32(self.sender_ssrc);

        for block in &self.reports {
            let body_len = block.body_length();
            if body_len % 4 != 0 {
                return Err(Error::WrongBlockSize.into());
            }
            match block {
                ReportBlock::ReceiverReferenceTime(b) => {
                    buf.put_u8(BLOCK_TYPE_RRT);
                    buf.put_u8(0);
                    buf.put_u16((body_len / 4) as u16);
                    buf.put_u64(b.ntp_timestamp);
                }
                ReportBlock::Dlrr(b) => {
                    buf.put_u8(BLOCK_TYPE_DLRR);
                    buf.put_u8(0);
                    buf.put_u16((body_len / 4) as u16);
                    for r in &b.reports {
                        buf.put_u32(r.ssrc);
                        buf.put_u32(r.last_rr);
                        buf.put_u32(r.dlrr);
                    }
                }
                ReportBlock::Unknown(b) => {
                    buf.put_u8(b.block_type);
                    buf.put_u8(b.type_specific);
                    buf.put_u16((body_len / 4) as u16);
                    buf.put_slice(&b.body);
                }
            }
        }

        Ok(self.marshal_size())
    }
}

impl Unmarshal for ExtendedReport {
    fn unmarshal<B>(raw_packet: &mut B) -> std::result::Result<Self, util::Error>
    where
        B: Buf,
    {
        if raw_packet.remaining() < HEADER_LENGTH + SSRC_LENGTH {
            return Err(Error::PacketTooShort.into());
        }

        let header = Header::unmarshal(raw_packet)?;
        if header.packet_type != PacketType::ExtendedReport {
            return Err(Error::WrongType.into());
        }

        let sender_ssrc = raw_packet.get_u32();

        let mut reports = vec![];
        while raw_packet.remaining() >= BLOCK_HEADER_LENGTH {
            let block_type = raw_packet.get_u8();
            let type_specific = raw_packet.get_u8();
            let body_len = raw_packet.get_u16() as usize * 4;
            if raw_packet.remaining() < body_len {
                return Err(Error::PacketTooShort.into());
            }

            match block_type {
                BLOCK_TYPE_RRT => {
                    if body_len != 8 {
                        return Err(Error::WrongBlockSize.into());
                    }
                    reports.push(ReportBlock::ReceiverReferenceTime(
                        ReceiverReferenceTimeReportBlock {
                            ntp_timestamp: raw_packet.get_u64(),
                        },
                    ));
                }
                BLOCK_TYPE_DLRR => {
                    if body_len % 12 != 0 {
                        return Err(Error::WrongBlockSize.into());
                    }
                    let mut sub = vec![];
                    for _ in 0..body_len / 12 {
                        sub.push(DlrrReport {
                            ssrc: raw_packet.get_u32(),
                            last_rr: raw_packet.get_u32(),
                            dlrr: raw_packet.get_u32(),
                        });
                    }
                    reports.push(ReportBlock::Dlrr(DlrrReportBlock { reports: sub }));
                }
                _ => {
                    let body = raw_packet.copy_to_bytes(body_len).to_vec();
                    reports.push(ReportBlock::Unknown(UnknownReportBlock {
                        block_type,
                        type_specific,
                        body,
                    }));
                }
            }
        }

        Ok(ExtendedReport {
            sender_ssrc,
            reports,
        })
    }
}
