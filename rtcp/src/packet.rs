#[cfg(test)]
mod packet_test {
    use bytes::Bytes;

    use super::*;
    use crate::payload_feedbacks::picture_loss_indication::PictureLossIndication;
    use crate::receiver_report::ReceiverReport;

    #[test]
    fn test_unmarshal_compound_stream() {
        let rr = ReceiverReport {
            ssrc: 0x902f9e2e,
            ..Default::default()
        };
        let pli = PictureLossIndication {
            sender_ssrc: 0x902f9e2e,
            media_ssrc: 0x902f9e2e,
        };
        let mut raw = Vec::new();
        raw.extend_from_slice(&rr.marshal().unwrap());
        raw.extend_from_slice(&pli.marshal().unwrap());

        let mut buf = Bytes::from(raw);
        let packets = unmarshal(&mut buf).unwrap();
        assert_eq!(packets.len(), 2);
        assert!(packets[0]
            .as_any()
            .downcast_ref::<ReceiverReport>()
            .is_some());
        assert!(packets[1]
            .as_any()
            .downcast_ref::<PictureLossIndication>()
            .is_some());
    }

    #[test]
    fn test_unmarshal_empty_errors() {
        let mut buf = Bytes::new();
        assert!(unmarshal(&mut buf).is_err());
    }
}

use std::any::Any;
use std::fmt;

use bytes::{Buf, Bytes, BytesMut};
use util::marshal::{Marshal, MarshalSize, Unmarshal};

use crate::error::Error;
use crate::extended_report::ExtendedReport;
use crate::goodbye::Goodbye;
use crate::header::*;
use crate::payload_feedbacks::full_intra_request::FullIntraRequest;
use crate::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use crate::payload_feedbacks::receiver_estimated_maximum_bitrate::ReceiverEstimatedMaximumBitrate;
use crate::raw_packet::RawPacket;
use crate::receiver_report::ReceiverReport;
use crate::sender_report::SenderReport;
use crate::source_description::SourceDescription;
use crate::transport_feedbacks::transport_layer_cc::TransportLayerCc;
use crate::transport_feedbacks::transport_layer_nack::TransportLayerNack;

// Packet is the interface shared by all RTCP packet kinds.
pub trait Packet: Marshal + fmt::Display + fmt::Debug {
    fn header(&self) -> Header;
    // destination_ssrc returns the SSRCs this packet refers to.
    fn destination_ssrc(&self) -> Vec<u32>;
    fn raw_size(&self) -> usize;
    fn as_any(&self) -> &(dyn Any + Send + Sync);
    fn equal(&self, other: &(dyn Packet + Send + Sync)) -> bool;
    fn cloned(&self) -> Box<dyn Packet + Send + Sync>;
}

impl PartialEq for dyn Packet + Send + Sync {
    fn eq(&self, other: &Self) -> bool {
        self.equal(other)
    }
}

impl Clone for Box<dyn Packet + Send + Sync> {
    fn clone(&self) -> Self {
        self.cloned()
    }
}

// marshal serializes packets back to back into one buffer, the form they
// take inside a compound SRTCP payload.
pub fn marshal(packets: &[Box<dyn Packet + Send + Sync>]) -> std::result::Result<Bytes, util::Error> {
    let mut out = BytesMut::new();
    for p in packets {
        let data = p.marshal()?;
        out.extend(data);
    }
    Ok(out.freeze())
}

// unmarshal parses every RTCP packet out of a compound buffer.
pub fn unmarshal<B>(raw_data: &mut B) -> std::result::Result<Vec<Box<dyn Packet + Send + Sync>>, util::Error>
where
    B: Buf,
{
    let mut packets = vec![];
    while raw_data.has_remaining() {
        let p = unmarshaller(raw_data)?;
        packets.push(p);
    }

    match packets.len() {
        0 => Err(Error::PacketTooShort.into()),
        _ => Ok(packets),
    }
}

// unmarshaller pulls one RTCP packet off the front of raw_data.
pub(crate) fn unmarshaller<B>(
    raw_data: &mut B,
) -> std::result::Result<Box<dyn Packet + Send + Sync>, util::Error>
where
    B: Buf,
{
    if raw_data.remaining() < HEADER_LENGTH {
        return Err(Error::PacketTooShort.into());
    }

    // Take the header first to learn the full packet length.
    let header_bytes = raw_data.copy_to_bytes(HEADER_LENGTH);
    let header = Header::unmarshal(&mut header_bytes.clone())?;

    let body_len = header.length as usize * 4;
    if raw_data.remaining() < body_len {
        return Err(Error::PacketTooShort.into());
    }

    let mut whole = BytesMut::with_capacity(HEADER_LENGTH + body_len);
    whole.extend_from_slice(&header_bytes);
    whole.extend_from_slice(&raw_data.copy_to_bytes(body_len));
    let mut whole = whole.freeze();
    let buf = &mut whole;

    let packet: Box<dyn Packet + Send + Sync> = match header.packet_type {
        PacketType::SenderReport => Box::new(SenderReport::unmarshal(buf)?),
        PacketType::ReceiverReport => Box::new(ReceiverReport::unmarshal(buf)?),
        PacketType::SourceDescription => Box::new(SourceDescription::unmarshal(buf)?),
        PacketType::Goodbye => Box::new(Goodbye::unmarshal(buf)?),
        PacketType::ExtendedReport => Box::new(ExtendedReport::unmarshal(buf)?),
        PacketType::TransportSpecificFeedback => match header.count {
            FORMAT_TLN => Box::new(TransportLayerNack::unmarshal(buf)?),
            FORMAT_TCC => Box::new(TransportLayerCc::unmarshal(buf)?),
            _ => Box::new(RawPacket::unmarshal(buf)?),
        },
        PacketType::PayloadSpecificFeedback => match header.count {
            FORMAT_PLI => Box::new(PictureLossIndication::unmarshal(buf)?),
            FORMAT_FIR => Box::new(FullIntraRequest::unmarshal(buf)?),
            FORMAT_REMB => Box::new(ReceiverEstimatedMaximumBitrate::unmarshal(buf)?),
            _ => Box::new(RawPacket::unmarshal(buf)?),
        },
        _ => Box::new(RawPacket::unmarshal(buf)?),
    };

    Ok(packet)
}
