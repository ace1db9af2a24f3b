use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use interceptor::{Attributes, RTPWriter};

use super::*;
use crate::api::media_engine::MIME_TYPE_VP8;

struct CountingWriter {
    count: AtomicU32,
    last_pt: AtomicU32,
    last_ssrc: AtomicU32,
}

#[async_trait]
impl RTPWriter for CountingWriter {
    async fn write(
        &self,
        pkt: &rtp::packet::Packet,
        _attributes: &Attributes,
    ) -> interceptor::Result<usize> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.last_pt
            .store(pkt.header.payload_type as u32, Ordering::SeqCst);
        self.last_ssrc.store(pkt.header.ssrc, Ordering::SeqCst);
        Ok(pkt.payload.len())
    }
}

fn vp8_codec() -> RTCRtpCodecCapability {
    RTCRtpCodecCapability {
        mime_type: MIME_TYPE_VP8.to_owned(),
        clock_rate: 90000,
        ..Default::default()
    }
}

fn packet(pt: u8, ssrc: u32) -> rtp::packet::Packet {
    rtp::packet::Packet {
        header: rtp::header::Header {
            version: 2,
            payload_type: pt,
            ssrc,
            sequence_number: 1,
            ..Default::default()
        },
        payload: bytes::Bytes::from_static(&[0x10, 0x00, 0x01, 0x02]),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_unbound_track_drops() {
    let track = TrackLocalStaticRTP::new(vp8_codec(), "video".to_owned(), "stream".to_owned());
    let n = track.write_rtp(&packet(100, 1)).await.unwrap();
    assert_eq!(n, 0);
    assert_eq!(track.packets_dropped_unbound.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bound_track_rewrites_pt_and_ssrc() {
    let track = TrackLocalStaticRTP::new(vp8_codec(), "video".to_owned(), "stream".to_owned());
    let writer = Arc::new(CountingWriter {
        count: AtomicU32::new(0),
        last_pt: AtomicU32::new(0),
        last_ssrc: AtomicU32::new(0),
    });
    track
        .bind(TrackBinding {
            ssrc: 0xAABBCCDD,
            payload_type: 96,
            writer: writer.clone(),
        })
        .await;

    // The source uses its own payload type; the wire sees the negotiated
    // one and the sender SSRC.
    track.write_rtp(&packet(102, 7)).await.unwrap();
    assert_eq!(writer.count.load(Ordering::SeqCst), 1);
    assert_eq!(writer.last_pt.load(Ordering::SeqCst), 96);
    assert_eq!(writer.last_ssrc.load(Ordering::SeqCst), 0xAABBCCDD);
}

#[tokio::test]
async fn test_source_change_detection() {
    let track = TrackLocalStaticRTP::new(vp8_codec(), "video".to_owned(), "stream".to_owned());
    let changes = Arc::new(AtomicU32::new(0));
    let changes2 = changes.clone();
    track
        .on_source_change(Arc::new(move |_pt| {
            changes2.fetch_add(1, Ordering::SeqCst);
        }))
        .await;

    track.write_rtp(&packet(100, 1)).await.unwrap();
    track.write_rtp(&packet(100, 1)).await.unwrap();
    assert_eq!(changes.load(Ordering::SeqCst), 0);

    // Same track, new payload type: a source switch.
    track.write_rtp(&packet(101, 1)).await.unwrap();
    assert_eq!(changes.load(Ordering::SeqCst), 1);
}
