#[cfg(test)]
mod track_test;

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use interceptor::{Attributes, RTPWriter};
use log::trace;
use rtp::packetizer::Depacketizer;
use tokio::sync::{mpsc, Mutex};

use crate::api::media_engine::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType, MIME_TYPE_AV1, MIME_TYPE_H264,
    MIME_TYPE_OPUS, MIME_TYPE_VP8, MIME_TYPE_VP9,
};
use crate::error::{Error, Result};

type SourceChangeHandler = Arc<dyn Fn(u8) + Send + Sync>;

// TrackBinding attaches a local track to a negotiated sender.
pub(crate) struct TrackBinding {
    pub(crate) ssrc: u32,
    pub(crate) payload_type: u8,
    pub(crate) writer: Arc<dyn RTPWriter + Send + Sync>,
}

// TrackLocalStaticRTP accepts caller-produced RTP and forwards it down
// the sender's pipeline, rewriting payload type and SSRC to the
// negotiated values.
pub struct TrackLocalStaticRTP {
    pub id: String,
    pub stream_id: String,
    pub codec: RTCRtpCodecCapability,
    binding: Mutex<Option<TrackBinding>>,
    // Payload type seen on incoming packets; a change means the source
    // feeding this track was switched.
    last_source_payload_type: AtomicU8,
    on_source_change: Mutex<Option<SourceChangeHandler>>,
    packets_written: AtomicU64,
    packets_dropped_unbound: AtomicU64,
}

impl TrackLocalStaticRTP {
    pub fn new(codec: RTCRtpCodecCapability, id: String, stream_id: String) -> Arc<Self> {
        Arc::new(TrackLocalStaticRTP {
            id,
            stream_id,
            codec,
            binding: Mutex::new(None),
            last_source_payload_type: AtomicU8::new(0xFF),
            on_source_change: Mutex::new(None),
            packets_written: AtomicU64::new(0),
            packets_dropped_unbound: AtomicU64::new(0),
        })
    }

    pub fn kind(&self) -> RTPCodecType {
        if self.codec.mime_type.starts_with("audio/") {
            RTPCodecType::Audio
        } else {
            RTPCodecType::Video
        }
    }

    pub(crate) async fn bind(&self, binding: TrackBinding) {
        *self.binding.lock().await = Some(binding);
    }

    pub(crate) async fn unbind(&self) {
        *self.binding.lock().await = None;
    }

    // on_source_change fires when the incoming payload type flips,
    // letting downstream reset depacketizer and jitter state.
    pub async fn on_source_change(&self, handler: SourceChangeHandler) {
        *self.on_source_change.lock().await = Some(handler);
    }

    // write_rtp is the fast path: payload type and SSRC rewrite plus one
    // pipeline call, no per-packet allocation beyond the clone the
    // pipeline needs.
    pub async fn write_rtp(&self, packet: &rtp::packet::Packet) -> Result<usize> {
        let incoming_pt = packet.header.payload_type;
        let last = self
            .last_source_payload_type
            .swap(incoming_pt, Ordering::SeqCst);
        if last != 0xFF && last != incoming_pt {
            if let Some(handler) = self.on_source_change.lock().await.as_ref() {
                handler(incoming_pt);
            }
        }

        let guard = self.binding.lock().await;
        let Some(binding) = guard.as_ref() else {
            // Not negotiated yet; the packet has nowhere to go.
            self.packets_dropped_unbound.fetch_add(1, Ordering::SeqCst);
            return Ok(0);
        };

        let mut outbound = packet.clone();
        outbound.header.payload_type = binding.payload_type;
        outbound.header.ssrc = binding.ssrc;

        let n = binding.writer.write(&outbound, &Attributes::new()).await?;
        self.packets_written.fetch_add(1, Ordering::SeqCst);
        Ok(n)
    }

    // write accepts already-marshaled RTP bytes.
    pub async fn write(&self, raw: &[u8]) -> Result<usize> {
        use util::marshal::Unmarshal;
        let mut buf = raw;
        let packet = rtp::packet::Packet::unmarshal(&mut buf).map_err(Error::from)?;
        self.write_rtp(&packet).await
    }
}

// TrackRemote surfaces one inbound SSRC: raw packets in post-chain
// arrival order, or depacketized samples through the jitter buffer.
pub struct TrackRemote {
    pub id: String,
    pub ssrc: u32,
    kind: RTPCodecType,
    codec: Mutex<RTCRtpCodecParameters>,
    rx: Mutex<mpsc::Receiver<rtp::packet::Packet>>,

    jitter: Mutex<media::jitter_buffer::JitterBuffer>,
    depacketizer: Mutex<Box<dyn Depacketizer + Send + Sync>>,
    // Partially assembled access unit.
    assembling: Mutex<AssemblyState>,
    last_payload_type: AtomicU8,
    pub packets_lost_events: AtomicU64,
}

#[derive(Default)]
struct AssemblyState {
    data: Vec<u8>,
    first_timestamp: u32,
    dropped_before: u16,
}

const DEFAULT_JITTER_LATENCY_MS: u32 = 100;

fn depacketizer_for(mime: &str) -> Box<dyn Depacketizer + Send + Sync> {
    if mime.eq_ignore_ascii_case(MIME_TYPE_VP8) {
        Box::new(rtp::codecs::vp8::Vp8Packet::default())
    } else if mime.eq_ignore_ascii_case(MIME_TYPE_VP9) {
        Box::new(rtp::codecs::vp9::Vp9Packet::default())
    } else if mime.eq_ignore_ascii_case(MIME_TYPE_H264) {
        Box::new(rtp::codecs::h264::H264Packet::default())
    } else if mime.eq_ignore_ascii_case(MIME_TYPE_AV1) {
        Box::new(rtp::codecs::av1::Av1Packet::default())
    } else if mime.eq_ignore_ascii_case(MIME_TYPE_OPUS) {
        Box::new(rtp::codecs::opus::OpusPacket::default())
    } else {
        Box::new(rtp::codecs::opus::OpusPacket::default())
    }
}

impl TrackRemote {
    pub(crate) fn new(
        id: String,
        ssrc: u32,
        kind: RTPCodecType,
        codec: RTCRtpCodecParameters,
        rx: mpsc::Receiver<rtp::packet::Packet>,
    ) -> Arc<Self> {
        let clock_rate = codec.capability.clock_rate.max(1);
        let mime = codec.capability.mime_type.clone();
        Arc::new(TrackRemote {
            id,
            ssrc,
            kind,
            codec: Mutex::new(codec),
            rx: Mutex::new(rx),
            jitter: Mutex::new(media::jitter_buffer::JitterBuffer::new(
                DEFAULT_JITTER_LATENCY_MS,
                clock_rate,
            )),
            depacketizer: Mutex::new(depacketizer_for(&mime)),
            assembling: Mutex::new(AssemblyState::default()),
            last_payload_type: AtomicU8::new(0xFF),
            packets_lost_events: AtomicU64::new(0),
        })
    }

    pub fn kind(&self) -> RTPCodecType {
        self.kind
    }

    pub async fn codec(&self) -> RTCRtpCodecParameters {
        self.codec.lock().await.clone()
    }

    // read_rtp returns packets in post-interceptor arrival order.
    pub async fn read_rtp(&self) -> Result<rtp::packet::Packet> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(Error::ErrConnectionClosed)
    }

    // source_change_reset drops jitter and depacketizer state after the
    // sending side switched sources.
    async fn source_change_reset(&self, clock_rate: u32, mime: &str) {
        *self.jitter.lock().await =
            media::jitter_buffer::JitterBuffer::new(DEFAULT_JITTER_LATENCY_MS, clock_rate);
        *self.depacketizer.lock().await = depacketizer_for(mime);
        *self.assembling.lock().await = AssemblyState::default();
        trace!("track {}: source change, depacketizer reset", self.ssrc);
    }

    // read_sample drives packets through the jitter buffer and
    // depacketizer until one access unit completes. Declared losses are
    // surfaced in the sample's dropped counter rather than as errors.
    pub async fn read_sample(&self) -> Result<media::Sample> {
        loop {
            let packet = self.read_rtp().await?;

            // Payload type change on the same SSRC is a source change.
            let pt = packet.header.payload_type;
            let last = self.last_payload_type.swap(pt, Ordering::SeqCst);
            if last != 0xFF && last != pt {
                let codec = self.codec.lock().await.clone();
                self.source_change_reset(
                    codec.capability.clock_rate.max(1),
                    &codec.capability.mime_type,
                )
                .await;
            }

            let events = self.jitter.lock().await.push(packet);
            for event in events {
                match event {
                    media::jitter_buffer::JitterBufferEvent::Packet(p) => {
                        if let Some(sample) = self.consume_packet(p).await? {
                            return Ok(sample);
                        }
                    }
                    media::jitter_buffer::JitterBufferEvent::PacketLost { from, to } => {
                        self.packets_lost_events.fetch_add(1, Ordering::SeqCst);
                        let lost = to.wrapping_sub(from).wrapping_add(1);
                        let mut assembling = self.assembling.lock().await;
                        // A loss inside an access unit invalidates it.
                        assembling.data.clear();
                        assembling.dropped_before =
                            assembling.dropped_before.saturating_add(lost);
                    }
                    media::jitter_buffer::JitterBufferEvent::Eol => {
                        return Err(Error::ErrConnectionClosed);
                    }
                }
            }
        }
    }

    async fn consume_packet(&self, packet: rtp::packet::Packet) -> Result<Option<media::Sample>> {
        let mut depacketizer = self.depacketizer.lock().await;
        let data = depacketizer
            .depacketize(&packet.payload)
            .map_err(Error::from)?;
        let is_tail = depacketizer.is_partition_tail(packet.header.marker, &packet.payload);
        drop(depacketizer);

        let mut assembling = self.assembling.lock().await;
        if assembling.data.is_empty() {
            assembling.first_timestamp = packet.header.timestamp;
        }
        assembling.data.extend_from_slice(&data);

        if is_tail && !assembling.data.is_empty() {
            let sample = media::Sample {
                data: Bytes::from(std::mem::take(&mut assembling.data)),
                timestamp: std::time::SystemTime::now(),
                duration: std::time::Duration::ZERO,
                packet_timestamp: assembling.first_timestamp,
                prev_dropped_packets: std::mem::take(&mut assembling.dropped_before),
                prev_padding_packets: 0,
            };
            return Ok(Some(sample));
        }
        Ok(None)
    }
}
