use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::trace;
use rtcp::transport_feedbacks::transport_layer_nack::TransportLayerNack;
use tokio::sync::Mutex;

use super::{stream_support_nack, SendBuffer};
use crate::stream_info::StreamInfo;
use crate::{
    Attributes, Interceptor, InterceptorBuilder, RTCPReader, RTCPWriter, RTPReader, RTPWriter,
    Result,
};

const DEFAULT_BUFFER_SIZE: u16 = 1024;
// Per-SSRC retransmission budget, refilled every window.
const MAX_RETRANSMITS_PER_WINDOW: usize = 256;
const RATE_WINDOW: Duration = Duration::from_secs(1);

// ResponderBuilder configures the send-side NACK responder.
#[derive(Default)]
pub struct ResponderBuilder {
    pub buffer_size: Option<u16>,
}

impl InterceptorBuilder for ResponderBuilder {
    fn build(&self, _id: &str) -> Result<Arc<dyn Interceptor + Send + Sync>> {
        Ok(Arc::new(Responder {
            size: self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
            streams: Arc::new(Mutex::new(HashMap::new())),
        }))
    }
}

struct ResponderStreamState {
    send_buffer: SendBuffer,
    writer: Arc<dyn RTPWriter + Send + Sync>,
    info: StreamInfo,
    // RTX state: its own sequence space on the repair SSRC.
    rtx_sequence: u16,
    window_start: Instant,
    window_sent: usize,
}

// Responder answers incoming generic NACKs with retransmissions from a
// bounded history, as RTX packets when an apt pairing was negotiated or
// in-band otherwise.
pub struct Responder {
    size: u16,
    streams: Arc<Mutex<HashMap<u32, ResponderStreamState>>>,
}

impl Responder {
    pub fn builder() -> ResponderBuilder {
        ResponderBuilder::default()
    }
}

#[async_trait]
impl Interceptor for Responder {
    // NACKs arrive on the RTCP read path.
    async fn bind_rtcp_reader(
        &self,
        reader: Arc<dyn RTCPReader + Send + Sync>,
    ) -> Arc<dyn RTCPReader + Send + Sync> {
        Arc::new(ResponderRtcpReader {
            parent_streams: self.streams.clone(),
            reader,
        })
    }

    async fn bind_rtcp_writer(
        &self,
        writer: Arc<dyn RTCPWriter + Send + Sync>,
    ) -> Arc<dyn RTCPWriter + Send + Sync> {
        writer
    }

    async fn bind_local_stream(
        &self,
        info: &StreamInfo,
        writer: Arc<dyn RTPWriter + Send + Sync>,
    ) -> Arc<dyn RTPWriter + Send + Sync> {
        if !stream_support_nack(info) {
            return writer;
        }

        let Ok(send_buffer) = SendBuffer::new(self.size) else {
            return writer;
        };

        self.streams.lock().await.insert(
            info.ssrc,
            ResponderStreamState {
                send_buffer,
                writer: writer.clone(),
                info: info.clone(),
                rtx_sequence: rand::random::<u16>(),
                window_start: Instant::now(),
                window_sent: 0,
            },
        );

        Arc::new(ResponderStream {
            parent_streams: self.streams.clone(),
            ssrc: info.ssrc,
            writer,
        })
    }

    async fn unbind_local_stream(&self, info: &StreamInfo) {
        self.streams.lock().await.remove(&info.ssrc);
    }

    async fn bind_remote_stream(
        &self,
        _info: &StreamInfo,
        reader: Arc<dyn RTPReader + Send + Sync>,
    ) -> Arc<dyn RTPReader + Send + Sync> {
        reader
    }

    async fn unbind_remote_stream(&self, _info: &StreamInfo) {}

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct ResponderStream {
    parent_streams: Arc<Mutex<HashMap<u32, ResponderStreamState>>>,
    ssrc: u32,
    writer: Arc<dyn RTPWriter + Send + Sync>,
}

#[async_trait]
impl RTPWriter for ResponderStream {
    async fn write(&self, pkt: &rtp::packet::Packet, attributes: &Attributes) -> Result<usize> {
        {
            let mut streams = self.parent_streams.lock().await;
            if let Some(state) = streams.get_mut(&self.ssrc) {
                state.send_buffer.add(pkt.clone());
            }
        }
        self.writer.write(pkt, attributes).await
    }
}

struct ResponderRtcpReader {
    parent_streams: Arc<Mutex<HashMap<u32, ResponderStreamState>>>,
    reader: Arc<dyn RTCPReader + Send + Sync>,
}

#[async_trait]
impl RTCPReader for ResponderRtcpReader {
    async fn read(
        &self,
        attributes: &Attributes,
    ) -> Result<(Vec<Box<dyn rtcp::packet::Packet + Send + Sync>>, Attributes)> {
        let (pkts, attr) = self.reader.read(attributes).await?;

        for p in &pkts {
            if let Some(nack) = p.as_any().downcast_ref::<TransportLayerNack>() {
                self.resend(nack).await?;
            }
        }

        Ok((pkts, attr))
    }
}

impl ResponderRtcpReader {
    async fn resend(&self, nack: &TransportLayerNack) -> Result<()> {
        let mut to_send: Vec<(rtp::packet::Packet, Attributes)> = vec![];
        {
            let mut streams = self.parent_streams.lock().await;
            let Some(state) = streams.get_mut(&nack.media_ssrc) else {
                return Ok(());
            };

            let now = Instant::now();
            if now.duration_since(state.window_start) > RATE_WINDOW {
                state.window_start = now;
                state.window_sent = 0;
            }

            for pair in &nack.nacks {
                for seq in pair.packet_list() {
                    if state.window_sent >= MAX_RETRANSMITS_PER_WINDOW {
                        trace!("nack responder rate cap hit for ssrc {}", nack.media_ssrc);
                        break;
                    }
                    let Some(original) = state.send_buffer.get(seq) else {
                        // Outside the retained history window.
                        continue;
                    };

                    let packet = if state.info.associated_ssrc != 0 {
                        // RFC 4588: repair packet on the RTX SSRC with the
                        // original sequence number prefixed.
                        let mut header = original.header.clone();
                        header.ssrc = state.info.associated_ssrc;
                        header.payload_type = state.info.rtx_payload_type;
                        header.sequence_number = state.rtx_sequence;
                        state.rtx_sequence = state.rtx_sequence.wrapping_add(1);
                        rtp::packet::Packet {
                            header,
                            payload: rtp::rtx::wrap_payload(
                                original.header.sequence_number,
                                &original.payload,
                            ),
                            padding_size: 0,
                        }
                    } else {
                        original.clone()
                    };
                    state.window_sent += 1;
                    to_send.push((packet, Attributes::new()));
                }
            }
        }

        // Send outside the lock.
        let writer = {
            let streams = self.parent_streams.lock().await;
            streams.get(&nack.media_ssrc).map(|s| s.writer.clone())
        };
        if let Some(writer) = writer {
            for (packet, attr) in to_send {
                let _ = writer.write(&packet, &attr).await;
            }
        }
        Ok(())
    }
}
