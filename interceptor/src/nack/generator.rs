use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rtcp::transport_feedbacks::transport_layer_nack::{
    nack_pairs_from_sequence_numbers, TransportLayerNack,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{stream_support_nack, ReceiveLog};
use crate::stream_info::StreamInfo;
use crate::{
    Attributes, Interceptor, InterceptorBuilder, RTCPReader, RTCPWriter, RTPReader, RTPWriter,
    Result,
};

const DEFAULT_LOG_SIZE: u16 = 512;
const DEFAULT_SKIP_LAST_N: u16 = 0;
const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

// GeneratorBuilder configures the receive-side NACK generator.
#[derive(Default)]
pub struct GeneratorBuilder {
    pub log_size: Option<u16>,
    pub skip_last_n: Option<u16>,
    pub interval: Option<Duration>,
}

impl InterceptorBuilder for GeneratorBuilder {
    fn build(&self, _id: &str) -> Result<Arc<dyn Interceptor + Send + Sync>> {
        Ok(Arc::new(Generator {
            log_size: self.log_size.unwrap_or(DEFAULT_LOG_SIZE),
            skip_last_n: self.skip_last_n.unwrap_or(DEFAULT_SKIP_LAST_N),
            interval: self.interval.unwrap_or(DEFAULT_INTERVAL),
            receive_logs: Arc::new(Mutex::new(HashMap::new())),
            sender_ssrc: rand::random::<u32>(),
            timer: Mutex::new(None),
        }))
    }
}

// Generator watches remote streams for sequence gaps and emits generic
// NACKs on a fixed cadence until the gaps close or age out.
pub struct Generator {
    log_size: u16,
    skip_last_n: u16,
    interval: Duration,
    receive_logs: Arc<Mutex<HashMap<u32, ReceiveLog>>>,
    sender_ssrc: u32,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Generator {
    pub fn builder() -> GeneratorBuilder {
        GeneratorBuilder::default()
    }
}

#[async_trait]
impl Interceptor for Generator {
    async fn bind_rtcp_reader(
        &self,
        reader: Arc<dyn RTCPReader + Send + Sync>,
    ) -> Arc<dyn RTCPReader + Send + Sync> {
        reader
    }

    // The NACK emission loop starts once the session's RTCP writer is
    // known.
    async fn bind_rtcp_writer(
        &self,
        writer: Arc<dyn RTCPWriter + Send + Sync>,
    ) -> Arc<dyn RTCPWriter + Send + Sync> {
        let receive_logs = self.receive_logs.clone();
        let interval = self.interval;
        let skip_last_n = self.skip_last_n;
        let sender_ssrc = self.sender_ssrc;
        let writer2 = writer.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let mut nacks = vec![];
                {
                    let logs = receive_logs.lock().await;
                    for (ssrc, log) in logs.iter() {
                        let missing = log.missing_seq_numbers(skip_last_n);
                        if !missing.is_empty() {
                            nacks.push(TransportLayerNack {
                                sender_ssrc,
                                media_ssrc: *ssrc,
                                nacks: nack_pairs_from_sequence_numbers(&missing),
                            });
                        }
                    }
                }
                for nack in nacks {
                    let pkts: Vec<Box<dyn rtcp::packet::Packet + Send + Sync>> =
                        vec![Box::new(nack)];
                    if writer2.write(&pkts, &Attributes::new()).await.is_err() {
                        return;
                    }
                }
            }
        });
        *self.timer.lock().await = Some(handle);

        writer
    }

    async fn bind_local_stream(
        &self,
        _info: &StreamInfo,
        writer: Arc<dyn RTPWriter + Send + Sync>,
    ) -> Arc<dyn RTPWriter + Send + Sync> {
        writer
    }

    async fn unbind_local_stream(&self, _info: &StreamInfo) {}

    async fn bind_remote_stream(
        &self,
        info: &StreamInfo,
        reader: Arc<dyn RTPReader + Send + Sync>,
    ) -> Arc<dyn RTPReader + Send + Sync> {
        if !stream_support_nack(info) {
            return reader;
        }

        if let Ok(log) = ReceiveLog::new(self.log_size) {
            self.receive_logs.lock().await.insert(info.ssrc, log);
        }

        Arc::new(GeneratorStream {
            parent_logs: self.receive_logs.clone(),
            ssrc: info.ssrc,
            reader,
        })
    }

    async fn unbind_remote_stream(&self, info: &StreamInfo) {
        self.receive_logs.lock().await.remove(&info.ssrc);
    }

    async fn close(&self) -> Result<()> {
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}

struct GeneratorStream {
    parent_logs: Arc<Mutex<HashMap<u32, ReceiveLog>>>,
    ssrc: u32,
    reader: Arc<dyn RTPReader + Send + Sync>,
}

#[async_trait]
impl RTPReader for GeneratorStream {
    async fn read(&self, attributes: &Attributes) -> Result<(rtp::packet::Packet, Attributes)> {
        let (packet, attr) = self.reader.read(attributes).await?;
        {
            let mut logs = self.parent_logs.lock().await;
            if let Some(log) = logs.get_mut(&self.ssrc) {
                log.add(packet.header.sequence_number);
            }
        }
        Ok((packet, attr))
    }
}
