use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::sender_stream::SenderStreamStats;
use super::DEFAULT_REPORT_INTERVAL;
use crate::stream_info::StreamInfo;
use crate::{
    Attributes, Interceptor, InterceptorBuilder, RTCPReader, RTCPWriter, RTPReader, RTPWriter,
    Result,
};

#[derive(Default)]
pub struct SenderReportBuilder {
    pub interval: Option<Duration>,
}

impl InterceptorBuilder for SenderReportBuilder {
    fn build(&self, _id: &str) -> Result<Arc<dyn Interceptor + Send + Sync>> {
        Ok(Arc::new(SenderReport {
            interval: self.interval.unwrap_or(DEFAULT_REPORT_INTERVAL),
            streams: Arc::new(Mutex::new(HashMap::new())),
            timer: Mutex::new(None),
        }))
    }
}

// SenderReport emits RTCP sender reports for every outbound stream.
pub struct SenderReport {
    interval: Duration,
    streams: Arc<Mutex<HashMap<u32, SenderStreamStats>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl SenderReport {
    pub fn builder() -> SenderReportBuilder {
        SenderReportBuilder::default()
    }
}

#[async_trait]
impl Interceptor for SenderReport {
    async fn bind_rtcp_reader(
        &self,
        reader: Arc<dyn RTCPReader + Send + Sync>,
    ) -> Arc<dyn RTCPReader + Send + Sync> {
        reader
    }

    async fn bind_rtcp_writer(
        &self,
        writer: Arc<dyn RTCPWriter + Send + Sync>,
    ) -> Arc<dyn RTCPWriter + Send + Sync> {
        let streams = self.streams.clone();
        let interval = self.interval;
        let writer2 = writer.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let now = SystemTime::now();
                let reports = {
                    let streams = streams.lock().await;
                    streams
                        .values()
                        .filter(|s| s.packet_count > 0)
                        .map(|s| s.build_report(now))
                        .collect::<Vec<_>>()
                };
                for sr in reports {
                    let pkts: Vec<Box<dyn rtcp::packet::Packet + Send + Sync>> =
                        vec![Box::new(sr)];
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
        info: &StreamInfo,
        writer: Arc<dyn RTPWriter + Send + Sync>,
    ) -> Arc<dyn RTPWriter + Send + Sync> {
        self.streams.lock().await.insert(
            info.ssrc,
            SenderStreamStats::new(info.ssrc, info.clock_rate),
        );
        Arc::new(SenderReportStream {
            streams: self.streams.clone(),
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
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}

struct SenderReportStream {
    streams: Arc<Mutex<HashMap<u32, SenderStreamStats>>>,
    ssrc: u32,
    writer: Arc<dyn RTPWriter + Send + Sync>,
}

#[async_trait]
impl RTPWriter for SenderReportStream {
    async fn write(&self, pkt: &rtp::packet::Packet, attributes: &Attributes) -> Result<usize> {
        {
            let mut streams = self.streams.lock().await;
            if let Some(stats) = streams.get_mut(&self.ssrc) {
                stats.record(pkt.header.timestamp, pkt.payload.len(), SystemTime::now());
            }
        }
        self.writer.write(pkt, attributes).await
    }
}
