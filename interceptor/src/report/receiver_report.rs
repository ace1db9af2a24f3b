use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::receiver_stream::ReceiverStreamStats;
use super::DEFAULT_REPORT_INTERVAL;
use crate::stream_info::StreamInfo;
use crate::{
    Attributes, Interceptor, InterceptorBuilder, RTCPReader, RTCPWriter, RTPReader, RTPWriter,
    Result, ATTR_ARRIVAL_TIME_NANOS,
};

#[derive(Default)]
pub struct ReceiverReportBuilder {
    pub interval: Option<Duration>,
}

impl InterceptorBuilder for ReceiverReportBuilder {
    fn build(&self, _id: &str) -> Result<Arc<dyn Interceptor + Send + Sync>> {
        Ok(Arc::new(ReceiverReport {
            interval: self.interval.unwrap_or(DEFAULT_REPORT_INTERVAL),
            streams: Arc::new(Mutex::new(HashMap::new())),
            ssrc: rand::random::<u32>(),
            timer: Mutex::new(None),
        }))
    }
}

// ReceiverReport emits RTCP receiver reports for every inbound stream on
// a fixed cadence, with the RFC 3550 jitter and loss accounting.
pub struct ReceiverReport {
    interval: Duration,
    streams: Arc<Mutex<HashMap<u32, ReceiverStreamStats>>>,
    ssrc: u32,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl ReceiverReport {
    pub fn builder() -> ReceiverReportBuilder {
        ReceiverReportBuilder::default()
    }
}

#[async_trait]
impl Interceptor for ReceiverReport {
    // Incoming SRs feed the LSR/DLSR fields of the next RR.
    async fn bind_rtcp_reader(
        &self,
        reader: Arc<dyn RTCPReader + Send + Sync>,
    ) -> Arc<dyn RTCPReader + Send + Sync> {
        Arc::new(ReceiverReportRtcpReader {
            streams: self.streams.clone(),
            reader,
        })
    }

    async fn bind_rtcp_writer(
        &self,
        writer: Arc<dyn RTCPWriter + Send + Sync>,
    ) -> Arc<dyn RTCPWriter + Send + Sync> {
        let streams = self.streams.clone();
        let interval = self.interval;
        let ssrc = self.ssrc;
        let writer2 = writer.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let now = SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .unwrap_or(Duration::ZERO);
                let reports = {
                    let mut streams = streams.lock().await;
                    streams
                        .values_mut()
                        .map(|s| {
                            s.build_report(
                                now.as_secs() as u32,
                                ((now.subsec_nanos() as u64 * 65536) / 1_000_000_000) as u32,
                            )
                        })
                        .collect::<Vec<_>>()
                };
                if reports.is_empty() {
                    continue;
                }
                let rr = rtcp::receiver_report::ReceiverReport {
                    ssrc,
                    reports,
                    profile_extensions: vec![],
                };
                let pkts: Vec<Box<dyn rtcp::packet::Packet + Send + Sync>> = vec![Box::new(rr)];
                if writer2.write(&pkts, &Attributes::new()).await.is_err() {
                    return;
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
        self.streams.lock().await.insert(
            info.ssrc,
            ReceiverStreamStats::new(info.ssrc, info.clock_rate),
        );
        Arc::new(ReceiverReportStream {
            streams: self.streams.clone(),
            ssrc: info.ssrc,
            clock_rate: info.clock_rate,
            reader,
        })
    }

    async fn unbind_remote_stream(&self, info: &StreamInfo) {
        self.streams.lock().await.remove(&info.ssrc);
    }

    async fn close(&self) -> Result<()> {
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}

struct ReceiverReportStream {
    streams: Arc<Mutex<HashMap<u32, ReceiverStreamStats>>>,
    ssrc: u32,
    clock_rate: u32,
    reader: Arc<dyn RTPReader + Send + Sync>,
}

#[async_trait]
impl RTPReader for ReceiverReportStream {
    async fn read(&self, attributes: &Attributes) -> Result<(rtp::packet::Packet, Attributes)> {
        let (packet, attr) = self.reader.read(attributes).await?;

        // Arrival time in clock-rate units; falls back to now when the
        // transport did not stamp it.
        let arrival_nanos = attr.get(ATTR_ARRIVAL_TIME_NANOS).copied().unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_nanos() as u64
        });
        let arrival_ts = arrival_nanos as u128 * self.clock_rate as u128 / 1_000_000_000;

        {
            let mut streams = self.streams.lock().await;
            if let Some(stats) = streams.get_mut(&self.ssrc) {
                stats.record(
                    packet.header.sequence_number,
                    packet.header.timestamp,
                    arrival_ts as u64,
                );
            }
        }

        Ok((packet, attr))
    }
}

struct ReceiverReportRtcpReader {
    streams: Arc<Mutex<HashMap<u32, ReceiverStreamStats>>>,
    reader: Arc<dyn RTCPReader + Send + Sync>,
}

#[async_trait]
impl RTCPReader for ReceiverReportRtcpReader {
    async fn read(
        &self,
        attributes: &Attributes,
    ) -> Result<(Vec<Box<dyn rtcp::packet::Packet + Send + Sync>>, Attributes)> {
        let (pkts, attr) = self.reader.read(attributes).await?;

        for p in &pkts {
            if let Some(sr) = p.as_any().downcast_ref::<rtcp::sender_report::SenderReport>() {
                let arrival = SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .unwrap_or(Duration::ZERO)
                    .as_secs_f64();
                let mut streams = self.streams.lock().await;
                if let Some(stats) = streams.get_mut(&sr.ssrc) {
                    stats.record_sender_report(sr.ntp_time, arrival);
                }
            }
        }

        Ok((pkts, attr))
    }
}
