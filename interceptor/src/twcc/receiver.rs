use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use util::marshal::Unmarshal;

use super::Recorder;
use crate::stream_info::{StreamInfo, TRANSPORT_CC_URI};
use crate::{
    Attributes, Interceptor, InterceptorBuilder, RTCPReader, RTCPWriter, RTPReader, RTPWriter,
    Result,
};

// Feedback cadence; the draft floors this at 50 ms.
const DEFAULT_FEEDBACK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Default)]
pub struct ReceiverBuilder {
    pub interval: Option<Duration>,
}

impl InterceptorBuilder for ReceiverBuilder {
    fn build(&self, _id: &str) -> Result<Arc<dyn Interceptor + Send + Sync>> {
        Ok(Arc::new(Receiver {
            interval: self.interval.unwrap_or(DEFAULT_FEEDBACK_INTERVAL),
            recorder: Arc::new(Mutex::new(Recorder::new(rand::random::<u32>()))),
            timer: Mutex::new(None),
        }))
    }
}

// Receiver records transport-wide arrival times on inbound streams and
// emits TWCC feedback on a fixed cadence.
pub struct Receiver {
    interval: Duration,
    recorder: Arc<Mutex<Recorder>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Receiver {
    pub fn builder() -> ReceiverBuilder {
        ReceiverBuilder::default()
    }
}

#[async_trait]
impl Interceptor for Receiver {
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
        let recorder = self.recorder.clone();
        let interval = self.interval;
        let writer2 = writer.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let feedback = {
                    let mut recorder = recorder.lock().await;
                    recorder.build_feedback()
                };
                if let Some(cc) = feedback {
                    let pkts: Vec<Box<dyn rtcp::packet::Packet + Send + Sync>> =
                        vec![Box::new(cc)];
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
        let Some(ext_id) = info.header_extension_id(TRANSPORT_CC_URI) else {
            return reader;
        };

        Arc::new(ReceiverStream {
            recorder: self.recorder.clone(),
            ext_id: ext_id as u8,
            reader,
        })
    }

    async fn unbind_remote_stream(&self, _info: &StreamInfo) {}

    async fn close(&self) -> Result<()> {
        if let Some(handle) = self.timer.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }
}

struct ReceiverStream {
    recorder: Arc<Mutex<Recorder>>,
    ext_id: u8,
    reader: Arc<dyn RTPReader + Send + Sync>,
}

#[async_trait]
impl RTPReader for ReceiverStream {
    async fn read(&self, attributes: &Attributes) -> Result<(rtp::packet::Packet, Attributes)> {
        let (packet, attr) = self.reader.read(attributes).await?;

        if let Some(raw) = packet.header.get_extension(self.ext_id) {
            let mut buf = raw;
            if let Ok(ext) =
                rtp::extension::transport_cc_extension::TransportCcExtension::unmarshal(&mut buf)
            {
                let arrival_us = SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .unwrap_or(Duration::ZERO)
                    .as_micros() as i64;
                let mut recorder = self.recorder.lock().await;
                recorder.record(packet.header.ssrc, ext.transport_sequence, arrival_us);
            }
        }

        Ok((packet, attr))
    }
}
