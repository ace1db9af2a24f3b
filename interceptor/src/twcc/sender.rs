use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use util::marshal::Marshal;

use crate::stream_info::{StreamInfo, TRANSPORT_CC_URI};
use crate::{
    Attributes, Interceptor, InterceptorBuilder, RTCPReader, RTCPWriter, RTPReader, RTPWriter,
    Result,
};

#[derive(Default)]
pub struct SenderBuilder {}

impl InterceptorBuilder for SenderBuilder {
    fn build(&self, _id: &str) -> Result<Arc<dyn Interceptor + Send + Sync>> {
        Ok(Arc::new(Sender {
            next_sequence: Arc::new(AtomicU16::new(rand::random::<u16>())),
        }))
    }
}

// Sender stamps outgoing packets with the transport-wide sequence number
// header extension. The counter is shared across every stream of the
// session, which is the whole point of transport-wide feedback.
pub struct Sender {
    next_sequence: Arc<AtomicU16>,
}

impl Sender {
    pub fn builder() -> SenderBuilder {
        SenderBuilder::default()
    }
}

#[async_trait]
impl Interceptor for Sender {
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
        writer
    }

    async fn bind_local_stream(
        &self,
        info: &StreamInfo,
        writer: Arc<dyn RTPWriter + Send + Sync>,
    ) -> Arc<dyn RTPWriter + Send + Sync> {
        let Some(ext_id) = info.header_extension_id(TRANSPORT_CC_URI) else {
            return writer;
        };

        Arc::new(SenderStream {
            next_sequence: self.next_sequence.clone(),
            ext_id: ext_id as u8,
            writer,
        })
    }

    async fn unbind_local_stream(&self, _info: &StreamInfo) {}

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

struct SenderStream {
    next_sequence: Arc<AtomicU16>,
    ext_id: u8,
    writer: Arc<dyn RTPWriter + Send + Sync>,
}

#[async_trait]
impl RTPWriter for SenderStream {
    async fn write(&self, pkt: &rtp::packet::Packet, attributes: &Attributes) -> Result<usize> {
        let seq = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let ext = rtp::extension::transport_cc_extension::TransportCcExtension {
            transport_sequence: seq,
        };
        let payload = ext.marshal().map_err(|e| crate::Error::Rtp(e.to_string()))?;

        let mut stamped = pkt.clone();
        stamped
            .header
            .set_extension(self.ext_id, &payload)
            .map_err(|e| crate::Error::Rtp(e.to_string()))?;
        self.writer.write(&stamped, attributes).await
    }
}
