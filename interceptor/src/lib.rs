#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod chain;
pub mod error;
pub mod nack;
pub mod noop;
pub mod registry;
pub mod report;
pub mod stream_info;
pub mod twcc;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

pub use error::{Error, Result};
use stream_info::StreamInfo;

// Attributes travel alongside packets through the interceptor chain,
// carrying per-packet metadata such as arrival timestamps.
pub type Attributes = HashMap<&'static str, u64>;

pub const ATTR_ARRIVAL_TIME_NANOS: &str = "arrival_time_nanos";

// RTPWriter is the outbound half of a local stream pipeline.
#[async_trait]
pub trait RTPWriter: Send + Sync {
    async fn write(&self, pkt: &rtp::packet::Packet, attributes: &Attributes) -> Result<usize>;
}

// RTPReader is the inbound half of a remote stream pipeline.
#[async_trait]
pub trait RTPReader: Send + Sync {
    async fn read(&self, attributes: &Attributes) -> Result<(rtp::packet::Packet, Attributes)>;
}

// RTCPWriter sends RTCP packets towards the wire.
#[async_trait]
pub trait RTCPWriter: Send + Sync {
    async fn write(
        &self,
        pkts: &[Box<dyn rtcp::packet::Packet + Send + Sync>],
        attributes: &Attributes,
    ) -> Result<usize>;
}

// RTCPReader receives RTCP packets from the wire.
#[async_trait]
pub trait RTCPReader: Send + Sync {
    async fn read(
        &self,
        attributes: &Attributes,
    ) -> Result<(Vec<Box<dyn rtcp::packet::Packet + Send + Sync>>, Attributes)>;
}

// Interceptor can hook every packet entering or leaving the session.
// Implementations wrap the reader/writer they are given and return their
// own, forming a chain.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn bind_rtcp_reader(
        &self,
        reader: Arc<dyn RTCPReader + Send + Sync>,
    ) -> Arc<dyn RTCPReader + Send + Sync>;

    async fn bind_rtcp_writer(
        &self,
        writer: Arc<dyn RTCPWriter + Send + Sync>,
    ) -> Arc<dyn RTCPWriter + Send + Sync>;

    async fn bind_local_stream(
        &self,
        info: &StreamInfo,
        writer: Arc<dyn RTPWriter + Send + Sync>,
    ) -> Arc<dyn RTPWriter + Send + Sync>;

    async fn unbind_local_stream(&self, info: &StreamInfo);

    async fn bind_remote_stream(
        &self,
        info: &StreamInfo,
        reader: Arc<dyn RTPReader + Send + Sync>,
    ) -> Arc<dyn RTPReader + Send + Sync>;

    async fn unbind_remote_stream(&self, info: &StreamInfo);

    async fn close(&self) -> Result<()>;
}

// InterceptorBuilder constructs a fresh interceptor per peer connection.
pub trait InterceptorBuilder: Send + Sync {
    fn build(&self, id: &str) -> Result<Arc<dyn Interceptor + Send + Sync>>;
}
