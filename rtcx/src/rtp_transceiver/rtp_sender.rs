use std::sync::Arc;

use interceptor::stream_info::{RTCPFeedback, StreamInfo, TRANSPORT_CC_URI};
use interceptor::{Attributes, Interceptor, RTPWriter};
use tokio::sync::{mpsc, Mutex};

use crate::api::media_engine::{MediaEngine, RTCRtpCodecParameters, RTPCodecType};
use crate::error::{Error, Result};
use crate::track::{TrackBinding, TrackLocalStaticRTP};

// RTCRtpSender owns the outbound half of a transceiver: the negotiated
// SSRC pair (media and RTX), the codec and the interceptor-bound writer.
pub struct RTCRtpSender {
    pub kind: RTPCodecType,
    pub ssrc: u32,
    pub rtx_ssrc: u32,
    pub(crate) codec: Mutex<Option<RTCRtpCodecParameters>>,
    pub(crate) track: Mutex<Option<Arc<TrackLocalStaticRTP>>>,
    pub(crate) stream_info: Mutex<Option<StreamInfo>>,
    // Incoming RTCP addressed to this sender's SSRCs (PLI, FIR, NACK
    // already handled in-chain).
    pub(crate) rtcp_tx: mpsc::Sender<Box<dyn rtcp::packet::Packet + Send + Sync>>,
    rtcp_rx: Mutex<mpsc::Receiver<Box<dyn rtcp::packet::Packet + Send + Sync>>>,
}

impl RTCRtpSender {
    pub(crate) fn new(kind: RTPCodecType) -> Arc<Self> {
        let (rtcp_tx, rtcp_rx) = mpsc::channel(32);
        Arc::new(RTCRtpSender {
            kind,
            ssrc: rand::random::<u32>(),
            rtx_ssrc: rand::random::<u32>(),
            codec: Mutex::new(None),
            track: Mutex::new(None),
            stream_info: Mutex::new(None),
            rtcp_tx,
            rtcp_rx: Mutex::new(rtcp_rx),
        })
    }

    pub async fn replace_track(&self, track: Option<Arc<TrackLocalStaticRTP>>) {
        *self.track.lock().await = track;
    }

    pub async fn track(&self) -> Option<Arc<TrackLocalStaticRTP>> {
        self.track.lock().await.clone()
    }

    // read_rtcp returns feedback addressed to this sender, PLI included;
    // the application reacts by producing a keyframe.
    pub async fn read_rtcp(&self) -> Result<Box<dyn rtcp::packet::Packet + Send + Sync>> {
        let mut rx = self.rtcp_rx.lock().await;
        rx.recv().await.ok_or(Error::ErrConnectionClosed)
    }

    // configure resolves the negotiated codec and builds the stream info
    // handed to the interceptor chain.
    pub(crate) async fn configure(
        &self,
        media_engine: &MediaEngine,
        codec: RTCRtpCodecParameters,
        header_extensions: &[(String, isize)],
    ) -> StreamInfo {
        let rtx_payload_type = media_engine
            .rtx_payload_type_for(codec.payload_type)
            .unwrap_or(0);

        let info = StreamInfo {
            id: format!("sender-{}", self.ssrc),
            ssrc: self.ssrc,
            payload_type: codec.payload_type,
            rtp_header_extensions: header_extensions
                .iter()
                .map(|(uri, id)| interceptor::stream_info::RTPHeaderExtension {
                    uri: uri.clone(),
                    id: *id,
                })
                .collect(),
            mime_type: codec.capability.mime_type.clone(),
            clock_rate: codec.capability.clock_rate,
            channels: codec.capability.channels,
            sdp_fmtp_line: codec.capability.sdp_fmtp_line.clone(),
            rtcp_feedback: codec
                .capability
                .rtcp_feedback
                .iter()
                .map(|fb| RTCPFeedback {
                    typ: fb.typ.clone(),
                    parameter: fb.parameter.clone(),
                })
                .collect(),
            associated_ssrc: if rtx_payload_type != 0 { self.rtx_ssrc } else { 0 },
            rtx_payload_type,
        };

        *self.codec.lock().await = Some(codec);
        *self.stream_info.lock().await = Some(info.clone());
        info
    }

    // bind wires the track through the interceptor chain to the wire.
    pub(crate) async fn bind(
        &self,
        chain: &Arc<dyn Interceptor + Send + Sync>,
        base_writer: Arc<dyn RTPWriter + Send + Sync>,
    ) -> Result<()> {
        let info = self
            .stream_info
            .lock()
            .await
            .clone()
            .ok_or(Error::ErrCodecNotFound)?;
        let codec = self
            .codec
            .lock()
            .await
            .clone()
            .ok_or(Error::ErrCodecNotFound)?;

        let writer = chain.bind_local_stream(&info, base_writer).await;
        if let Some(track) = self.track.lock().await.as_ref() {
            track
                .bind(TrackBinding {
                    ssrc: self.ssrc,
                    payload_type: codec.payload_type,
                    writer,
                })
                .await;
        }
        Ok(())
    }

    pub(crate) fn uses_twcc(header_extensions: &[(String, isize)]) -> bool {
        header_extensions.iter().any(|(uri, _)| uri == TRANSPORT_CC_URI)
    }
}

// SrtpRtpWriter is the base of every local stream pipeline: marshal,
// SRTP-protect, send.
pub(crate) struct SrtpRtpWriter {
    pub(crate) context: Arc<Mutex<srtp::context::Context>>,
    pub(crate) endpoint: Arc<dyn util::conn::Conn + Send + Sync>,
}

#[async_trait::async_trait]
impl RTPWriter for SrtpRtpWriter {
    async fn write(
        &self,
        pkt: &rtp::packet::Packet,
        _attributes: &Attributes,
    ) -> interceptor::Result<usize> {
        use util::marshal::Marshal;
        let raw = pkt
            .marshal()
            .map_err(|e| interceptor::Error::Rtp(e.to_string()))?;
        let protected = {
            let mut ctx = self.context.lock().await;
            ctx.encrypt_rtp(&raw)
                .map_err(|e| interceptor::Error::Other(e.to_string()))?
        };
        self.endpoint
            .send(&protected)
            .await
            .map_err(|e| interceptor::Error::Other(e.to_string()))?;
        Ok(raw.len())
    }
}
