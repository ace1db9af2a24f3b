use std::sync::Arc;

use interceptor::stream_info::{RTCPFeedback, StreamInfo};
use interceptor::{Attributes, Interceptor, RTPReader};
use log::debug;
use tokio::sync::{mpsc, Mutex};

use crate::api::media_engine::{RTCRtpCodecParameters, RTPCodecType};
use crate::track::TrackRemote;

// RTCRtpReceiver owns the inbound half: per-SSRC streams feeding remote
// tracks through the interceptor chain.
pub struct RTCRtpReceiver {
    pub kind: RTPCodecType,
    pub(crate) tracks: Mutex<Vec<Arc<TrackRemote>>>,
}

impl RTCRtpReceiver {
    pub(crate) fn new(kind: RTPCodecType) -> Arc<Self> {
        Arc::new(RTCRtpReceiver {
            kind,
            tracks: Mutex::new(vec![]),
        })
    }

    pub async fn tracks(&self) -> Vec<Arc<TrackRemote>> {
        self.tracks.lock().await.clone()
    }

    // create_stream binds one remote SSRC: packets demuxed to this SSRC
    // flow through the chain into the returned track.
    pub(crate) async fn create_stream(
        &self,
        ssrc: u32,
        codec: RTCRtpCodecParameters,
        header_extensions: &[(String, isize)],
        chain: &Arc<dyn Interceptor + Send + Sync>,
        packet_rx: mpsc::Receiver<rtp::packet::Packet>,
    ) -> Arc<TrackRemote> {
        let info = StreamInfo {
            id: format!("receiver-{ssrc}"),
            ssrc,
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
            associated_ssrc: 0,
            rtx_payload_type: 0,
        };

        let base: Arc<dyn RTPReader + Send + Sync> = Arc::new(ChannelRtpReader {
            rx: Mutex::new(packet_rx),
        });
        let reader = chain.bind_remote_stream(&info, base).await;

        // The chain is driven continuously so NACK and stats see every
        // packet even when the application reads slowly.
        let (track_tx, track_rx) = mpsc::channel(256);
        tokio::spawn(async move {
            loop {
                match reader.read(&Attributes::new()).await {
                    Ok((packet, _)) => {
                        if track_tx.send(packet).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        debug!("receiver stream {ssrc} ended: {err}");
                        return;
                    }
                }
            }
        });

        let track = TrackRemote::new(
            format!("track-{ssrc}"),
            ssrc,
            self.kind,
            codec,
            track_rx,
        );
        self.tracks.lock().await.push(track.clone());
        track
    }
}

// ChannelRtpReader is the base reader: packets demultiplexed by SSRC.
struct ChannelRtpReader {
    rx: Mutex<mpsc::Receiver<rtp::packet::Packet>>,
}

#[async_trait::async_trait]
impl RTPReader for ChannelRtpReader {
    async fn read(
        &self,
        _attributes: &Attributes,
    ) -> interceptor::Result<(rtp::packet::Packet, Attributes)> {
        let mut rx = self.rx.lock().await;
        let packet = rx.recv().await.ok_or(interceptor::Error::ErrSourceClosed)?;
        Ok((packet, Attributes::new()))
    }
}
