#[cfg(test)]
mod peer_connection_test;

pub mod certificate;
pub mod configuration;
pub mod sdp;
pub mod state;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use interceptor::registry::Registry;
use interceptor::{Attributes, Interceptor, RTCPReader, RTCPWriter};
use log::{debug, trace, warn};
use tokio::sync::{mpsc, Mutex};

use crate::api::media_engine::{MediaEngine, RTCRtpCodecParameters, RTPCodecType};
use crate::data_channel::{RTCDataChannel, RTCDataChannelInit};
use crate::dtls_transport::RTCDtlsTransport;
use crate::error::{Error, Result};
use crate::ice_transport::{RTCIceCandidateInit, RTCIceTransport};
use crate::mux::{match_dtls, match_srtcp, match_srtp, Mux};
use crate::peer_connection::certificate::RTCCertificate;
use crate::peer_connection::configuration::{RTCBundlePolicy, RTCConfiguration};
use crate::peer_connection::sdp::*;
use crate::peer_connection::state::*;
use crate::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use crate::rtp_transceiver::rtp_sender::{RTCRtpSender, SrtpRtpWriter};
use crate::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverDirection};
use crate::sctp_transport::RTCSctpTransport;
use crate::stats::*;
use crate::track::{TrackLocalStaticRTP, TrackRemote};

type OnIceCandidateHandler = Arc<dyn Fn(Option<RTCIceCandidateInit>) + Send + Sync>;
type OnDataChannelHandler = Arc<dyn Fn(Arc<RTCDataChannel>) + Send + Sync>;
type OnTrackHandler = Arc<dyn Fn(Arc<TrackRemote>) + Send + Sync>;
type OnStateHandler = Arc<dyn Fn(RTCPeerConnectionState) + Send + Sync>;

// RTCPeerConnection orchestrates the transports: one ICE session, one
// DTLS session, zero-or-one SCTP association and the RTP transceivers,
// driven by SDP negotiation.
pub struct RTCPeerConnection {
    media_engine: Arc<MediaEngine>,
    interceptor: Arc<dyn Interceptor + Send + Sync>,

    certificate: RTCCertificate,
    pub(crate) ice: Arc<RTCIceTransport>,
    pub(crate) dtls: Arc<RTCDtlsTransport>,
    pub(crate) sctp: Arc<RTCSctpTransport>,

    signaling_state: Mutex<RTCSignalingState>,
    connection_state: Mutex<RTCPeerConnectionState>,

    local_description: Mutex<Option<RTCSessionDescription>>,
    remote_description: Mutex<Option<RTCSessionDescription>>,
    remote_parsed: Mutex<Option<RemoteDescription>>,

    transceivers: Mutex<Vec<Arc<RTCRtpTransceiver>>>,
    data_channels: Mutex<Vec<Arc<RTCDataChannel>>>,
    data_channel_requested: AtomicBool,

    cname: String,
    bundle_policy: RTCBundlePolicy,

    started: AtomicBool,
    closed: AtomicBool,

    // SSRC demultiplexing for inbound SRTP.
    ssrc_routes: Mutex<HashMap<u32, mpsc::Sender<rtp::packet::Packet>>>,
    srtcp_writer: Mutex<Option<Arc<dyn RTCPWriter + Send + Sync>>>,

    on_ice_candidate: Mutex<Option<OnIceCandidateHandler>>,
    on_data_channel: Mutex<Option<OnDataChannelHandler>>,
    on_track: Mutex<Option<OnTrackHandler>>,
    on_connection_state_change: Mutex<Option<OnStateHandler>>,

    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl RTCPeerConnection {
    pub(crate) async fn new(
        configuration: RTCConfiguration,
        media_engine: Arc<MediaEngine>,
        registry: Arc<Registry>,
    ) -> Result<Arc<Self>> {
        let certificate = configuration
            .certificates
            .first()
            .cloned()
            .map(Ok)
            .unwrap_or_else(RTCCertificate::generate)?;

        let ice = Arc::new(
            RTCIceTransport::new(
                &configuration.ice_servers,
                configuration.ice_transport_policy,
            )
            .await?,
        );
        let dtls = Arc::new(RTCDtlsTransport::new(certificate.clone()));
        let sctp = Arc::new(RTCSctpTransport::default());

        let interceptor = registry.build("")?;

        Ok(Arc::new(RTCPeerConnection {
            media_engine,
            interceptor,
            certificate,
            ice,
            dtls,
            sctp,
            signaling_state: Mutex::new(RTCSignalingState::Stable),
            connection_state: Mutex::new(RTCPeerConnectionState::New),
            local_description: Mutex::new(None),
            remote_description: Mutex::new(None),
            remote_parsed: Mutex::new(None),
            transceivers: Mutex::new(vec![]),
            data_channels: Mutex::new(vec![]),
            data_channel_requested: AtomicBool::new(false),
            cname: random_cname(),
            bundle_policy: configuration.bundle_policy,
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            ssrc_routes: Mutex::new(HashMap::new()),
            srtcp_writer: Mutex::new(None),
            on_ice_candidate: Mutex::new(None),
            on_data_channel: Mutex::new(None),
            on_track: Mutex::new(None),
            on_connection_state_change: Mutex::new(None),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }))
    }

    //
    // Event handlers
    //

    pub async fn on_ice_candidate(&self, handler: OnIceCandidateHandler) {
        *self.on_ice_candidate.lock().await = Some(handler);
    }

    pub async fn on_data_channel(&self, handler: OnDataChannelHandler) {
        *self.on_data_channel.lock().await = Some(handler);
    }

    pub async fn on_track(&self, handler: OnTrackHandler) {
        *self.on_track.lock().await = Some(handler);
    }

    pub async fn on_peer_connection_state_change(&self, handler: OnStateHandler) {
        *self.on_connection_state_change.lock().await = Some(handler);
    }

    async fn set_connection_state(&self, state: RTCPeerConnectionState) {
        {
            let mut guard = self.connection_state.lock().await;
            if *guard == state {
                return;
            }
            *guard = state;
        }
        debug!("peer connection state: {state}");
        if let Some(handler) = self.on_connection_state_change.lock().await.as_ref() {
            handler(state);
        }
    }

    pub async fn connection_state(&self) -> RTCPeerConnectionState {
        *self.connection_state.lock().await
    }

    pub async fn signaling_state(&self) -> RTCSignalingState {
        *self.signaling_state.lock().await
    }

    //
    // Channels, tracks, transceivers
    //

    // create_data_channel returns a handle immediately; SCTP binding is
    // deferred until the association establishes (proxy-before-open).
    pub async fn create_data_channel(
        &self,
        label: &str,
        init: Option<RTCDataChannelInit>,
    ) -> Result<Arc<RTCDataChannel>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ErrConnectionClosed);
        }
        let dc = RTCDataChannel::new(label.to_owned(), init.unwrap_or_default());
        self.data_channel_requested.store(true, Ordering::SeqCst);
        self.data_channels.lock().await.push(dc.clone());

        // Already connected: bind straight away.
        if let Some(association) = self.sctp.association.lock().await.clone() {
            let stream_id = self.next_stream_id().await;
            dc.open(&association, stream_id).await?;
        }
        Ok(dc)
    }

    async fn next_stream_id(&self) -> u16 {
        // DTLS client uses even stream ids, the server odd (RFC 8832).
        let is_client = self
            .dtls
            .conn
            .lock()
            .await
            .as_ref()
            .map(|c| c.connection_state().is_client)
            .unwrap_or(true);
        let base: u16 = if is_client { 0 } else { 1 };
        let count = self.data_channels.lock().await.len() as u16;
        base + count.saturating_sub(1) * 2
    }

    pub async fn add_transceiver_from_kind(
        &self,
        kind: RTPCodecType,
        direction: RTCRtpTransceiverDirection,
    ) -> Result<Arc<RTCRtpTransceiver>> {
        let sender = RTCRtpSender::new(kind);
        let receiver = RTCRtpReceiver::new(kind);
        let transceiver = RTCRtpTransceiver::new(kind, direction, sender, receiver);
        self.transceivers.lock().await.push(transceiver.clone());
        Ok(transceiver)
    }

    pub async fn add_track(&self, track: Arc<TrackLocalStaticRTP>) -> Result<Arc<RTCRtpSender>> {
        let transceiver = self
            .add_transceiver_from_kind(track.kind(), RTCRtpTransceiverDirection::Sendrecv)
            .await?;
        transceiver.sender.replace_track(Some(track)).await;
        Ok(transceiver.sender.clone())
    }

    pub async fn get_transceivers(&self) -> Vec<Arc<RTCRtpTransceiver>> {
        self.transceivers.lock().await.clone()
    }

    //
    // SDP negotiation
    //

    async fn local_media_sections(&self, answer_to: Option<&RemoteDescription>) -> Vec<LocalMediaSection> {
        let transceivers = self.transceivers.lock().await;
        let mut sections = vec![];
        for (i, transceiver) in transceivers.iter().enumerate() {
            let mid = transceiver
                .mid()
                .await
                .unwrap_or_else(|| i.to_string());
            let direction = transceiver.direction().await;

            let codecs = match answer_to {
                Some(remote) => {
                    let remote_section = remote.media.iter().find(|m| m.mid == mid);
                    match remote_section {
                        Some(section) => answer_codecs(section, &self.media_engine),
                        None => self.media_engine.media_codecs(transceiver.kind),
                    }
                }
                None => self.media_engine.codecs(transceiver.kind).to_vec(),
            };

            sections.push(LocalMediaSection {
                kind: transceiver.kind,
                mid,
                direction,
                codecs,
                ssrc: transceiver.sender.ssrc,
                rtx_ssrc: if transceiver.kind == RTPCodecType::Video {
                    Some(transceiver.sender.rtx_ssrc)
                } else {
                    None
                },
                cname: self.cname.clone(),
            });
        }
        sections
    }

    // create_offer builds an SDP offer from the current transceivers and
    // data channel intent. Trickle candidates follow via on_ice_candidate.
    pub async fn create_offer(&self) -> Result<RTCSessionDescription> {
        let (ufrag, pwd) = self.ice.credentials();
        let media = self.local_media_sections(None).await;
        let include_application = self.data_channel_requested.load(Ordering::SeqCst)
            || media.is_empty();

        let sd = build_session_description(&SessionParams {
            ice_ufrag: ufrag,
            ice_pwd: pwd,
            fingerprint: self.certificate.fingerprint(),
            // The offerer is always actpass (RFC 5763).
            setup: "actpass",
            media,
            include_application,
            application_mid: None,
            sctp_port: self.sctp.port,
            max_message_size: self.sctp.max_message_size,
            header_extensions: self.media_engine.header_extensions.clone(),
            bundle: self.bundle_policy != RTCBundlePolicy::Disable,
        });

        Ok(RTCSessionDescription {
            sdp_type: RTCSdpType::Offer,
            sdp: sd.marshal(),
        })
    }

    // create_answer mirrors the remote offer's m-sections.
    pub async fn create_answer(&self) -> Result<RTCSessionDescription> {
        let remote_guard = self.remote_parsed.lock().await;
        let remote = remote_guard.as_ref().ok_or(Error::ErrNoRemoteDescription)?;

        let (ufrag, pwd) = self.ice.credentials();
        let mut media = vec![];
        let mut include_application = false;
        let mut application_mid = None;
        for section in &remote.media {
            if section.is_application {
                include_application = true;
                application_mid = Some(section.mid.clone());
                continue;
            }
            let kind = if section.kind == "audio" {
                RTPCodecType::Audio
            } else {
                RTPCodecType::Video
            };

            // Reuse (or lazily create) the transceiver bound to this mid.
            let transceiver = self.transceiver_for_mid(&section.mid, kind).await?;
            media.push(LocalMediaSection {
                kind,
                mid: section.mid.clone(),
                direction: section.direction.reverse(),
                codecs: answer_codecs(section, &self.media_engine),
                ssrc: transceiver.sender.ssrc,
                rtx_ssrc: if kind == RTPCodecType::Video {
                    Some(transceiver.sender.rtx_ssrc)
                } else {
                    None
                },
                cname: self.cname.clone(),
            });
        }

        let sd = build_session_description(&SessionParams {
            ice_ufrag: ufrag,
            ice_pwd: pwd,
            fingerprint: self.certificate.fingerprint(),
            // The answerer defaults to the DTLS client role.
            setup: "active",
            media,
            include_application,
            application_mid,
            sctp_port: self.sctp.port,
            max_message_size: self.sctp.max_message_size,
            header_extensions: self.media_engine.header_extensions.clone(),
            bundle: !remote.bundle_mids.is_empty(),
        });

        Ok(RTCSessionDescription {
            sdp_type: RTCSdpType::Answer,
            sdp: sd.marshal(),
        })
    }

    async fn transceiver_for_mid(
        &self,
        mid: &str,
        kind: RTPCodecType,
    ) -> Result<Arc<RTCRtpTransceiver>> {
        {
            let transceivers = self.transceivers.lock().await;
            for t in transceivers.iter() {
                if t.mid().await.as_deref() == Some(mid) {
                    return Ok(t.clone());
                }
            }
            // An unassigned transceiver of the right kind takes the mid.
            for t in transceivers.iter() {
                if t.mid().await.is_none() && t.kind == kind {
                    t.set_mid(mid.to_owned()).await;
                    return Ok(t.clone());
                }
            }
        }
        let t = self
            .add_transceiver_from_kind(kind, RTCRtpTransceiverDirection::Recvonly)
            .await?;
        t.set_mid(mid.to_owned()).await;
        Ok(t)
    }

    pub async fn set_local_description(self: &Arc<Self>, description: RTCSessionDescription) -> Result<()> {
        let mut signaling = self.signaling_state.lock().await;
        let next = check_next_signaling_state(*signaling, description.sdp_type, true)?;

        if description.sdp_type == RTCSdpType::Rollback {
            *signaling = next;
            *self.local_description.lock().await = None;
            return Ok(());
        }
        *signaling = next;
        drop(signaling);

        // Assign mids to transceivers in offer order.
        {
            let transceivers = self.transceivers.lock().await;
            for (i, t) in transceivers.iter().enumerate() {
                t.set_mid(i.to_string()).await;
            }
        }

        *self.local_description.lock().await = Some(description);

        // JSEP: gathering starts with the local description.
        self.start_gathering().await?;
        self.maybe_start().await;
        Ok(())
    }

    pub async fn set_remote_description(self: &Arc<Self>, description: RTCSessionDescription) -> Result<()> {
        let mut signaling = self.signaling_state.lock().await;
        let next = check_next_signaling_state(*signaling, description.sdp_type, false)?;

        if description.sdp_type == RTCSdpType::Rollback {
            // Rolling back must restore the previous m-section layout.
            let prev_count = self
                .remote_parsed
                .lock()
                .await
                .as_ref()
                .map(|r| r.media.len());
            if let Some(prev_count) = prev_count {
                let new_count = parse_remote_description(&description.sdp)
                    .map(|r| r.media.len())
                    .unwrap_or(prev_count);
                if new_count != prev_count {
                    return Err(Error::ErrMSectionCountMismatch);
                }
            }
            *signaling = next;
            *self.remote_description.lock().await = None;
            *self.remote_parsed.lock().await = None;
            return Ok(());
        }
        *signaling = next;
        drop(signaling);

        let parsed = parse_remote_description(&description.sdp)?;

        // Trickle candidates embedded in the SDP are applied immediately.
        for section in &parsed.media {
            for candidate in &section.candidates {
                let _ = self
                    .ice
                    .add_remote_candidate(&RTCIceCandidateInit {
                        candidate: candidate.clone(),
                        sdp_mid: Some(section.mid.clone()),
                        sdp_mline_index: None,
                    })
                    .await;
            }
        }

        // Mirror remote media sections onto transceivers.
        for section in &parsed.media {
            if section.is_application {
                self.data_channel_requested.store(true, Ordering::SeqCst);
                continue;
            }
            let kind = if section.kind == "audio" {
                RTPCodecType::Audio
            } else {
                RTPCodecType::Video
            };
            let _ = self.transceiver_for_mid(&section.mid, kind).await?;
        }

        *self.remote_description.lock().await = Some(description);
        *self.remote_parsed.lock().await = Some(parsed);

        self.maybe_start().await;
        Ok(())
    }

    pub async fn local_description(&self) -> Option<RTCSessionDescription> {
        self.local_description.lock().await.clone()
    }

    pub async fn remote_description(&self) -> Option<RTCSessionDescription> {
        self.remote_description.lock().await.clone()
    }

    pub async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()> {
        self.ice.add_remote_candidate(&candidate).await
    }

    async fn start_gathering(&self) -> Result<()> {
        let handler = self.on_ice_candidate.lock().await.clone();
        let mline_index = 0u16;
        self.ice
            .agent
            .on_candidate(Box::new(move |candidate| {
                if let Some(handler) = &handler {
                    match candidate {
                        Some(c) => handler(Some(RTCIceCandidateInit {
                            candidate: format!("candidate:{}", c.marshal()),
                            sdp_mid: Some("0".to_owned()),
                            sdp_mline_index: Some(mline_index),
                        })),
                        None => handler(None),
                    }
                }
            }))
            .await;
        self.ice.agent.gather_candidates().await?;
        Ok(())
    }

    // maybe_start launches the transport bring-up once both descriptions
    // are applied.
    async fn maybe_start(self: &Arc<Self>) {
        if self.local_description.lock().await.is_none()
            || self.remote_parsed.lock().await.is_none()
        {
            return;
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let pc = self.clone();
        tokio::spawn(async move {
            if let Err(err) = pc.start_transports().await {
                warn!("transport bring-up failed: {err}");
                pc.set_connection_state(RTCPeerConnectionState::Failed).await;
            }
        });
    }

    async fn start_transports(self: &Arc<Self>) -> Result<()> {
        self.set_connection_state(RTCPeerConnectionState::Connecting)
            .await;

        let local_is_offerer = {
            let local = self.local_description.lock().await;
            matches!(
                local.as_ref().map(|d| d.sdp_type),
                Some(RTCSdpType::Offer)
            )
        };
        let (remote_ufrag, remote_pwd, fingerprints, remote_setup) = {
            let parsed = self.remote_parsed.lock().await;
            let parsed = parsed.as_ref().ok_or(Error::ErrNoRemoteDescription)?;
            (
                parsed.ice_ufrag.clone(),
                parsed.ice_pwd.clone(),
                parsed.fingerprints.clone(),
                parsed.setup.clone(),
            )
        };

        // ICE: the offerer controls (RFC 8445 §5.1.1, initial roles).
        self.ice
            .start(local_is_offerer, remote_ufrag, remote_pwd)
            .await?;
        self.ice.wait_connected().await?;
        debug!("ice nominated a candidate pair");

        // DTLS role per RFC 5763: the answerer is active by default; the
        // offerer takes the opposite of the answer's setup.
        let dtls_is_client = if local_is_offerer {
            match remote_setup.as_deref() {
                Some("active") => false,
                Some("passive") => true,
                _ => false,
            }
        } else {
            true
        };

        let mux = Mux::new(self.ice.conn.clone());
        let dtls_endpoint = mux.new_endpoint(Box::new(match_dtls)).await;
        let srtcp_endpoint = mux.new_endpoint(Box::new(match_srtcp)).await;
        let srtp_endpoint = mux.new_endpoint(Box::new(match_srtp)).await;

        let dtls_conn = self
            .dtls
            .start(dtls_endpoint, dtls_is_client, &fingerprints)
            .await?;

        // SRTP contexts from the DTLS exporter. The remote (decrypt)
        // context carries the replay windows.
        let keys = self.dtls.srtp_keys().await?;
        let local_ctx = Arc::new(Mutex::new(srtp::context::Context::new(
            &keys.local_master_key,
            &keys.local_master_salt,
            keys.profile,
            None,
            None,
        )?));
        let remote_ctx = Arc::new(Mutex::new(srtp::context::Context::new(
            &keys.remote_master_key,
            &keys.remote_master_salt,
            keys.profile,
            Some(srtp::option::srtp_replay_protection(64)),
            Some(srtp::option::srtcp_replay_protection(64)),
        )?));

        // RTCP pipeline.
        let srtcp_writer_base: Arc<dyn RTCPWriter + Send + Sync> = Arc::new(SrtcpWriter {
            context: local_ctx.clone(),
            endpoint: srtcp_endpoint.clone(),
        });
        let srtcp_writer = self.interceptor.bind_rtcp_writer(srtcp_writer_base).await;
        *self.srtcp_writer.lock().await = Some(srtcp_writer.clone());

        let (rtcp_tx, rtcp_rx) = mpsc::channel(64);
        let rtcp_reader_base: Arc<dyn RTCPReader + Send + Sync> = Arc::new(ChannelRtcpReader {
            rx: Mutex::new(rtcp_rx),
        });
        let rtcp_reader = self.interceptor.bind_rtcp_reader(rtcp_reader_base).await;
        self.spawn_srtcp_loop(srtcp_endpoint, remote_ctx.clone(), rtcp_tx);
        self.spawn_rtcp_driver(rtcp_reader);

        // Senders: configure codecs from the negotiation and bind tracks.
        self.bind_senders(local_ctx.clone(), srtp_endpoint.clone())
            .await?;

        // Inbound SRTP demultiplexing by SSRC.
        self.spawn_srtp_loop(srtp_endpoint, remote_ctx.clone());

        // SCTP rides the DTLS connection; client side follows DTLS.
        if self.data_channel_requested.load(Ordering::SeqCst) {
            let association = self.sctp.start(dtls_conn.clone(), dtls_is_client).await?;

            // Open local channels (proxy handles created before startup).
            let channels = self.data_channels.lock().await.clone();
            let base: u16 = if dtls_is_client { 0 } else { 1 };
            for (i, dc) in channels.iter().enumerate() {
                if dc.ready_state() == crate::data_channel::RTCDataChannelState::Connecting {
                    dc.open(&association, base + (i as u16) * 2).await?;
                }
            }

            // Surface peer-opened channels.
            let pc = self.clone();
            RTCSctpTransport::spawn_accept_loop(
                association,
                Arc::new(move |dc| {
                    let pc = pc.clone();
                    tokio::spawn(async move {
                        pc.data_channels.lock().await.push(dc.clone());
                        if let Some(handler) = pc.on_data_channel.lock().await.as_ref() {
                            handler(dc);
                        }
                    });
                }),
            );
        }

        self.set_connection_state(RTCPeerConnectionState::Connected)
            .await;
        Ok(())
    }

    async fn bind_senders(
        &self,
        local_ctx: Arc<Mutex<srtp::context::Context>>,
        endpoint: Arc<crate::mux::Endpoint>,
    ) -> Result<()> {
        let remote = self.remote_parsed.lock().await.clone();
        let transceivers = self.transceivers.lock().await.clone();
        for transceiver in transceivers {
            let direction = transceiver.direction().await;
            if matches!(
                direction,
                RTCRtpTransceiverDirection::Recvonly | RTCRtpTransceiverDirection::Inactive
            ) {
                continue;
            }
            let mid = transceiver.mid().await.unwrap_or_default();

            // The negotiated codec: intersect with the remote section
            // when present, else our first registered codec.
            let codec = remote
                .as_ref()
                .and_then(|r| r.media.iter().find(|m| m.mid == mid))
                .map(|section| answer_codecs(section, &self.media_engine))
                .and_then(|codecs| codecs.first().cloned())
                .or_else(|| {
                    self.media_engine
                        .media_codecs(transceiver.kind)
                        .first()
                        .cloned()
                });
            let Some(codec) = codec else {
                continue;
            };

            transceiver
                .sender
                .configure(
                    &self.media_engine,
                    codec,
                    &self.media_engine.header_extensions,
                )
                .await;

            let base: Arc<dyn interceptor::RTPWriter + Send + Sync> = Arc::new(SrtpRtpWriter {
                context: local_ctx.clone(),
                endpoint: endpoint.clone(),
            });
            transceiver.sender.bind(&self.interceptor, base).await?;
        }
        Ok(())
    }

    fn spawn_srtp_loop(
        self: &Arc<Self>,
        endpoint: Arc<crate::mux::Endpoint>,
        remote_ctx: Arc<Mutex<srtp::context::Context>>,
    ) {
        let pc = self.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            loop {
                let n = match util::conn::Conn::recv(endpoint.as_ref(), &mut buf).await {
                    Ok(n) => n,
                    Err(_) => return,
                };
                pc.bytes_received.fetch_add(n as u64, Ordering::SeqCst);

                let decrypted = {
                    let mut ctx = remote_ctx.lock().await;
                    match ctx.decrypt_rtp(&buf[..n]) {
                        Ok(d) => d,
                        Err(err) => {
                            // Auth failures and replays are dropped and
                            // counted, never surfaced.
                            trace!("srtp packet dropped: {err}");
                            continue;
                        }
                    }
                };

                use util::marshal::Unmarshal;
                let mut raw = &decrypted[..];
                let Ok(packet) = rtp::packet::Packet::unmarshal(&mut raw) else {
                    continue;
                };
                pc.route_rtp(packet).await;
            }
        });
    }

    // route_rtp delivers a decrypted packet to its SSRC's stream,
    // creating the receiver stream (and firing on_track) on first sight.
    async fn route_rtp(self: &Arc<Self>, packet: rtp::packet::Packet) {
        let ssrc = packet.header.ssrc;
        {
            let routes = self.ssrc_routes.lock().await;
            if let Some(tx) = routes.get(&ssrc) {
                let _ = tx.try_send(packet);
                return;
            }
        }

        // New SSRC: resolve its transceiver from the remote description.
        let remote = self.remote_parsed.lock().await.clone();
        let Some(remote) = remote else { return };
        let section = remote.media.iter().find(|m| {
            m.ssrcs.contains(&ssrc) || m.fid_pair.map(|(m_ssrc, _)| m_ssrc == ssrc).unwrap_or(false)
        });

        // RTX repair streams route to their media SSRC after unwrapping;
        // dropped here for simplicity of the demux (responder handles
        // outbound RTX).
        if let Some(section) = section {
            if let Some((_, rtx_ssrc)) = section.fid_pair {
                if rtx_ssrc == ssrc {
                    trace!("dropping rtx packet for ssrc {ssrc}");
                    return;
                }
            }
        }

        let (kind, codec, mid) = match section {
            Some(section) => {
                let kind = if section.kind == "audio" {
                    RTPCodecType::Audio
                } else {
                    RTPCodecType::Video
                };
                let codec = section
                    .codecs
                    .iter()
                    .find(|c| c.payload_type == packet.header.payload_type)
                    .and_then(|c| self.media_engine.match_remote_codec(c, kind).ok())
                    .map(|mut c| {
                        c.payload_type = packet.header.payload_type;
                        c
                    });
                (kind, codec, section.mid.clone())
            }
            None => (RTPCodecType::Video, None, String::new()),
        };

        let codec = codec.or_else(|| {
            self.media_engine
                .codec_for_payload_type(packet.header.payload_type)
        });
        let Some(codec) = codec else {
            trace!("no codec for inbound ssrc {ssrc}");
            return;
        };

        let transceiver = match self.transceiver_for_mid(&mid, kind).await {
            Ok(t) => t,
            Err(_) => return,
        };

        let (tx, rx) = mpsc::channel(256);
        let _ = tx.try_send(packet);
        self.ssrc_routes.lock().await.insert(ssrc, tx);

        let track = transceiver
            .receiver
            .create_stream(
                ssrc,
                codec,
                &self.media_engine.header_extensions,
                &self.interceptor,
                rx,
            )
            .await;

        if let Some(handler) = self.on_track.lock().await.as_ref() {
            handler(track);
        }
    }

    fn spawn_srtcp_loop(
        self: &Arc<Self>,
        endpoint: Arc<crate::mux::Endpoint>,
        remote_ctx: Arc<Mutex<srtp::context::Context>>,
        rtcp_tx: mpsc::Sender<Vec<Box<dyn rtcp::packet::Packet + Send + Sync>>>,
    ) {
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            loop {
                let n = match util::conn::Conn::recv(endpoint.as_ref(), &mut buf).await {
                    Ok(n) => n,
                    Err(_) => return,
                };
                let decrypted = {
                    let mut ctx = remote_ctx.lock().await;
                    match ctx.decrypt_rtcp(&buf[..n]) {
                        Ok(d) => d,
                        Err(err) => {
                            trace!("srtcp packet dropped: {err}");
                            continue;
                        }
                    }
                };
                let mut raw = &decrypted[..];
                match rtcp::packet::unmarshal(&mut raw) {
                    Ok(packets) => {
                        if rtcp_tx.send(packets).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => trace!("rtcp parse failed: {err}"),
                }
            }
        });
    }

    // spawn_rtcp_driver pulls RTCP through the interceptor chain (NACK
    // responder, stats) and forwards feedback to the owning senders.
    fn spawn_rtcp_driver(self: &Arc<Self>, reader: Arc<dyn RTCPReader + Send + Sync>) {
        let pc = self.clone();
        tokio::spawn(async move {
            loop {
                let (packets, _) = match reader.read(&Attributes::new()).await {
                    Ok(out) => out,
                    Err(_) => return,
                };
                let transceivers = pc.transceivers.lock().await.clone();
                for packet in packets {
                    let ssrcs = packet.destination_ssrc();
                    for transceiver in &transceivers {
                        let sender = &transceiver.sender;
                        if ssrcs.contains(&sender.ssrc) || ssrcs.contains(&sender.rtx_ssrc) {
                            let _ = sender.rtcp_tx.try_send(packet.cloned());
                        }
                    }
                }
            }
        });
    }

    // write_rtcp sends caller-built feedback (PLI, FIR) down the chain.
    pub async fn write_rtcp(
        &self,
        packets: &[Box<dyn rtcp::packet::Packet + Send + Sync>],
    ) -> Result<usize> {
        let writer = self.srtcp_writer.lock().await.clone();
        let writer = writer.ok_or(Error::ErrConnectionClosed)?;
        Ok(writer.write(packets, &Attributes::new()).await?)
    }

    pub async fn get_stats(&self) -> RTCStatsReport {
        let mut report = RTCStatsReport::default();

        for dc in self.data_channels.lock().await.iter() {
            report.data_channels.push(RTCDataChannelStats {
                label: dc.label.clone(),
                messages_sent: dc.messages_sent(),
                messages_received: dc.messages_received(),
            });
        }

        if let Some(pair) = self.ice.agent.get_selected_candidate_pair().await {
            report.selected_candidate_pair = Some(RTCIceCandidatePairStats {
                local: pair.local.to_string(),
                remote: pair.remote.to_string(),
                nominated: pair.nominated,
            });
        }

        for transceiver in self.transceivers.lock().await.iter() {
            report.outbound_rtp.insert(
                transceiver.sender.ssrc,
                RTCOutboundRtpStreamStats {
                    ssrc: transceiver.sender.ssrc,
                    ..Default::default()
                },
            );
            for track in transceiver.receiver.tracks().await {
                report.inbound_rtp.insert(
                    track.ssrc,
                    RTCInboundRtpStreamStats {
                        ssrc: track.ssrc,
                        packets_lost_events: track
                            .packets_lost_events
                            .load(Ordering::SeqCst),
                        ..Default::default()
                    },
                );
            }
        }

        report
    }

    // close cancels timers, fails pending operations and releases the
    // transports.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        *self.signaling_state.lock().await = RTCSignalingState::Closed;

        for dc in self.data_channels.lock().await.iter() {
            let _ = dc.close().await;
        }
        let _ = self.interceptor.close().await;
        let _ = self.sctp.close().await;
        let _ = self.dtls.close().await;
        let _ = self.ice.close().await;

        self.set_connection_state(RTCPeerConnectionState::Closed)
            .await;
        Ok(())
    }
}

// SrtcpWriter protects and sends compound RTCP.
struct SrtcpWriter {
    context: Arc<Mutex<srtp::context::Context>>,
    endpoint: Arc<crate::mux::Endpoint>,
}

#[async_trait::async_trait]
impl RTCPWriter for SrtcpWriter {
    async fn write(
        &self,
        pkts: &[Box<dyn rtcp::packet::Packet + Send + Sync>],
        _attributes: &Attributes,
    ) -> interceptor::Result<usize> {
        let raw = rtcp::packet::marshal(pkts)
            .map_err(|e| interceptor::Error::Rtcp(e.to_string()))?;
        let protected = {
            let mut ctx = self.context.lock().await;
            ctx.encrypt_rtcp(&raw)
                .map_err(|e| interceptor::Error::Other(e.to_string()))?
        };
        util::conn::Conn::send(self.endpoint.as_ref(), &protected)
            .await
            .map_err(|e| interceptor::Error::Other(e.to_string()))?;
        Ok(raw.len())
    }
}

// ChannelRtcpReader feeds decrypted compound packets into the chain.
struct ChannelRtcpReader {
    rx: Mutex<mpsc::Receiver<Vec<Box<dyn rtcp::packet::Packet + Send + Sync>>>>,
}

#[async_trait::async_trait]
impl RTCPReader for ChannelRtcpReader {
    async fn read(
        &self,
        _attributes: &Attributes,
    ) -> interceptor::Result<(Vec<Box<dyn rtcp::packet::Packet + Send + Sync>>, Attributes)> {
        let mut rx = self.rx.lock().await;
        let packets = rx.recv().await.ok_or(interceptor::Error::ErrSourceClosed)?;
        Ok((packets, Attributes::new()))
    }
}
