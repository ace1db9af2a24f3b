#[cfg(test)]
mod conn_test;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use rand::Rng;
use subtle::ConstantTimeEq;
use tokio::sync::{mpsc, Mutex};
use util::conn::Conn;
use util::replay_detector::{ReplayDetector, SlidingWindowDetector};

use crate::alert::{Alert, AlertDescription, AlertLevel};
use crate::cipher_suite::{
    default_cipher_suites, CipherSuite, CipherSuiteAes128GcmSha256, CipherSuiteId,
};
use crate::config::Config;
use crate::content::ContentType;
use crate::crypto::{peer_spki, sign_key_exchange, verify_signature, NamedCurveKeypair};
use crate::error::{Error, Result};
use crate::extension::*;
use crate::fragment_buffer::FragmentBuffer;
use crate::handshake::*;
use crate::prf::*;
use crate::record_layer::*;
use crate::state::State;
use crate::SrtpProtectionProfile;

const RECEIVE_MTU: usize = 8192;
// Handshake messages above this size are fragmented.
const FRAGMENT_MTU: usize = 1200;
const REPLAY_WINDOW: usize = 64;
const MAX_FLIGHT_RESENDS: u32 = 9;

// One plaintext record queued for (re)transmission as part of a flight.
#[derive(Clone)]
struct PlainRecord {
    content_type: ContentType,
    epoch: u16,
    payload: Vec<u8>,
}

// RecordIo owns the record layer: epochs, per-epoch sequence numbers,
// replay windows and the negotiated cipher.
struct RecordIo {
    conn: Arc<dyn Conn + Send + Sync>,
    local_epoch: u16,
    remote_epoch: u16,
    local_sequence: HashMap<u16, u64>,
    replay: HashMap<u16, SlidingWindowDetector>,
    cipher: Option<Box<dyn CipherSuite>>,
    fragment_buffer: FragmentBuffer,
    handshake_message_seq: u16,
    // Messages already consumed, to drop peer retransmits.
    highest_processed_seq: Option<u16>,
    // Records of a future epoch received before the cipher was ready
    // (the Finished that rides with ChangeCipherSpec).
    queued_encrypted: Vec<Vec<u8>>,
    pending_app_data: Vec<Vec<u8>>,
}

impl RecordIo {
    fn new(conn: Arc<dyn Conn + Send + Sync>) -> Self {
        RecordIo {
            conn,
            local_epoch: 0,
            remote_epoch: 0,
            local_sequence: HashMap::new(),
            replay: HashMap::new(),
            cipher: None,
            fragment_buffer: FragmentBuffer::new(),
            handshake_message_seq: 0,
            highest_processed_seq: None,
            queued_encrypted: vec![],
            pending_app_data: vec![],
        }
    }

    fn next_sequence(&mut self, epoch: u16) -> Result<u64> {
        let seq = self.local_sequence.entry(epoch).or_insert(0);
        if *seq > MAX_SEQUENCE_NUMBER {
            return Err(Error::ErrSequenceNumberOverflow);
        }
        let out = *seq;
        *seq += 1;
        Ok(out)
    }

    // marshal_record protects and serializes one plaintext record.
    fn marshal_record(&mut self, record: &PlainRecord) -> Result<Vec<u8>> {
        let sequence_number = self.next_sequence(record.epoch)?;
        let header = RecordLayerHeader {
            content_type: record.content_type,
            protocol_version: PROTOCOL_VERSION1_2,
            epoch: record.epoch,
            sequence_number,
            content_len: record.payload.len() as u16,
        };

        if record.epoch > 0 {
            let cipher = self.cipher.as_ref().ok_or(Error::ErrCipherSuiteNotInit)?;
            cipher.encrypt(&header, &record.payload)
        } else {
            let mut out = header.marshal();
            out.extend_from_slice(&record.payload);
            Ok(out)
        }
    }

    // send_flight (re)transmits a full flight, bundling records into
    // datagrams up to the MTU. Retransmitted records take fresh sequence
    // numbers so the peer's replay window admits them.
    async fn send_flight(&mut self, flight: &[PlainRecord]) -> Result<()> {
        let mut datagram: Vec<u8> = vec![];
        for record in flight {
            let raw = self.marshal_record(record)?;
            if !datagram.is_empty() && datagram.len() + raw.len() > FRAGMENT_MTU {
                self.conn.send(&datagram).await?;
                datagram.clear();
            }
            datagram.extend_from_slice(&raw);
        }
        if !datagram.is_empty() {
            self.conn.send(&datagram).await?;
        }
        Ok(())
    }

    // handshake_records packs a handshake message into fragment records
    // and returns the full-message wire bytes for the transcript.
    fn handshake_records(
        &mut self,
        msg: &HandshakeMessage,
        epoch: u16,
    ) -> (Vec<PlainRecord>, Vec<u8>) {
        let body = msg.marshal_body();
        let message_seq = self.handshake_message_seq;
        self.handshake_message_seq += 1;

        let full_header = HandshakeHeader {
            handshake_type: msg.handshake_type(),
            length: body.len() as u32,
            message_sequence: message_seq,
            fragment_offset: 0,
            fragment_length: body.len() as u32,
        };
        let mut transcript_bytes = full_header.marshal();
        transcript_bytes.extend_from_slice(&body);

        let mut records = vec![];
        if body.len() <= FRAGMENT_MTU {
            records.push(PlainRecord {
                content_type: ContentType::Handshake,
                epoch,
                payload: transcript_bytes.clone(),
            });
        } else {
            let mut offset = 0;
            while offset < body.len() {
                let fragment_len = (body.len() - offset).min(FRAGMENT_MTU);
                let header = HandshakeHeader {
                    handshake_type: msg.handshake_type(),
                    length: body.len() as u32,
                    message_sequence: message_seq,
                    fragment_offset: offset as u32,
                    fragment_length: fragment_len as u32,
                };
                let mut payload = header.marshal();
                payload.extend_from_slice(&body[offset..offset + fragment_len]);
                records.push(PlainRecord {
                    content_type: ContentType::Handshake,
                    epoch,
                    payload,
                });
                offset += fragment_len;
            }
        }

        (records, transcript_bytes)
    }

    fn handle_record(&mut self, header: RecordLayerHeader, body: Vec<u8>) -> Result<Option<Alert>> {
        let detector = self
            .replay
            .entry(header.epoch)
            .or_insert_with(|| SlidingWindowDetector::new(REPLAY_WINDOW, MAX_SEQUENCE_NUMBER));
        if !detector.check(header.sequence_number) {
            return Ok(None);
        }

        let plaintext = if header.epoch > 0 {
            if self.cipher.is_none() {
                // Keys are not ready yet (ClientKeyExchange still being
                // processed); park the record and replay it later.
                let mut raw = header.marshal();
                raw.extend_from_slice(&body);
                self.queued_encrypted.push(raw);
                return Ok(None);
            }
            let mut raw = header.marshal();
            raw.extend_from_slice(&body);
            let cipher = self.cipher.as_ref().ok_or(Error::ErrCipherSuiteNotInit)?;
            match cipher.decrypt(&raw) {
                Ok(out) => out[RECORD_LAYER_HEADER_SIZE..].to_vec(),
                Err(err) => {
                    trace!("record failed to decrypt: {err}");
                    return Ok(None);
                }
            }
        } else {
            body
        };
        detector.accept();

        match header.content_type {
            ContentType::Handshake => {
                let _ = self.fragment_buffer.push(&plaintext);
            }
            ContentType::ChangeCipherSpec => {
                // ChangeCipherSpec advances the remote epoch monotonically.
                self.remote_epoch = self.remote_epoch.max(header.epoch + 1);
            }
            ContentType::Alert => {
                let alert = Alert::unmarshal(&plaintext)?;
                return Ok(Some(alert));
            }
            ContentType::ApplicationData => {
                self.pending_app_data.push(plaintext);
            }
            ContentType::Invalid => {}
        }
        Ok(None)
    }

    // handle_datagram decrypts and demultiplexes one datagram.
    fn handle_datagram(&mut self, datagram: &[u8]) -> Result<Option<Alert>> {
        for (header, body) in split_records(datagram) {
            if let Some(alert) = self.handle_record(header, body)? {
                return Ok(Some(alert));
            }
        }
        Ok(None)
    }

    // flush_queued re-runs records parked before the cipher was ready.
    fn flush_queued(&mut self) -> Result<()> {
        let queued = std::mem::take(&mut self.queued_encrypted);
        for raw in queued {
            if let Ok(header) = RecordLayerHeader::unmarshal(&raw) {
                let body = raw[RECORD_LAYER_HEADER_SIZE..].to_vec();
                let _ = self.handle_record(header, body)?;
            }
        }
        Ok(())
    }

    // pop_handshake_messages drains fully reassembled handshake messages
    // in order, dropping already-processed retransmits.
    fn pop_handshake_messages(&mut self) -> Vec<(HandshakeType, u16, Vec<u8>)> {
        let mut out = vec![];
        while let Some((typ, seq, body)) = self.fragment_buffer.pop() {
            if let Some(highest) = self.highest_processed_seq {
                if seq <= highest {
                    continue;
                }
            }
            self.highest_processed_seq = Some(seq);
            out.push((typ, seq, body));
        }
        out
    }
}

// reconstruct_wire_bytes rebuilds the full-message encoding used in the
// handshake transcript on the receiving side.
fn reconstruct_wire_bytes(typ: HandshakeType, seq: u16, body: &[u8]) -> Vec<u8> {
    let header = HandshakeHeader {
        handshake_type: typ,
        length: body.len() as u32,
        message_sequence: seq,
        fragment_offset: 0,
        fragment_length: body.len() as u32,
    };
    let mut out = header.marshal();
    out.extend_from_slice(body);
    out
}

// DTLSConn is an established DTLS 1.2 connection.
pub struct DTLSConn {
    conn: Arc<dyn Conn + Send + Sync>,
    state: State,
    io: Arc<Mutex<RecordIo>>,
    decrypted_rx: Mutex<mpsc::Receiver<Result<Vec<u8>>>>,
    closed: AtomicBool,
    // The final handshake flight, re-sent when the peer retransmits its
    // last flight (spurious retransmit handling).
    last_flight: Arc<Mutex<Vec<PlainRecord>>>,
}

impl DTLSConn {
    // new runs the handshake (client or server) and starts the reader.
    pub async fn new(
        conn: Arc<dyn Conn + Send + Sync>,
        config: Config,
        is_client: bool,
    ) -> Result<Self> {
        let mut io = RecordIo::new(conn.clone());
        let (state, final_flight) = tokio::time::timeout(
            config.handshake_timeout,
            handshake(&mut io, &config, is_client),
        )
        .await
        .map_err(|_| Error::ErrDeadlineExceeded)??;

        debug!(
            "dtls handshake complete: client={} suite={:?} srtp={:?}",
            is_client, state.cipher_suite, state.srtp_protection_profile
        );

        let pending = std::mem::take(&mut io.pending_app_data);
        let io = Arc::new(Mutex::new(io));
        let (decrypted_tx, decrypted_rx) = mpsc::channel(64);
        for p in pending {
            let _ = decrypted_tx.try_send(Ok(p));
        }

        let dtls_conn = DTLSConn {
            conn: conn.clone(),
            state,
            io: io.clone(),
            decrypted_rx: Mutex::new(decrypted_rx),
            closed: AtomicBool::new(false),
            last_flight: Arc::new(Mutex::new(final_flight)),
        };

        let last_flight = dtls_conn.last_flight.clone();
        tokio::spawn(async move {
            read_loop(conn, io, decrypted_tx, last_flight).await;
        });

        Ok(dtls_conn)
    }

    pub fn connection_state(&self) -> &State {
        &self.state
    }

    pub fn selected_srtp_protection_profile(&self) -> Option<SrtpProtectionProfile> {
        self.state.srtp_protection_profile
    }

    pub fn export_keying_material(&self, label: &str, length: usize) -> Result<Vec<u8>> {
        self.state.export_keying_material(label, length)
    }

    // read returns one decrypted application datagram.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut rx = self.decrypted_rx.lock().await;
        match rx.recv().await {
            Some(Ok(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Some(Err(err)) => Err(err),
            None => Err(Error::ErrConnClosed),
        }
    }

    // write protects one application datagram.
    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ErrConnClosed);
        }
        let mut io = self.io.lock().await;
        let epoch = io.local_epoch;
        let record = PlainRecord {
            content_type: ContentType::ApplicationData,
            epoch,
            payload: data.to_vec(),
        };
        let raw = io.marshal_record(&record)?;
        io.conn.send(&raw).await?;
        Ok(data.len())
    }

    // close sends close_notify for graceful teardown.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut io = self.io.lock().await;
        let epoch = io.local_epoch;
        let record = PlainRecord {
            content_type: ContentType::Alert,
            epoch,
            payload: Alert {
                alert_level: AlertLevel::Warning,
                alert_description: AlertDescription::CloseNotify,
            }
            .marshal(),
        };
        if let Ok(raw) = io.marshal_record(&record) {
            let _ = io.conn.send(&raw).await;
        }
        Ok(())
    }
}

async fn read_loop(
    conn: Arc<dyn Conn + Send + Sync>,
    io: Arc<Mutex<RecordIo>>,
    decrypted_tx: mpsc::Sender<Result<Vec<u8>>>,
    last_flight: Arc<Mutex<Vec<PlainRecord>>>,
) {
    let mut buf = vec![0u8; RECEIVE_MTU];
    loop {
        let n = match conn.recv(&mut buf).await {
            Ok(n) => n,
            Err(_) => {
                let _ = decrypted_tx.send(Err(Error::ErrConnClosed)).await;
                return;
            }
        };

        let mut io_guard = io.lock().await;
        match io_guard.handle_datagram(&buf[..n]) {
            Ok(Some(alert)) => {
                let err = if alert.alert_description == AlertDescription::CloseNotify {
                    Error::ErrAlertCloseNotify
                } else {
                    Error::ErrAlertFatal(alert.to_string())
                };
                let _ = decrypted_tx.send(Err(err)).await;
                return;
            }
            Ok(None) => {}
            Err(err) => {
                warn!("dtls read loop: {err}");
                continue;
            }
        }

        // A retransmitted final handshake flight from the peer means our
        // last flight was lost; answer with it again.
        io_guard.highest_processed_seq = None;
        let retransmit = !io_guard.pop_handshake_messages().is_empty();
        if retransmit {
            let flight = last_flight.lock().await.clone();
            let _ = io_guard.send_flight(&flight).await;
        }

        let pending = std::mem::take(&mut io_guard.pending_app_data);
        drop(io_guard);
        for p in pending {
            if decrypted_tx.send(Ok(p)).await.is_err() {
                return;
            }
        }
    }
}

//
// Handshake state machine
//

struct HandshakeTranscript(Vec<u8>);

impl HandshakeTranscript {
    fn push(&mut self, wire_bytes: &[u8]) {
        self.0.extend_from_slice(wire_bytes);
    }
}

// wait_messages runs the receive loop until one of the wanted message
// types arrives, retransmitting the current flight on a doubling timer.
// Messages already sitting in the reassembly buffer are drained first.
async fn wait_messages(
    io: &mut RecordIo,
    flight: &[PlainRecord],
    flight_interval: Duration,
    wanted: &[HandshakeType],
) -> Result<Vec<(HandshakeType, u16, Vec<u8>)>> {
    let mut collected = io.pop_handshake_messages();
    if collected.iter().any(|(t, _, _)| wanted.contains(t)) {
        return Ok(collected);
    }

    let mut interval = flight_interval;
    let mut resends = 0u32;
    let mut buf = vec![0u8; RECEIVE_MTU];

    loop {
        let deadline = tokio::time::sleep(interval);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                res = io.conn.recv(&mut buf) => {
                    let n = res.map_err(Error::from)?;
                    if let Some(alert) = io.handle_datagram(&buf[..n])? {
                        if alert.alert_level == AlertLevel::Fatal {
                            return Err(Error::ErrAlertFatal(alert.to_string()));
                        }
                        if alert.alert_description == AlertDescription::CloseNotify {
                            return Err(Error::ErrAlertCloseNotify);
                        }
                        continue;
                    }
                    let msgs = io.pop_handshake_messages();
                    let done = msgs.iter().any(|(t, _, _)| wanted.contains(t));
                    collected.extend(msgs);
                    if done {
                        return Ok(collected);
                    }
                }
                _ = &mut deadline => {
                    resends += 1;
                    if resends > MAX_FLIGHT_RESENDS {
                        return Err(Error::ErrDeadlineExceeded);
                    }
                    io.send_flight(flight).await?;
                    interval = (interval * 2).min(Duration::from_secs(60));
                    break;
                }
            }
        }
    }
}

type HandshakeOutput = (State, Vec<PlainRecord>);

async fn handshake(io: &mut RecordIo, config: &Config, is_client: bool) -> Result<HandshakeOutput> {
    if is_client {
        handshake_as_client(io, config).await
    } else {
        handshake_as_server(io, config).await
    }
}

fn local_extensions(config: &Config) -> Vec<Extension> {
    vec![
        Extension::SupportedGroups(vec![NAMED_CURVE_X25519, NAMED_CURVE_P256]),
        Extension::EcPointFormats(vec![0]),
        Extension::SignatureAlgorithms(vec![
            SIGNATURE_SCHEME_ECDSA_SECP256R1_SHA256,
            SIGNATURE_SCHEME_RSA_PKCS1_SHA256,
            SIGNATURE_SCHEME_ED25519,
        ]),
        Extension::UseSrtp {
            protection_profiles: config
                .srtp_protection_profiles
                .iter()
                .map(|p| *p as u16)
                .collect(),
            mki: vec![],
        },
        Extension::ExtendedMasterSecret,
        Extension::RenegotiationInfo(vec![]),
    ]
}

async fn handshake_as_client(io: &mut RecordIo, config: &Config) -> Result<HandshakeOutput> {
    let local_random = HandshakeRandom::generate();
    let certificate = config
        .certificates
        .first()
        .cloned()
        .ok_or(Error::ErrNoCertificates)?;

    let hello = |cookie: Vec<u8>| ClientHello {
        version: client_hello_version(),
        random: local_random,
        session_id: vec![],
        cookie,
        cipher_suites: default_cipher_suites(),
        extensions: local_extensions(config),
    };

    // Flight 1: ClientHello without cookie.
    let (ch1_records, ch1_wire) =
        io.handshake_records(&HandshakeMessage::ClientHello(hello(vec![])), 0);
    io.send_flight(&ch1_records).await?;

    let msgs = wait_messages(
        io,
        &ch1_records,
        config.flight_interval,
        &[
            HandshakeType::HelloVerifyRequest,
            HandshakeType::ServerHelloDone,
        ],
    )
    .await?;

    // The cookie round trip is the normal path; a server skipping it goes
    // straight to its flight, in which case the first hello stays in the
    // transcript.
    let mut transcript = HandshakeTranscript(vec![]);
    let mut server_msgs: Vec<(HandshakeType, u16, Vec<u8>)> = vec![];
    let mut current_flight = ch1_records;
    let got_hvr = msgs
        .iter()
        .any(|(t, _, _)| *t == HandshakeType::HelloVerifyRequest);
    if got_hvr {
        let mut cookie = vec![];
        for (typ, seq, body) in msgs {
            match typ {
                HandshakeType::HelloVerifyRequest => {
                    cookie = HelloVerifyRequest::unmarshal(&body)?.cookie;
                }
                _ => server_msgs.push((typ, seq, body)),
            }
        }
        // The first ClientHello and HelloVerifyRequest are excluded from
        // the transcript (RFC 6347 §4.2.1).
        let (records, wire) =
            io.handshake_records(&HandshakeMessage::ClientHello(hello(cookie)), 0);
        transcript.push(&wire);
        io.send_flight(&records).await?;
        current_flight = records;
    } else {
        transcript.push(&ch1_wire);
        server_msgs = msgs;
    }

    // Collect the server flight through ServerHelloDone.
    if !server_msgs
        .iter()
        .any(|(t, _, _)| *t == HandshakeType::ServerHelloDone)
    {
        server_msgs.extend(
            wait_messages(
                io,
                &current_flight,
                config.flight_interval,
                &[HandshakeType::ServerHelloDone],
            )
            .await?,
        );
    }

    let mut server_hello: Option<ServerHello> = None;
    let mut server_certificate: Option<CertificateMsg> = None;
    let mut server_key_exchange: Option<ServerKeyExchange> = None;
    let mut certificate_requested = false;
    for (typ, seq, body) in &server_msgs {
        transcript.push(&reconstruct_wire_bytes(*typ, *seq, body));
        match typ {
            HandshakeType::ServerHello => server_hello = Some(ServerHello::unmarshal(body)?),
            HandshakeType::Certificate => {
                server_certificate = Some(CertificateMsg::unmarshal(body)?)
            }
            HandshakeType::ServerKeyExchange => {
                server_key_exchange = Some(ServerKeyExchange::unmarshal(body)?)
            }
            HandshakeType::CertificateRequest => certificate_requested = true,
            _ => {}
        }
    }

    let server_hello = server_hello.ok_or(Error::ErrHandshakeMessageIncomplete)?;
    let server_certificate = server_certificate.ok_or(Error::ErrNoCertificates)?;
    let server_key_exchange = server_key_exchange.ok_or(Error::ErrHandshakeMessageIncomplete)?;

    if server_hello.cipher_suite == CipherSuiteId::Unsupported {
        return Err(Error::ErrCipherSuiteNoIntersection);
    }
    let srtp_profile = find_use_srtp(&server_hello.extensions)
        .and_then(|(profiles, _)| profiles.first().copied())
        .map(SrtpProtectionProfile::from);
    let extended_master_secret = has_extended_master_secret(&server_hello.extensions);

    // Verify the ECDHE parameter signature against the server certificate.
    let peer_cert = server_certificate
        .certificate
        .first()
        .ok_or(Error::ErrNoCertificates)?
        .clone();
    let spki = peer_spki(&peer_cert)?;
    let mut signed = vec![];
    signed.extend_from_slice(&local_random.0);
    signed.extend_from_slice(&server_hello.random.0);
    signed.extend_from_slice(&server_key_exchange.params_bytes());
    verify_signature(
        &spki,
        server_key_exchange.signature_scheme,
        &signed,
        &server_key_exchange.signature,
    )?;

    // ECDHE on the server's curve.
    let keypair = NamedCurveKeypair::generate(server_key_exchange.named_curve)?;
    let pre_master_secret = keypair.shared_secret(&server_key_exchange.public_key)?;

    // Flight 5.
    let mut flight5 = vec![];

    if certificate_requested {
        let (records, wire) = io.handshake_records(
            &HandshakeMessage::Certificate(CertificateMsg {
                certificate: certificate.certificate.clone(),
            }),
            0,
        );
        transcript.push(&wire);
        flight5.extend(records);
    }

    let (records, wire) = io.handshake_records(
        &HandshakeMessage::ClientKeyExchange(ClientKeyExchange {
            public_key: keypair.public_key.clone(),
        }),
        0,
    );
    transcript.push(&wire);
    flight5.extend(records);

    // Master secret: EMS binds it to the session hash through
    // ClientKeyExchange (RFC 7627), the classic form uses the randoms.
    let master_secret = if extended_master_secret {
        prf_extended_master_secret(&pre_master_secret, &session_hash(&transcript.0))?
    } else {
        prf_master_secret(&pre_master_secret, &local_random.0, &server_hello.random.0)?
    };

    if certificate_requested {
        let signature = sign_key_exchange(&certificate.private_key, &transcript.0)?;
        let (records, wire) = io.handshake_records(
            &HandshakeMessage::CertificateVerify(CertificateVerify {
                signature_scheme: SIGNATURE_SCHEME_ECDSA_SECP256R1_SHA256,
                signature,
            }),
            0,
        );
        transcript.push(&wire);
        flight5.extend(records);
    }

    // Initialize the cipher and bump the epoch with ChangeCipherSpec.
    let mut cipher = Box::new(CipherSuiteAes128GcmSha256::new(
        server_hello.cipher_suite == CipherSuiteId::TlsEcdheRsaWithAes128GcmSha256,
    ));
    cipher.init(&master_secret, &local_random.0, &server_hello.random.0, true)?;
    io.cipher = Some(cipher);
    io.flush_queued()?;

    flight5.push(PlainRecord {
        content_type: ContentType::ChangeCipherSpec,
        epoch: 0,
        payload: vec![1],
    });
    io.local_epoch = 1;

    let verify_data = prf_verify_data_client(&master_secret, &transcript.0)?;
    let (records, wire) = io.handshake_records(
        &HandshakeMessage::Finished(Finished { verify_data }),
        1,
    );
    transcript.push(&wire);
    flight5.extend(records);

    io.send_flight(&flight5).await?;

    // Expect the server ChangeCipherSpec plus Finished.
    let transcript_before_server_finished = transcript.0.clone();
    let msgs = wait_messages(
        io,
        &flight5,
        config.flight_interval,
        &[HandshakeType::Finished],
    )
    .await?;
    let (_, _, server_finished) = msgs
        .into_iter()
        .find(|(t, _, _)| *t == HandshakeType::Finished)
        .ok_or(Error::ErrHandshakeMessageIncomplete)?;
    let expected = prf_verify_data_server(&master_secret, &transcript_before_server_finished)?;
    let received = Finished::unmarshal(&server_finished)?.verify_data;
    if !bool::from(received.ct_eq(&expected)) {
        return Err(Error::ErrVerifyDataMismatch);
    }

    Ok((
        State {
            is_client: true,
            cipher_suite: Some(server_hello.cipher_suite),
            srtp_protection_profile: srtp_profile,
            peer_certificates: server_certificate.certificate,
            local_random: local_random.0,
            remote_random: server_hello.random.0,
            master_secret,
            extended_master_secret,
        },
        flight5,
    ))
}

async fn handshake_as_server(io: &mut RecordIo, config: &Config) -> Result<HandshakeOutput> {
    let local_random = HandshakeRandom::generate();
    let certificate = config
        .certificates
        .first()
        .cloned()
        .ok_or(Error::ErrNoCertificates)?;

    // Wait for the first ClientHello.
    wait_messages(
        io,
        &[],
        config.flight_interval,
        &[HandshakeType::ClientHello],
    )
    .await?;

    // Cookie exchange.
    let cookie: Vec<u8> = (0..COOKIE_LENGTH).map(|_| rand::thread_rng().gen()).collect();
    let (hvr_records, _) = io.handshake_records(
        &HandshakeMessage::HelloVerifyRequest(HelloVerifyRequest {
            version: PROTOCOL_VERSION1_2,
            cookie: cookie.clone(),
        }),
        0,
    );
    io.send_flight(&hvr_records).await?;

    // The second ClientHello must echo the cookie.
    let mut transcript = HandshakeTranscript(vec![]);
    let client_hello = {
        let msgs = wait_messages(
            io,
            &hvr_records,
            config.flight_interval,
            &[HandshakeType::ClientHello],
        )
        .await?;
        let (_, seq, body) = msgs
            .into_iter()
            .find(|(t, _, _)| *t == HandshakeType::ClientHello)
            .ok_or(Error::ErrHandshakeMessageIncomplete)?;
        let hello = ClientHello::unmarshal(&body)?;
        if hello.cookie != cookie {
            return Err(Error::ErrCookieMismatch);
        }
        transcript.push(&reconstruct_wire_bytes(HandshakeType::ClientHello, seq, &body));
        hello
    };

    // Negotiate suite, SRTP profile, curve and EMS.
    let cipher_suite_id = default_cipher_suites()
        .into_iter()
        .find(|cs| client_hello.cipher_suites.contains(cs))
        .ok_or(Error::ErrCipherSuiteNoIntersection)?;

    let client_profiles = find_use_srtp(&client_hello.extensions)
        .map(|(p, _)| p.to_vec())
        .unwrap_or_default();
    let srtp_profile = config
        .srtp_protection_profiles
        .iter()
        .find(|p| client_profiles.contains(&(**p as u16)))
        .copied()
        .ok_or(Error::ErrServerNoMatchingSrtpProfile)?;

    let groups = find_supported_groups(&client_hello.extensions)
        .map(|g| g.to_vec())
        .unwrap_or_else(|| vec![NAMED_CURVE_X25519]);
    let named_curve = [NAMED_CURVE_X25519, NAMED_CURVE_P256]
        .into_iter()
        .find(|c| groups.contains(c))
        .ok_or(Error::ErrNoSupportedEllipticCurves)?;

    let extended_master_secret = has_extended_master_secret(&client_hello.extensions);

    // Flight 4.
    let mut flight4 = vec![];
    let mut server_hello_extensions = vec![
        Extension::RenegotiationInfo(vec![]),
        Extension::EcPointFormats(vec![0]),
        Extension::UseSrtp {
            protection_profiles: vec![srtp_profile as u16],
            mki: vec![],
        },
    ];
    if extended_master_secret {
        server_hello_extensions.push(Extension::ExtendedMasterSecret);
    }

    let (records, wire) = io.handshake_records(
        &HandshakeMessage::ServerHello(ServerHello {
            version: PROTOCOL_VERSION1_2,
            random: local_random,
            session_id: vec![],
            cipher_suite: cipher_suite_id,
            extensions: server_hello_extensions,
        }),
        0,
    );
    transcript.push(&wire);
    flight4.extend(records);

    let (records, wire) = io.handshake_records(
        &HandshakeMessage::Certificate(CertificateMsg {
            certificate: certificate.certificate.clone(),
        }),
        0,
    );
    transcript.push(&wire);
    flight4.extend(records);

    let keypair = NamedCurveKeypair::generate(named_curve)?;
    let mut signed = vec![];
    signed.extend_from_slice(&client_hello.random.0);
    signed.extend_from_slice(&local_random.0);
    let ske = ServerKeyExchange {
        named_curve,
        public_key: keypair.public_key.clone(),
        signature_scheme: SIGNATURE_SCHEME_ECDSA_SECP256R1_SHA256,
        signature: vec![],
    };
    signed.extend_from_slice(&ske.params_bytes());
    let signature = sign_key_exchange(&certificate.private_key, &signed)?;
    let ske = ServerKeyExchange { signature, ..ske };

    let (records, wire) = io.handshake_records(&HandshakeMessage::ServerKeyExchange(ske), 0);
    transcript.push(&wire);
    flight4.extend(records);

    // The client certificate is required: WebRTC verifies it against the
    // SDP fingerprint.
    let (records, wire) = io.handshake_records(
        &HandshakeMessage::CertificateRequest(CertificateRequest {
            certificate_types: vec![64, 1], // ecdsa_sign, rsa_sign
            signature_schemes: vec![
                SIGNATURE_SCHEME_ECDSA_SECP256R1_SHA256,
                SIGNATURE_SCHEME_RSA_PKCS1_SHA256,
            ],
        }),
        0,
    );
    transcript.push(&wire);
    flight4.extend(records);

    let (records, wire) = io.handshake_records(&HandshakeMessage::ServerHelloDone, 0);
    transcript.push(&wire);
    flight4.extend(records);

    io.send_flight(&flight4).await?;

    // Client flight 5 part one: everything before the encrypted Finished.
    let msgs = wait_messages(
        io,
        &flight4,
        config.flight_interval,
        &[HandshakeType::CertificateVerify],
    )
    .await?;

    let mut client_certificate: Option<CertificateMsg> = None;
    let mut client_key_exchange: Option<ClientKeyExchange> = None;
    let mut saw_certificate_verify = false;
    let mut transcript_through_cke = vec![];

    for (typ, seq, body) in &msgs {
        match typ {
            HandshakeType::Certificate => {
                transcript.push(&reconstruct_wire_bytes(*typ, *seq, body));
                client_certificate = Some(CertificateMsg::unmarshal(body)?);
            }
            HandshakeType::ClientKeyExchange => {
                transcript.push(&reconstruct_wire_bytes(*typ, *seq, body));
                client_key_exchange = Some(ClientKeyExchange::unmarshal(body)?);
                transcript_through_cke = transcript.0.clone();
            }
            HandshakeType::CertificateVerify => {
                // Signed over the transcript up to (excluding) itself.
                let cv = CertificateVerify::unmarshal(body)?;
                let cert = client_certificate
                    .as_ref()
                    .and_then(|c| c.certificate.first())
                    .ok_or(Error::ErrNoCertificates)?;
                verify_signature(&peer_spki(cert)?, cv.signature_scheme, &transcript.0, &cv.signature)?;
                transcript.push(&reconstruct_wire_bytes(*typ, *seq, body));
                saw_certificate_verify = true;
            }
            _ => {}
        }
    }

    let client_certificate = client_certificate.ok_or(Error::ErrNoCertificates)?;
    let client_key_exchange = client_key_exchange.ok_or(Error::ErrHandshakeMessageIncomplete)?;
    if !saw_certificate_verify {
        return Err(Error::ErrCertificateVerify);
    }

    let pre_master_secret = keypair.shared_secret(&client_key_exchange.public_key)?;
    let master_secret = if extended_master_secret {
        prf_extended_master_secret(&pre_master_secret, &session_hash(&transcript_through_cke))?
    } else {
        prf_master_secret(&pre_master_secret, &client_hello.random.0, &local_random.0)?
    };

    let mut cipher = Box::new(CipherSuiteAes128GcmSha256::new(
        cipher_suite_id == CipherSuiteId::TlsEcdheRsaWithAes128GcmSha256,
    ));
    cipher.init(&master_secret, &client_hello.random.0, &local_random.0, false)?;
    io.cipher = Some(cipher);
    // The encrypted Finished usually arrived in the same datagram and was
    // parked; replay it now that the keys exist.
    io.flush_queued()?;

    let transcript_before_finished = transcript.0.clone();
    let msgs = wait_messages(
        io,
        &flight4,
        config.flight_interval,
        &[HandshakeType::Finished],
    )
    .await?;
    let (_, seq, finished_body) = msgs
        .into_iter()
        .find(|(t, _, _)| *t == HandshakeType::Finished)
        .ok_or(Error::ErrHandshakeMessageIncomplete)?;
    let client_finished = Finished::unmarshal(&finished_body)?;

    let expected = prf_verify_data_client(&master_secret, &transcript_before_finished)?;
    if !bool::from(client_finished.verify_data.ct_eq(&expected)) {
        return Err(Error::ErrVerifyDataMismatch);
    }
    transcript.push(&reconstruct_wire_bytes(
        HandshakeType::Finished,
        seq,
        &finished_body,
    ));

    // Flight 6: ChangeCipherSpec + Finished.
    let mut flight6 = vec![PlainRecord {
        content_type: ContentType::ChangeCipherSpec,
        epoch: 0,
        payload: vec![1],
    }];
    io.local_epoch = 1;

    let verify_data = prf_verify_data_server(&master_secret, &transcript.0)?;
    let (records, _) =
        io.handshake_records(&HandshakeMessage::Finished(Finished { verify_data }), 1);
    flight6.extend(records);
    io.send_flight(&flight6).await?;

    Ok((
        State {
            is_client: false,
            cipher_suite: Some(cipher_suite_id),
            srtp_protection_profile: Some(srtp_profile),
            peer_certificates: client_certificate.certificate,
            local_random: local_random.0,
            remote_random: client_hello.random.0,
            master_secret,
            extended_master_secret,
        },
        flight6,
    ))
}
