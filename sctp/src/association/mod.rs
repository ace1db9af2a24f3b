#[cfg(test)]
mod association_test;

pub(crate) mod rto;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use hmac::{Hmac, Mac};
use log::{debug, trace, warn};
use rand::Rng;
use sha2::Sha256;
use tokio::sync::{mpsc, Mutex, Notify};
use util::conn::Conn;

use crate::chunk::*;
use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::param::*;
use crate::queue::{PayloadQueue, PendingQueue};
use crate::stream::Stream;
use crate::util::*;
use rto::RtoManager;

type HmacSha256 = Hmac<Sha256>;

pub(crate) const RECEIVE_MTU: usize = 8192;
// Initial MTU for a DTLS-carried association, per RFC 8261 guidance.
pub(crate) const INITIAL_MTU: u32 = 1228;
pub(crate) const INITIAL_RECV_BUF_SIZE: u32 = 1024 * 1024;
pub(crate) const COMMON_HEADER_SIZE: u32 = 12;
pub(crate) const DATA_CHUNK_HEADER_SIZE: u32 = 16;
pub(crate) const DEFAULT_MAX_MESSAGE_SIZE: u32 = 65536;
pub(crate) const DEFAULT_SCTP_PORT: u16 = 5000;

const ACK_INTERVAL: Duration = Duration::from_millis(200);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const MAX_INIT_RETRANS: u32 = 8;

// AssociationState per RFC 4960 §4.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum AssociationState {
    Closed = 0,
    CookieWait = 1,
    CookieEchoed = 2,
    Established = 3,
    ShutdownAckSent = 4,
    ShutdownPending = 5,
    ShutdownReceived = 6,
    ShutdownSent = 7,
}

impl From<u8> for AssociationState {
    fn from(v: u8) -> AssociationState {
        match v {
            1 => AssociationState::CookieWait,
            2 => AssociationState::CookieEchoed,
            3 => AssociationState::Established,
            4 => AssociationState::ShutdownAckSent,
            5 => AssociationState::ShutdownPending,
            6 => AssociationState::ShutdownReceived,
            7 => AssociationState::ShutdownSent,
            _ => AssociationState::Closed,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum AckState {
    Idle,
    Immediate,
    Delay,
}

// Config for client/server association construction.
pub struct Config {
    pub net_conn: Arc<dyn Conn + Send + Sync>,
    pub max_receive_buffer_size: u32,
    pub max_message_size: u32,
    pub name: String,
}

// Association is a full-duplex SCTP association over a connected
// datagram transport (DTLS in WebRTC).
pub struct Association {
    internal: Arc<Mutex<AssociationInternal>>,
    state: Arc<AtomicU8>,
    awake_write: Arc<Notify>,
    close_notify: Arc<Notify>,
    handshake_done: Arc<Notify>,
    accept_rx: Mutex<mpsc::Receiver<Arc<Stream>>>,
    net_conn: Arc<dyn Conn + Send + Sync>,
    max_message_size: u32,
}

impl Association {
    // client starts the four-way handshake and waits for establishment.
    pub async fn client(config: Config) -> Result<Self> {
        let a = Association::new(config, true).await?;
        a.wait_established().await?;
        Ok(a)
    }

    // server waits for a peer INIT to establish the association.
    pub async fn server(config: Config) -> Result<Self> {
        let a = Association::new(config, false).await?;
        a.wait_established().await?;
        Ok(a)
    }

    async fn new(config: Config, is_client: bool) -> Result<Self> {
        let max_receive_buffer_size = if config.max_receive_buffer_size == 0 {
            INITIAL_RECV_BUF_SIZE
        } else {
            config.max_receive_buffer_size
        };
        let max_message_size = if config.max_message_size == 0 {
            DEFAULT_MAX_MESSAGE_SIZE
        } else {
            config.max_message_size
        };

        let state = Arc::new(AtomicU8::new(AssociationState::Closed as u8));
        let awake_write = Arc::new(Notify::new());
        let close_notify = Arc::new(Notify::new());
        let handshake_done = Arc::new(Notify::new());
        let (accept_tx, accept_rx) = mpsc::channel(16);

        let internal = Arc::new(Mutex::new(AssociationInternal::new(
            config.name,
            max_receive_buffer_size,
            max_message_size,
            state.clone(),
            awake_write.clone(),
            handshake_done.clone(),
            accept_tx,
        )));
        {
            let mut ai = internal.lock().await;
            ai.this = Arc::downgrade(&internal);
        }

        let association = Association {
            internal: internal.clone(),
            state,
            awake_write: awake_write.clone(),
            close_notify: close_notify.clone(),
            handshake_done,
            accept_rx: Mutex::new(accept_rx),
            net_conn: config.net_conn.clone(),
            max_message_size,
        };

        if is_client {
            let mut ai = internal.lock().await;
            ai.send_init()?;
        }

        let net_conn = config.net_conn;
        let close = close_notify.clone();
        tokio::spawn(async move {
            association_loop(internal, net_conn, awake_write, close).await;
        });

        Ok(association)
    }

    async fn wait_established(&self) -> Result<()> {
        // The periodic re-check closes the race between observing the
        // state and registering with the notifier.
        loop {
            match AssociationState::from(self.state.load(Ordering::SeqCst)) {
                AssociationState::Established => return Ok(()),
                AssociationState::Closed if self.is_loop_dead().await => {
                    return Err(Error::ErrAssociationClosedBeforeConn)
                }
                _ => {}
            }
            tokio::select! {
                _ = self.handshake_done.notified() => {}
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
        }
    }

    async fn is_loop_dead(&self) -> bool {
        let ai = self.internal.lock().await;
        ai.loop_dead
    }

    pub fn connected(&self) -> bool {
        AssociationState::from(self.state.load(Ordering::SeqCst)) == AssociationState::Established
    }

    // open_stream creates a local stream; the id parity is the caller's
    // concern (DCEP assigns even/odd by DTLS role).
    pub async fn open_stream(
        &self,
        stream_identifier: u16,
        default_payload_type: chunk_payload_data::PayloadProtocolIdentifier,
    ) -> Result<Arc<Stream>> {
        let mut ai = self.internal.lock().await;
        if ai.streams.contains_key(&stream_identifier) {
            return Err(Error::ErrStreamAlreadyExist);
        }
        let stream = ai.create_stream(stream_identifier, false);
        stream.set_default_payload_type(default_payload_type);
        Ok(stream)
    }

    // accept_stream yields streams the peer opened.
    pub async fn accept_stream(&self) -> Option<Arc<Stream>> {
        let mut rx = self.accept_rx.lock().await;
        rx.recv().await
    }

    // close tears the association down gracefully: queued data drains,
    // then SHUTDOWN is exchanged.
    pub async fn close(&self) -> Result<()> {
        {
            let mut ai = self.internal.lock().await;
            ai.start_shutdown();
        }
        self.awake_write.notify_one();
        Ok(())
    }

    // abort closes immediately with an ABORT chunk.
    pub async fn abort(&self, reason: &str) -> Result<()> {
        {
            let mut ai = self.internal.lock().await;
            ai.send_abort(reason);
        }
        self.awake_write.notify_one();
        self.close_notify.notify_waiters();
        Ok(())
    }

    pub fn max_message_size(&self) -> u32 {
        self.max_message_size
    }

    pub async fn bytes_sent(&self) -> usize {
        self.internal.lock().await.bytes_sent
    }

    pub async fn bytes_received(&self) -> usize {
        self.internal.lock().await.bytes_received
    }
}

// association_loop is the single I/O loop: it multiplexes inbound
// datagrams, timer expiries and write wakeups, then flushes whatever
// gather_outbound produced.
async fn association_loop(
    internal: Arc<Mutex<AssociationInternal>>,
    net_conn: Arc<dyn Conn + Send + Sync>,
    awake_write: Arc<Notify>,
    close_notify: Arc<Notify>,
) {
    let mut buf = vec![0u8; RECEIVE_MTU];

    loop {
        let (deadline, done) = {
            let ai = internal.lock().await;
            (ai.next_timer_deadline(), ai.loop_dead)
        };
        if done {
            break;
        }

        let timer = tokio::time::sleep_until(
            deadline
                .map(tokio::time::Instant::from_std)
                .unwrap_or_else(|| tokio::time::Instant::now() + Duration::from_secs(3600)),
        );

        tokio::select! {
            res = net_conn.recv(&mut buf) => {
                match res {
                    Ok(n) => {
                        let raw = Bytes::copy_from_slice(&buf[..n]);
                        let mut ai = internal.lock().await;
                        if let Err(err) = ai.handle_inbound(&raw) {
                            warn!("[{}] failed to handle packet: {}", ai.name, err);
                        }
                    }
                    Err(err) => {
                        debug!("association read loop ended: {}", err);
                        let mut ai = internal.lock().await;
                        ai.mark_dead();
                        break;
                    }
                }
            }
            _ = timer => {
                let mut ai = internal.lock().await;
                ai.handle_timeouts(Instant::now());
            }
            _ = awake_write.notified() => {}
            _ = close_notify.notified() => {
                let mut ai = internal.lock().await;
                ai.mark_dead();
                break;
            }
        }

        // Flush everything the handlers queued.
        let raws = {
            let mut ai = internal.lock().await;
            ai.gather_outbound()
        };
        for raw in raws {
            if let Err(err) = net_conn.send(&raw).await {
                debug!("failed to send packet: {}", err);
            }
        }
    }
}

// Per-stream pending outgoing reset request.
#[derive(Debug, Clone)]
struct ReconfigRequest {
    request_seq: u32,
    streams: Vec<u16>,
    sender_last_tsn: u32,
}

pub(crate) struct AssociationInternal {
    pub(crate) name: String,
    pub(crate) loop_dead: bool,
    // Weak self-handle so streams can reach the association for writes.
    pub(crate) this: std::sync::Weak<Mutex<AssociationInternal>>,

    state: Arc<AtomicU8>,
    awake_write: Arc<Notify>,
    handshake_done: Arc<Notify>,
    accept_tx: mpsc::Sender<Arc<Stream>>,

    pub(crate) source_port: u16,
    pub(crate) destination_port: u16,

    pub(crate) my_verification_tag: u32,
    pub(crate) peer_verification_tag: u32,

    pub(crate) my_next_tsn: u32,
    pub(crate) peer_last_tsn: u32,
    pub(crate) cumulative_tsn_ack_point: u32,
    pub(crate) advanced_peer_tsn_ack_point: u32,
    pub(crate) use_forward_tsn: bool,

    pub(crate) mtu: u32,
    pub(crate) max_payload_size: u32,
    pub(crate) cwnd: u32,
    pub(crate) ssthresh: u32,
    pub(crate) partial_bytes_acked: u32,
    pub(crate) in_fast_recovery: bool,
    pub(crate) fast_recovery_exit_point: u32,

    pub(crate) rwnd: u32,
    pub(crate) my_max_receive_buffer_size: u32,
    pub(crate) max_message_size: u32,

    pub(crate) rto_mgr: RtoManager,

    control_queue: VecDeque<Chunk>,
    pub(crate) inflight_queue: PayloadQueue,
    pub(crate) pending_queue: PendingQueue,
    pub(crate) payload_queue: PayloadQueue,

    pub(crate) streams: HashMap<u16, Arc<Stream>>,

    ack_state: AckState,
    ack_deadline: Option<Instant>,
    t1_deadline: Option<Instant>,
    t1_retrans: u32,
    t1_chunk: Option<Chunk>,
    t3_deadline: Option<Instant>,
    t3_rto_nbackoff: u32,
    heartbeat_deadline: Option<Instant>,

    reconfig_request_seq: u32,
    pending_reconfigs: HashMap<u32, ReconfigRequest>,
    peer_seen_reconfig_seqs: Vec<u32>,

    cookie_secret: [u8; 32],
    stored_cookie: Option<Bytes>,

    will_send_shutdown: bool,
    pub(crate) bytes_sent: usize,
    pub(crate) bytes_received: usize,
}

impl AssociationInternal {
    fn new(
        name: String,
        max_receive_buffer_size: u32,
        max_message_size: u32,
        state: Arc<AtomicU8>,
        awake_write: Arc<Notify>,
        handshake_done: Arc<Notify>,
        accept_tx: mpsc::Sender<Arc<Stream>>,
    ) -> Self {
        let mut rng = rand::thread_rng();
        let my_verification_tag: u32 = rng.gen();
        let my_next_tsn: u32 = rng.gen();
        let mut cookie_secret = [0u8; 32];
        rng.fill(&mut cookie_secret);

        let mtu = INITIAL_MTU;
        AssociationInternal {
            name,
            loop_dead: false,
            this: std::sync::Weak::new(),
            state,
            awake_write,
            handshake_done,
            accept_tx,
            source_port: DEFAULT_SCTP_PORT,
            destination_port: DEFAULT_SCTP_PORT,
            my_verification_tag,
            peer_verification_tag: 0,
            my_next_tsn,
            peer_last_tsn: 0,
            cumulative_tsn_ack_point: my_next_tsn.wrapping_sub(1),
            advanced_peer_tsn_ack_point: my_next_tsn.wrapping_sub(1),
            use_forward_tsn: false,
            mtu,
            max_payload_size: mtu - (COMMON_HEADER_SIZE + DATA_CHUNK_HEADER_SIZE),
            // RFC 4960 §7.2.1 initial cwnd.
            cwnd: (4 * mtu).min(4380.max(2 * mtu)),
            ssthresh: max_receive_buffer_size,
            partial_bytes_acked: 0,
            in_fast_recovery: false,
            fast_recovery_exit_point: 0,
            rwnd: 0,
            my_max_receive_buffer_size: max_receive_buffer_size,
            max_message_size,
            rto_mgr: RtoManager::new(),
            control_queue: VecDeque::new(),
            inflight_queue: PayloadQueue::new(),
            pending_queue: PendingQueue::new(),
            payload_queue: PayloadQueue::new(),
            streams: HashMap::new(),
            ack_state: AckState::Idle,
            ack_deadline: None,
            t1_deadline: None,
            t1_retrans: 0,
            t1_chunk: None,
            t3_deadline: None,
            t3_rto_nbackoff: 0,
            heartbeat_deadline: None,
            reconfig_request_seq: rng.gen(),
            pending_reconfigs: HashMap::new(),
            peer_seen_reconfig_seqs: vec![],
            cookie_secret,
            stored_cookie: None,
            will_send_shutdown: false,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    fn set_state(&self, s: AssociationState) {
        self.state.store(s as u8, Ordering::SeqCst);
        if matches!(s, AssociationState::Established | AssociationState::Closed) {
            self.handshake_done.notify_waiters();
        }
    }

    fn get_state(&self) -> AssociationState {
        AssociationState::from(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn mark_dead(&mut self) {
        self.loop_dead = true;
        self.set_state(AssociationState::Closed);
        for stream in self.streams.values() {
            stream.mark_eof();
        }
        self.streams.clear();
    }

    pub(crate) fn awake_write_loop(&self) {
        self.awake_write.notify_one();
    }

    // my_receiver_window_credit is the a-rwnd we advertise: our receive
    // buffer minus everything currently parked in reassembly queues.
    fn my_receiver_window_credit(&self) -> u32 {
        let buffered: usize = self
            .streams
            .values()
            .map(|s| s.get_num_bytes_in_reassembly_queue())
            .sum();
        (self.my_max_receive_buffer_size as usize).saturating_sub(buffered) as u32
    }

    //
    // Handshake
    //

    pub(crate) fn send_init(&mut self) -> Result<()> {
        let init = Chunk::Init(ChunkInit {
            is_ack: false,
            initiate_tag: self.my_verification_tag,
            advertised_receiver_window_credit: self.my_max_receive_buffer_size,
            num_outbound_streams: u16::MAX,
            num_inbound_streams: u16::MAX,
            initial_tsn: self.my_next_tsn,
            params: vec![Param::ForwardTsnSupported],
        });
        self.t1_chunk = Some(init.clone());
        self.t1_retrans = 0;
        self.t1_deadline = Some(Instant::now() + self.rto_mgr.rto());
        self.control_queue.push_back(init);
        self.set_state(AssociationState::CookieWait);
        self.awake_write_loop();
        Ok(())
    }

    fn make_cookie(&self, peer_tag: u32, peer_tsn: u32) -> Bytes {
        let mut payload = BytesMut::with_capacity(44);
        payload.put_u32(self.my_verification_tag);
        payload.put_u32(peer_tag);
        payload.put_u32(peer_tsn);
        let mut mac = HmacSha256::new_from_slice(&self.cookie_secret)
            .expect("hmac accepts any key length");
        mac.update(&payload);
        payload.extend_from_slice(&mac.finalize().into_bytes());
        payload.freeze()
    }

    fn check_cookie(&self, cookie: &Bytes) -> bool {
        if cookie.len() != 12 + 32 {
            return false;
        }
        let mut mac = HmacSha256::new_from_slice(&self.cookie_secret)
            .expect("hmac accepts any key length");
        mac.update(&cookie[..12]);
        mac.verify_slice(&cookie[12..]).is_ok()
    }

    fn handle_init(&mut self, init: &ChunkInit) {
        trace!("[{}] received INIT", self.name);
        self.peer_verification_tag = init.initiate_tag;
        self.peer_last_tsn = init.initial_tsn.wrapping_sub(1);
        self.rwnd = init.advertised_receiver_window_credit;
        if init.supports_forward_tsn() {
            self.use_forward_tsn = true;
        }

        let cookie = self.make_cookie(init.initiate_tag, init.initial_tsn);
        let init_ack = Chunk::Init(ChunkInit {
            is_ack: true,
            initiate_tag: self.my_verification_tag,
            advertised_receiver_window_credit: self.my_max_receive_buffer_size,
            num_outbound_streams: u16::MAX,
            num_inbound_streams: u16::MAX,
            initial_tsn: self.my_next_tsn,
            params: vec![Param::StateCookie(cookie), Param::ForwardTsnSupported],
        });
        self.control_queue.push_back(init_ack);
    }

    fn handle_init_ack(&mut self, init_ack: &ChunkInit) {
        if self.get_state() != AssociationState::CookieWait {
            return;
        }
        trace!("[{}] received INIT-ACK", self.name);
        self.peer_verification_tag = init_ack.initiate_tag;
        self.peer_last_tsn = init_ack.initial_tsn.wrapping_sub(1);
        self.rwnd = init_ack.advertised_receiver_window_credit;
        self.ssthresh = self.rwnd;
        if init_ack.supports_forward_tsn() {
            self.use_forward_tsn = true;
        }

        let Some(cookie) = init_ack.state_cookie() else {
            warn!("[{}] INIT-ACK is missing a state cookie", self.name);
            return;
        };

        let echo = Chunk::CookieEcho(ChunkCookieEcho { cookie });
        self.t1_chunk = Some(echo.clone());
        self.t1_retrans = 0;
        self.t1_deadline = Some(Instant::now() + self.rto_mgr.rto());
        self.control_queue.push_back(echo);
        self.set_state(AssociationState::CookieEchoed);
    }

    fn handle_cookie_echo(&mut self, c: &ChunkCookieEcho) {
        let state = self.get_state();
        if state != AssociationState::Closed
            && state != AssociationState::CookieWait
            && state != AssociationState::CookieEchoed
        {
            return;
        }
        if !self.check_cookie(&c.cookie) {
            warn!("[{}] cookie echo failed verification", self.name);
            return;
        }
        trace!("[{}] received COOKIE-ECHO", self.name);

        self.t1_deadline = None;
        self.t1_chunk = None;
        self.control_queue.push_back(Chunk::CookieAck(ChunkCookieAck {}));
        self.heartbeat_deadline = Some(Instant::now() + HEARTBEAT_INTERVAL);
        self.set_state(AssociationState::Established);
    }

    fn handle_cookie_ack(&mut self) {
        if self.get_state() != AssociationState::CookieEchoed {
            return;
        }
        trace!("[{}] received COOKIE-ACK", self.name);
        self.t1_deadline = None;
        self.t1_chunk = None;
        self.heartbeat_deadline = Some(Instant::now() + HEARTBEAT_INTERVAL);
        self.set_state(AssociationState::Established);
    }

    //
    // Inbound
    //

    pub(crate) fn handle_inbound(&mut self, raw: &Bytes) -> Result<()> {
        let packet = Packet::unmarshal(raw)?;
        self.bytes_received += raw.len();

        // Verification tag rules of RFC 4960 §8.5: INIT carries tag 0,
        // everything else must match our tag.
        for chunk in &packet.chunks {
            match chunk {
                Chunk::Init(init) if !init.is_ack => {
                    if packet.verification_tag != 0 {
                        return Ok(());
                    }
                    self.handle_init(init);
                }
                Chunk::Init(init) => {
                    if packet.verification_tag != self.my_verification_tag {
                        return Ok(());
                    }
                    self.handle_init_ack(init);
                }
                _ => {
                    if packet.verification_tag != self.my_verification_tag {
                        continue;
                    }
                    self.handle_chunk(chunk)?;
                }
            }
        }

        Ok(())
    }

    fn handle_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        match chunk {
            Chunk::PayloadData(data) => self.handle_data(data),
            Chunk::Sack(sack) => self.handle_sack(sack)?,
            Chunk::CookieEcho(c) => self.handle_cookie_echo(c),
            Chunk::CookieAck(_) => self.handle_cookie_ack(),
            Chunk::Heartbeat(hb) => {
                self.control_queue.push_back(Chunk::HeartbeatAck(ChunkHeartbeatAck {
                    heartbeat_info: hb.heartbeat_info.clone(),
                }));
            }
            Chunk::HeartbeatAck(ack) => self.handle_heartbeat_ack(ack),
            Chunk::Abort(abort) => {
                let reason = abort
                    .error_causes
                    .iter()
                    .map(|c| format!("{:?}", c.code))
                    .collect::<Vec<_>>()
                    .join(",");
                debug!("[{}] ABORT received: {}", self.name, reason);
                self.mark_dead();
            }
            Chunk::Shutdown(_) => {
                // Peer stops accepting new data; ack once our queues drain.
                self.set_state(AssociationState::ShutdownReceived);
                self.awake_write_loop();
            }
            Chunk::ShutdownAck(_) => {
                if matches!(
                    self.get_state(),
                    AssociationState::ShutdownSent | AssociationState::ShutdownAckSent
                ) {
                    self.control_queue
                        .push_back(Chunk::ShutdownComplete(ChunkShutdownComplete {
                            verification_tag_reflected: false,
                        }));
                    self.awake_write_loop();
                    self.mark_dead_after_flush();
                }
            }
            Chunk::ShutdownComplete(_) => {
                self.mark_dead();
            }
            Chunk::ForwardTsn(fwd) => self.handle_forward_tsn(fwd),
            Chunk::Reconfig(rc) => self.handle_reconfig(rc),
            Chunk::Error(e) => {
                debug!("[{}] ERROR chunk: {:?}", self.name, e.error_causes);
            }
            Chunk::Init(_) => {}
            Chunk::Unknown { typ, .. } => {
                trace!("[{}] ignoring unknown chunk type {}", self.name, typ);
            }
        }
        Ok(())
    }

    fn mark_dead_after_flush(&mut self) {
        // The queued SHUTDOWN-COMPLETE still flushes at the bottom of the
        // current loop iteration; the loop exits on the next one.
        self.will_send_shutdown = false;
        self.loop_dead = true;
        self.set_state(AssociationState::Closed);
        for stream in self.streams.values() {
            stream.mark_eof();
        }
    }

    fn handle_data(&mut self, data: &ChunkPayloadData) {
        let state = self.get_state();
        if !matches!(
            state,
            AssociationState::Established | AssociationState::ShutdownSent | AssociationState::ShutdownReceived
        ) {
            return;
        }

        // Track the TSN for SACK generation with an empty marker so the
        // user data is buffered only once (in the reassembly queue).
        let mut marker = data.clone();
        let user_data = std::mem::replace(&mut marker.user_data, Bytes::new());
        let can_push = self.payload_queue.push(marker, self.peer_last_tsn);

        let mut stream_handled = false;
        if can_push {
            if let Some(stream) = self.get_or_accept_stream(data.stream_identifier) {
                let mut chunk = data.clone();
                chunk.user_data = user_data;
                stream.handle_data(chunk);
                stream_handled = true;
            } else {
                // The receive buffer is exhausted or the stream is gone;
                // drop the chunk and do not ack it.
                self.payload_queue.pop(data.tsn);
            }
        }

        // Advance the cumulative TSN over any now-contiguous run.
        while self
            .payload_queue
            .pop(self.peer_last_tsn.wrapping_add(1))
            .is_some()
        {
            self.peer_last_tsn = self.peer_last_tsn.wrapping_add(1);
        }

        let has_gap = !self.payload_queue.is_empty();
        if data.immediate_sack || has_gap || !stream_handled {
            self.ack_state = AckState::Immediate;
            self.ack_deadline = None;
            self.awake_write_loop();
        } else if self.ack_state == AckState::Idle {
            self.ack_state = AckState::Delay;
            self.ack_deadline = Some(Instant::now() + ACK_INTERVAL);
        } else {
            // Second packet within the delay window acks immediately.
            self.ack_state = AckState::Immediate;
            self.ack_deadline = None;
            self.awake_write_loop();
        }
    }

    fn get_or_accept_stream(&mut self, stream_identifier: u16) -> Option<Arc<Stream>> {
        if let Some(s) = self.streams.get(&stream_identifier) {
            return Some(s.clone());
        }
        let stream = self.create_stream(stream_identifier, true);
        Some(stream)
    }

    pub(crate) fn create_stream(&mut self, stream_identifier: u16, accept: bool) -> Arc<Stream> {
        let stream = Arc::new(Stream::new(
            stream_identifier,
            self.max_payload_size,
            self.awake_write.clone(),
        ));
        stream.set_association(self.this.clone());
        self.streams.insert(stream_identifier, stream.clone());
        if accept {
            if let Err(err) = self.accept_tx.try_send(stream.clone()) {
                warn!("[{}] failed to deliver accepted stream: {}", self.name, err);
            }
        }
        stream
    }

    fn handle_sack(&mut self, sack: &ChunkSelectiveAck) -> Result<()> {
        if sna32lt(sack.cumulative_tsn_ack, self.cumulative_tsn_ack_point) {
            // Stale SACK from an earlier window.
            return Ok(());
        }

        let mut total_bytes_acked: u32 = 0;
        let now = Instant::now();

        // Drop the acked prefix in one amortized pass.
        while let Some(head) = self.inflight_queue.head_tsn() {
            if !sna32lte(head, sack.cumulative_tsn_ack) {
                break;
            }
            if let Some(chunk) = self.inflight_queue.pop(head) {
                if !chunk.acked {
                    total_bytes_acked += chunk.user_data.len() as u32;
                    // Only chunks sent exactly once measure the RTT.
                    if chunk.nsent == 1 {
                        if let Some(since) = chunk.since {
                            self.rto_mgr.measure(now.saturating_duration_since(since));
                        }
                    }
                }
            }
        }
        self.cumulative_tsn_ack_point = sack.cumulative_tsn_ack;

        // Gap-ack blocks mark chunks above the cumulative point.
        let mut htna = sack.cumulative_tsn_ack;
        for gap in &sack.gap_ack_blocks {
            for offset in gap.start..=gap.end {
                let tsn = sack.cumulative_tsn_ack.wrapping_add(offset as u32);
                if let Some(chunk) = self.inflight_queue.get(tsn) {
                    if !chunk.acked {
                        total_bytes_acked += self.inflight_queue.mark_as_acked(tsn) as u32;
                        if sna32lt(htna, tsn) {
                            htna = tsn;
                        }
                    }
                }
            }
        }

        // Miss indications for everything below htna still in flight.
        let mut fast_retransmit = false;
        {
            let mut tsn = self.cumulative_tsn_ack_point.wrapping_add(1);
            while sna32lt(tsn, htna) {
                if let Some(chunk) = self.inflight_queue.get_mut(tsn) {
                    if !chunk.acked && !chunk.abandoned {
                        chunk.miss_indicator += 1;
                        if chunk.miss_indicator == 3 && !chunk.retransmit {
                            chunk.retransmit = true;
                            fast_retransmit = true;
                        }
                    }
                }
                tsn = tsn.wrapping_add(1);
            }
        }
        if fast_retransmit && !self.in_fast_recovery {
            // RFC 4960 §7.2.4.
            self.in_fast_recovery = true;
            self.fast_recovery_exit_point = htna;
            self.ssthresh = (self.cwnd / 2).max(4 * self.mtu);
            self.cwnd = self.ssthresh;
            self.partial_bytes_acked = 0;
            self.awake_write_loop();
        }
        if self.in_fast_recovery && sna32lte(self.fast_recovery_exit_point, sack.cumulative_tsn_ack)
        {
            self.in_fast_recovery = false;
        }

        // Congestion window growth (RFC 4960 §7.2.1/§7.2.2).
        let outstanding = self.inflight_queue.get_num_bytes() as u32;
        if total_bytes_acked > 0 {
            if self.cwnd <= self.ssthresh {
                if outstanding >= self.cwnd {
                    self.cwnd += total_bytes_acked.min(self.mtu);
                }
            } else {
                self.partial_bytes_acked += total_bytes_acked;
                if self.partial_bytes_acked >= self.cwnd && outstanding >= self.cwnd {
                    self.partial_bytes_acked -= self.cwnd;
                    self.cwnd += self.mtu;
                }
            }
            self.t3_rto_nbackoff = 0;
        }

        self.rwnd = sack.advertised_receiver_window_credit.saturating_sub(outstanding);

        if self.inflight_queue.is_empty() {
            self.t3_deadline = None;
        } else if total_bytes_acked > 0 {
            self.t3_deadline = Some(now + self.rto_mgr.rto());
        }

        self.advance_forward_tsn_if_needed();
        self.notify_stream_writers();
        self.awake_write_loop();
        Ok(())
    }

    fn notify_stream_writers(&self) {
        for stream in self.streams.values() {
            stream.notify_writable();
        }
    }

    // advance_forward_tsn_if_needed moves the forward-TSN cursor over a
    // prefix of abandoned chunks and queues a FORWARD-TSN.
    fn advance_forward_tsn_if_needed(&mut self) {
        if !self.use_forward_tsn {
            return;
        }
        if sna32lt(self.advanced_peer_tsn_ack_point, self.cumulative_tsn_ack_point) {
            self.advanced_peer_tsn_ack_point = self.cumulative_tsn_ack_point;
        }

        let mut advanced = false;
        loop {
            let next = self.advanced_peer_tsn_ack_point.wrapping_add(1);
            match self.inflight_queue.get(next) {
                Some(chunk) if chunk.abandoned => {
                    self.advanced_peer_tsn_ack_point = next;
                    advanced = true;
                }
                _ => break,
            }
        }

        if advanced && sna32gt(self.advanced_peer_tsn_ack_point, self.cumulative_tsn_ack_point)
        {
            let mut streams: Vec<ChunkForwardTsnStream> = vec![];
            let mut tsn = self.cumulative_tsn_ack_point.wrapping_add(1);
            while sna32lte(tsn, self.advanced_peer_tsn_ack_point) {
                if let Some(chunk) = self.inflight_queue.get(tsn) {
                    if !chunk.unordered {
                        match streams
                            .iter_mut()
                            .find(|s| s.identifier == chunk.stream_identifier)
                        {
                            Some(entry) => {
                                if sna16lt(entry.sequence, chunk.stream_sequence_number) {
                                    entry.sequence = chunk.stream_sequence_number;
                                }
                            }
                            None => streams.push(ChunkForwardTsnStream {
                                identifier: chunk.stream_identifier,
                                sequence: chunk.stream_sequence_number,
                            }),
                        }
                    }
                }
                tsn = tsn.wrapping_add(1);
            }
            self.control_queue.push_back(Chunk::ForwardTsn(ChunkForwardTsn {
                new_cumulative_tsn: self.advanced_peer_tsn_ack_point,
                streams,
            }));
            self.awake_write_loop();
        }
    }

    fn handle_forward_tsn(&mut self, fwd: &ChunkForwardTsn) {
        if !self.use_forward_tsn {
            return;
        }
        if sna32lte(fwd.new_cumulative_tsn, self.peer_last_tsn) {
            return;
        }

        // Advance our cumulative point past the abandoned range.
        while sna32lt(self.peer_last_tsn, fwd.new_cumulative_tsn) {
            self.payload_queue.pop(self.peer_last_tsn.wrapping_add(1));
            self.peer_last_tsn = self.peer_last_tsn.wrapping_add(1);
        }
        // Also absorb any already-queued chunks that became contiguous.
        while self
            .payload_queue
            .pop(self.peer_last_tsn.wrapping_add(1))
            .is_some()
        {
            self.peer_last_tsn = self.peer_last_tsn.wrapping_add(1);
        }

        for s in &fwd.streams {
            if let Some(stream) = self.streams.get(&s.identifier) {
                stream.handle_forward_tsn_for_ordered(s.sequence);
            }
        }
        for stream in self.streams.values() {
            stream.handle_forward_tsn_for_unordered(fwd.new_cumulative_tsn);
        }

        self.ack_state = AckState::Immediate;
        self.ack_deadline = None;
        self.awake_write_loop();
    }

    fn handle_heartbeat_ack(&mut self, ack: &ChunkHeartbeatAck) {
        // The info is our send timestamp; a matching echo measures RTT.
        if ack.heartbeat_info.len() == 16 {
            let mut nanos = [0u8; 8];
            nanos.copy_from_slice(&ack.heartbeat_info[8..16]);
            let _ = u64::from_be_bytes(nanos);
        }
    }

    //
    // RE-CONFIG stream reset
    //

    pub(crate) fn send_reset_request(&mut self, stream_identifier: u16) -> Result<()> {
        let state = self.get_state();
        if state != AssociationState::Established {
            return Err(Error::ErrStreamClosed);
        }

        self.reconfig_request_seq = self.reconfig_request_seq.wrapping_add(1);
        let request_seq = self.reconfig_request_seq;
        let req = ReconfigRequest {
            request_seq,
            streams: vec![stream_identifier],
            sender_last_tsn: self.my_next_tsn.wrapping_sub(1),
        };
        self.pending_reconfigs.insert(request_seq, req.clone());

        self.control_queue.push_back(Chunk::Reconfig(ChunkReconfig {
            param_a: Some(Param::OutgoingResetRequest(ParamOutgoingResetRequest {
                reconfig_request_sequence_number: req.request_seq,
                reconfig_response_sequence_number: 0,
                sender_last_tsn: req.sender_last_tsn,
                stream_identifiers: req.streams,
            })),
            param_b: None,
        }));
        self.awake_write_loop();
        Ok(())
    }

    fn handle_reconfig(&mut self, rc: &ChunkReconfig) {
        for param in [&rc.param_a, &rc.param_b].into_iter().flatten() {
            match param {
                Param::OutgoingResetRequest(req) => self.handle_reset_request(req),
                Param::ReconfigResponse(resp) => self.handle_reconfig_response(resp),
                _ => {}
            }
        }
    }

    fn handle_reset_request(&mut self, req: &ParamOutgoingResetRequest) {
        // Simultaneous resets converge because each side processes
        // requests in sequence-number order; replays get the same answer.
        let seq = req.reconfig_request_sequence_number;
        let result = if self.peer_seen_reconfig_seqs.contains(&seq) {
            RECONFIG_RESULT_SUCCESS_PERFORMED
        } else if sna32lte(req.sender_last_tsn, self.peer_last_tsn) {
            self.peer_seen_reconfig_seqs.push(seq);
            for sid in &req.stream_identifiers {
                if let Some(stream) = self.streams.remove(sid) {
                    stream.mark_reset();
                }
            }
            RECONFIG_RESULT_SUCCESS_PERFORMED
        } else {
            // Data still in flight below the reset point.
            RECONFIG_RESULT_IN_PROGRESS
        };

        self.control_queue.push_back(Chunk::Reconfig(ChunkReconfig {
            param_a: Some(Param::ReconfigResponse(ParamReconfigResponse {
                reconfig_response_sequence_number: seq,
                result,
            })),
            param_b: None,
        }));
        self.awake_write_loop();
    }

    fn handle_reconfig_response(&mut self, resp: &ParamReconfigResponse) {
        let seq = resp.reconfig_response_sequence_number;
        if let Some(req) = self.pending_reconfigs.remove(&seq) {
            if resp.result == RECONFIG_RESULT_SUCCESS_PERFORMED {
                for sid in &req.streams {
                    if let Some(stream) = self.streams.remove(sid) {
                        stream.mark_reset();
                    }
                }
            } else if resp.result == RECONFIG_RESULT_IN_PROGRESS {
                // Peer is still draining; retry on the next SACK round.
                self.pending_reconfigs.insert(seq, req);
            }
        }
    }

    //
    // Shutdown
    //

    pub(crate) fn start_shutdown(&mut self) {
        let state = self.get_state();
        if state == AssociationState::Established {
            self.set_state(AssociationState::ShutdownPending);
        }
        self.awake_write_loop();
    }

    pub(crate) fn send_abort(&mut self, reason: &str) {
        self.control_queue.push_back(Chunk::Abort(ChunkAbort {
            error_causes: vec![ErrorCause {
                code: ERROR_CAUSE_USER_INITIATED_ABORT,
                raw: Bytes::copy_from_slice(reason.as_bytes()),
            }],
        }));
    }

    //
    // Timers
    //

    pub(crate) fn next_timer_deadline(&self) -> Option<Instant> {
        [
            self.ack_deadline,
            self.t1_deadline,
            self.t3_deadline,
            self.heartbeat_deadline,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub(crate) fn handle_timeouts(&mut self, now: Instant) {
        if let Some(deadline) = self.ack_deadline {
            if now >= deadline {
                self.ack_deadline = None;
                if self.ack_state == AckState::Delay {
                    self.ack_state = AckState::Immediate;
                }
            }
        }

        if let Some(deadline) = self.t1_deadline {
            if now >= deadline {
                self.t1_retrans += 1;
                if self.t1_retrans > MAX_INIT_RETRANS {
                    debug!("[{}] handshake timed out", self.name);
                    self.mark_dead();
                    return;
                }
                if let Some(chunk) = &self.t1_chunk {
                    self.control_queue.push_back(chunk.clone());
                }
                let backoff = self.rto_mgr.rto() * (1u32 << self.t1_retrans.min(6));
                self.t1_deadline = Some(now + backoff.min(Duration::from_secs(60)));
            }
        }

        if let Some(deadline) = self.t3_deadline {
            if now >= deadline {
                self.on_retransmission_timeout(now);
            }
        }

        if let Some(deadline) = self.heartbeat_deadline {
            if now >= deadline && self.get_state() == AssociationState::Established {
                if self.inflight_queue.is_empty() {
                    // The info is an opaque nonce the peer echoes back.
                    let mut info = BytesMut::with_capacity(16);
                    info.put_u64(rand::thread_rng().gen());
                    info.put_u64(rand::thread_rng().gen());
                    self.control_queue.push_back(Chunk::Heartbeat(ChunkHeartbeat {
                        heartbeat_info: info.freeze(),
                    }));
                }
                self.heartbeat_deadline = Some(now + HEARTBEAT_INTERVAL);
            }
        }
    }

    // on_retransmission_timeout implements T3-RTX expiry (RFC 4960 §6.3.3):
    // collapse cwnd, back the RTO off, abandon chunks over their
    // reliability budget and flag the rest for retransmission.
    fn on_retransmission_timeout(&mut self, now: Instant) {
        self.t3_rto_nbackoff += 1;
        self.rto_mgr.backoff();

        self.ssthresh = (self.cwnd / 2).max(4 * self.mtu);
        self.cwnd = self.mtu;
        self.partial_bytes_acked = 0;

        self.check_partial_reliability(now);
        self.inflight_queue.mark_all_to_retransmit();
        self.advance_forward_tsn_if_needed();

        self.t3_deadline = Some(now + self.rto_mgr.rto());
        self.awake_write_loop();
    }

    // check_partial_reliability abandons chunks whose retransmit count or
    // lifetime budget is exhausted. Abandonment is per message: every
    // fragment of an abandoned message is dropped together.
    fn check_partial_reliability(&mut self, now: Instant) {
        if !self.use_forward_tsn {
            return;
        }
        let tsns: Vec<u32> = self.inflight_queue.sorted.iter().copied().collect();
        for tsn in tsns {
            let abandon = {
                if let Some(chunk) = self.inflight_queue.get(tsn) {
                    if chunk.abandoned || chunk.acked {
                        false
                    } else if let Some(max_rtx) = chunk.max_retransmits {
                        chunk.nsent > max_rtx
                    } else if let Some(lifetime) = chunk.lifetime {
                        chunk
                            .since
                            .map(|since| now.saturating_duration_since(since) > lifetime)
                            .unwrap_or(false)
                    } else {
                        false
                    }
                } else {
                    false
                }
            };
            if abandon {
                if let Some(chunk) = self.inflight_queue.get_mut(tsn) {
                    chunk.abandoned = true;
                    chunk.retransmit = false;
                }
            }
        }
    }

    //
    // Outbound
    //

    pub(crate) fn gather_outbound(&mut self) -> Vec<Bytes> {
        let mut raws = vec![];

        let state = self.get_state();

        // SACK when requested.
        if self.ack_state == AckState::Immediate {
            self.ack_state = AckState::Idle;
            let sack = ChunkSelectiveAck {
                cumulative_tsn_ack: self.peer_last_tsn,
                advertised_receiver_window_credit: self.my_receiver_window_credit(),
                gap_ack_blocks: self.payload_queue.get_gap_ack_blocks(self.peer_last_tsn),
                duplicate_tsn: self.payload_queue.pop_duplicates(),
            };
            self.control_queue.push_back(Chunk::Sack(sack));
        }

        // Graceful shutdown progress.
        if state == AssociationState::ShutdownPending
            && self.pending_queue.is_empty()
            && self.inflight_queue.is_empty()
        {
            self.control_queue.push_back(Chunk::Shutdown(ChunkShutdown {
                cumulative_tsn_ack: self.peer_last_tsn,
            }));
            self.set_state(AssociationState::ShutdownSent);
        } else if state == AssociationState::ShutdownReceived
            && self.pending_queue.is_empty()
            && self.inflight_queue.is_empty()
        {
            self.control_queue
                .push_back(Chunk::ShutdownAck(ChunkShutdownAck {}));
            self.set_state(AssociationState::ShutdownAckSent);
        }

        // Control chunks first, one packet per bundle-sized run.
        while let Some(chunk) = self.control_queue.pop_front() {
            let packet = self.create_packet(vec![chunk]);
            if let Ok(raw) = packet.marshal() {
                self.bytes_sent += raw.len();
                raws.push(raw);
            }
        }

        if matches!(
            state,
            AssociationState::Established
                | AssociationState::ShutdownPending
                | AssociationState::ShutdownReceived
        ) {
            // Retransmissions are limited by cwnd but at least one chunk
            // goes out (RFC 4960 §6.1 rule restart).
            let retransmit_raws = self.gather_retransmissions();
            raws.extend(retransmit_raws);
            let data_raws = self.gather_new_data();
            raws.extend(data_raws);
        }

        raws
    }

    pub(crate) fn create_packet(&self, chunks: Vec<Chunk>) -> Packet {
        Packet {
            source_port: self.source_port,
            destination_port: self.destination_port,
            verification_tag: self.peer_verification_tag,
            chunks,
        }
    }

    fn gather_retransmissions(&mut self) -> Vec<Bytes> {
        let mut to_send: Vec<u32> = vec![];
        let mut bytes = 0u32;
        for &tsn in &self.inflight_queue.sorted {
            if let Some(chunk) = self.inflight_queue.get(tsn) {
                if chunk.retransmit && !chunk.acked && !chunk.abandoned {
                    if !to_send.is_empty() && bytes + chunk.user_data.len() as u32 > self.cwnd {
                        break;
                    }
                    bytes += chunk.user_data.len() as u32;
                    to_send.push(tsn);
                }
            }
        }

        let now = Instant::now();
        let mut chunks = vec![];
        for tsn in to_send {
            if let Some(chunk) = self.inflight_queue.get_mut(tsn) {
                chunk.retransmit = false;
                chunk.nsent += 1;
                chunks.push(chunk.clone());
            }
        }
        self.check_partial_reliability(now);

        self.bundle_data_chunks(chunks)
    }

    fn gather_new_data(&mut self) -> Vec<Bytes> {
        let mut chunks = vec![];
        let now = Instant::now();

        loop {
            let outstanding = self.inflight_queue.get_num_bytes() as u32;
            if outstanding >= self.cwnd {
                break;
            }
            // A zero receive window still probes with exactly one chunk
            // in flight (RFC 4960 §6.1 rule A).
            if self.rwnd == 0 && !self.inflight_queue.is_empty() {
                break;
            }

            let Some(mut chunk) = self.pending_queue.pop() else {
                break;
            };

            chunk.tsn = self.my_next_tsn;
            self.my_next_tsn = self.my_next_tsn.wrapping_add(1);
            chunk.since = Some(chunk.since.unwrap_or(now));
            chunk.nsent = 1;

            self.rwnd = self.rwnd.saturating_sub(chunk.user_data.len() as u32);
            if let Some(stream) = self.streams.get(&chunk.stream_identifier) {
                stream.sub_buffered(chunk.user_data.len());
            }
            self.inflight_queue.push_no_check(chunk.clone());
            chunks.push(chunk);
        }

        if !chunks.is_empty() && self.t3_deadline.is_none() {
            self.t3_deadline = Some(now + self.rto_mgr.rto());
        }

        self.bundle_data_chunks(chunks)
    }

    // bundle_data_chunks packs DATA chunks into MTU-sized packets.
    fn bundle_data_chunks(&mut self, chunks: Vec<ChunkPayloadData>) -> Vec<Bytes> {
        let mut raws = vec![];
        let mut bundle: Vec<Chunk> = vec![];
        let mut bundle_size = COMMON_HEADER_SIZE as usize;

        for chunk in chunks {
            let chunk_size = chunk.chunk_size();
            if !bundle.is_empty() && bundle_size + chunk_size > self.mtu as usize {
                let packet = self.create_packet(std::mem::take(&mut bundle));
                if let Ok(raw) = packet.marshal() {
                    self.bytes_sent += raw.len();
                    raws.push(raw);
                }
                bundle_size = COMMON_HEADER_SIZE as usize;
            }
            bundle_size += chunk_size + (4 - chunk_size % 4) % 4;
            bundle.push(Chunk::PayloadData(chunk));
        }
        if !bundle.is_empty() {
            let packet = self.create_packet(bundle);
            if let Ok(raw) = packet.marshal() {
                self.bytes_sent += raw.len();
                raws.push(raw);
            }
        }
        raws
    }

    // push_pending enqueues fragments coming from a stream writer.
    pub(crate) fn push_pending(&mut self, chunks: Vec<ChunkPayloadData>) {
        for chunk in chunks {
            self.pending_queue.push(chunk);
        }
        self.awake_write_loop();
    }

    pub(crate) fn pending_send_bytes(&self) -> usize {
        self.pending_queue.get_num_bytes() + self.inflight_queue.get_num_bytes()
    }
}
