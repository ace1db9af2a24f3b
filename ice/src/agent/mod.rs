#[cfg(test)]
mod agent_test;

pub mod agent_config;
pub mod agent_conn;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use rand::Rng;
use stun::addr::XorMappedAddress;
use stun::attributes::*;
use stun::error_code::*;
use stun::fingerprint::FINGERPRINT;
use stun::integrity::MessageIntegrity;
use stun::message::*;
use stun::textattrs::TextAttribute;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex, Notify};
use util::conn::Conn;

use crate::candidate::*;
use crate::error::{Error, Result};
use crate::mdns::{generate_multicast_dns_name, MulticastDnsMode};
use crate::network_type::NetworkType;
use crate::rand::{generate_pwd, generate_ufrag};
use crate::state::ConnectionState;
use agent_config::*;
pub use agent_conn::AgentConn;

// PRIORITY attribute payload: the prflx priority this local base would
// produce (RFC 8445 §7.1.1).
fn prflx_priority(component: u16) -> u32 {
    let c = Candidate {
        id: String::new(),
        candidate_type: CandidateType::PeerReflexive,
        network_type: NetworkType::Udp4,
        address: String::new(),
        port: 0,
        component,
        priority: 0,
        related_address: None,
        foundation: String::new(),
        resolved_addr: None,
    };
    c.compute_priority(DEFAULT_LOCAL_PREFERENCE)
}

// One gathered local candidate and the socket it answers on.
pub(crate) struct LocalBase {
    pub(crate) candidate: Candidate,
    pub(crate) socket: Arc<dyn Conn + Send + Sync>,
}

enum TransactionKind {
    // Connectivity check towards a remote candidate.
    Check {
        local_id: String,
        remote_addr: SocketAddr,
        nominate: bool,
    },
    // Server-reflexive gathering against a STUN server.
    Gather {
        base_index: usize,
        stun_server: SocketAddr,
    },
}

struct PendingTransaction {
    kind: TransactionKind,
    raw: Vec<u8>,
    deadline: Instant,
    attempts: u16,
    rto: Duration,
}

pub(crate) struct AgentState {
    pub(crate) is_controlling: bool,
    pub(crate) remote_ufrag: String,
    pub(crate) remote_pwd: String,

    pub(crate) local_bases: Vec<Arc<LocalBase>>,
    pub(crate) remote_candidates: Vec<Candidate>,
    pub(crate) checklist: Vec<CandidatePair>,
    pub(crate) selected: Option<(String, SocketAddr)>,

    transactions: HashMap<TransactionId, PendingTransaction>,

    pub(crate) last_inbound: Instant,
    last_keepalive: Instant,
    started_at: Option<Instant>,
    pending_srflx: usize,
    gather_done: bool,
}

pub(crate) struct AgentInternal {
    pub(crate) ufrag: String,
    pub(crate) pwd: String,
    pub(crate) tie_breaker: u64,

    check_interval: Duration,
    keepalive_interval: Duration,
    disconnected_timeout: Duration,
    failed_timeout: Duration,
    connect_timeout: Duration,
    policy: CandidateSelectionPolicy,

    pub(crate) state: Mutex<AgentState>,
    connection_state: AtomicU8,
    closed: AtomicBool,

    // Non-STUN traffic received on the selected (or any) base.
    data_tx: mpsc::Sender<(Vec<u8>, SocketAddr)>,
    pub(crate) data_rx: Mutex<mpsc::Receiver<(Vec<u8>, SocketAddr)>>,

    candidate_handler: Mutex<Option<Box<dyn Fn(Option<Candidate>) + Send + Sync>>>,
    state_handler: Mutex<Option<Box<dyn Fn(ConnectionState) + Send + Sync>>>,
    pub(crate) selected_notify: Notify,
}

// Agent implements the ICE agent: gathering, connectivity checks,
// nomination and keepalives over one component.
pub struct Agent {
    pub(crate) internal: Arc<AgentInternal>,
    stun_servers: Vec<SocketAddr>,
    turn_servers: Vec<TurnServer>,
    multicast_dns_mode: MulticastDnsMode,
    include_loopback: bool,
}

fn state_to_u8(s: ConnectionState) -> u8 {
    match s {
        ConnectionState::New => 0,
        ConnectionState::Checking => 1,
        ConnectionState::Connected => 2,
        ConnectionState::Completed => 3,
        ConnectionState::Failed => 4,
        ConnectionState::Disconnected => 5,
        ConnectionState::Closed => 6,
    }
}

fn u8_to_state(v: u8) -> ConnectionState {
    match v {
        1 => ConnectionState::Checking,
        2 => ConnectionState::Connected,
        3 => ConnectionState::Completed,
        4 => ConnectionState::Failed,
        5 => ConnectionState::Disconnected,
        6 => ConnectionState::Closed,
        _ => ConnectionState::New,
    }
}

impl Agent {
    pub fn new(config: AgentConfig) -> Result<Self> {
        let ufrag = config.local_ufrag.unwrap_or_else(generate_ufrag);
        let pwd = config.local_pwd.unwrap_or_else(generate_pwd);
        if ufrag.len() < 4 {
            return Err(Error::ErrLocalUfragInsufficientBits);
        }
        if pwd.len() < 22 {
            return Err(Error::ErrLocalPwdInsufficientBits);
        }

        let (data_tx, data_rx) = mpsc::channel(256);

        Ok(Agent {
            internal: Arc::new(AgentInternal {
                ufrag,
                pwd,
                tie_breaker: rand::thread_rng().gen::<u64>(),
                check_interval: config.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL),
                keepalive_interval: config
                    .keepalive_interval
                    .unwrap_or(DEFAULT_KEEPALIVE_INTERVAL),
                disconnected_timeout: config
                    .disconnected_timeout
                    .unwrap_or(DEFAULT_DISCONNECTED_TIMEOUT),
                failed_timeout: config.failed_timeout.unwrap_or(DEFAULT_FAILED_TIMEOUT),
                connect_timeout: config.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
                policy: config.candidate_selection_policy,
                state: Mutex::new(AgentState {
                    is_controlling: false,
                    remote_ufrag: String::new(),
                    remote_pwd: String::new(),
                    local_bases: vec![],
                    remote_candidates: vec![],
                    checklist: vec![],
                    selected: None,
                    transactions: HashMap::new(),
                    last_inbound: Instant::now(),
                    last_keepalive: Instant::now(),
                    started_at: None,
                    pending_srflx: 0,
                    gather_done: false,
                }),
                connection_state: AtomicU8::new(state_to_u8(ConnectionState::New)),
                closed: AtomicBool::new(false),
                data_tx,
                data_rx: Mutex::new(data_rx),
                candidate_handler: Mutex::new(None),
                state_handler: Mutex::new(None),
                selected_notify: Notify::new(),
            }),
            stun_servers: config.urls_stun,
            turn_servers: config.urls_turn,
            multicast_dns_mode: config.multicast_dns_mode,
            include_loopback: true,
        })
    }

    pub fn get_local_user_credentials(&self) -> (String, String) {
        (self.internal.ufrag.clone(), self.internal.pwd.clone())
    }

    pub async fn on_candidate(&self, handler: Box<dyn Fn(Option<Candidate>) + Send + Sync>) {
        *self.internal.candidate_handler.lock().await = Some(handler);
    }

    pub async fn on_connection_state_change(
        &self,
        handler: Box<dyn Fn(ConnectionState) + Send + Sync>,
    ) {
        *self.internal.state_handler.lock().await = Some(handler);
    }

    pub fn connection_state(&self) -> ConnectionState {
        u8_to_state(self.internal.connection_state.load(Ordering::SeqCst))
    }

    // gather_candidates gathers host, server-reflexive and relay
    // candidates, emitting each through the on_candidate handler, then a
    // final None.
    pub async fn gather_candidates(&self) -> Result<()> {
        let internal = self.internal.clone();

        // Host candidates: one shared UDP socket.
        let socket = Arc::new(
            UdpSocket::bind("0.0.0.0:0")
                .await
                .map_err(|e| Error::Other(e.to_string()))?,
        );
        let port = Conn::local_addr(socket.as_ref())?.port();

        let mut addresses = vec![];
        if let Some(ip) = default_route_ip().await {
            addresses.push(ip);
        }
        if self.include_loopback {
            let lo = std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);
            if !addresses.contains(&lo) {
                addresses.push(lo);
            }
        }

        let mut base_index = None;
        if self.policy() != CandidateSelectionPolicy::RelayOnly {
            // One concealed hostname covers every revealed address.
            let mdns_name = (self.multicast_dns_mode == MulticastDnsMode::QueryAndGather)
                .then(generate_multicast_dns_name);
            for ip in addresses {
                let address = match &mdns_name {
                    Some(name) => name.clone(),
                    None => ip.to_string(),
                };
                let mut candidate = Candidate::new(
                    CandidateType::Host,
                    NetworkType::from_addr(ip, false),
                    address,
                    port,
                    COMPONENT_RTP,
                    None,
                );
                // The socket still answers on the real address.
                candidate.resolved_addr = Some(std::net::SocketAddr::new(ip, port));
                let idx = internal
                    .add_local_base(candidate.clone(), socket.clone())
                    .await;
                base_index.get_or_insert(idx);
                internal.emit_candidate(Some(candidate)).await;
            }
        } else {
            // Relay-only still needs the base socket for the TURN leg.
            let candidate = Candidate::new(
                CandidateType::Host,
                NetworkType::Udp4,
                "0.0.0.0".to_owned(),
                port,
                COMPONENT_RTP,
                None,
            );
            let idx = internal
                .add_local_base(candidate, socket.clone())
                .await;
            base_index.get_or_insert(idx);
        }

        // One read loop per socket.
        if base_index.is_some() {
            spawn_read_loop(internal.clone(), socket.clone());
        }

        // Server-reflexive gathering.
        if self.policy() != CandidateSelectionPolicy::RelayOnly {
            if let Some(idx) = base_index {
                let mut state = internal.state.lock().await;
                for server in &self.stun_servers {
                    let mut msg = Message::new();
                    msg.set_type(BINDING_REQUEST);
                    msg.new_transaction_id();
                    FINGERPRINT.add_to(&mut msg)?;
                    state.transactions.insert(
                        msg.transaction_id,
                        PendingTransaction {
                            kind: TransactionKind::Gather {
                                base_index: idx,
                                stun_server: *server,
                            },
                            raw: msg.raw.clone(),
                            deadline: Instant::now() + Duration::from_millis(250),
                            attempts: 0,
                            rto: Duration::from_millis(250),
                        },
                    );
                    state.pending_srflx += 1;
                    let socket = state.local_bases[idx].socket.clone();
                    drop(state);
                    let _ = socket.send_to(&msg.raw, *server).await;
                    state = internal.state.lock().await;
                }
            }
        }

        // Relay candidates via TURN allocations.
        for server in self.turn_servers.clone() {
            if let Err(err) = self.gather_relay(server).await {
                warn!("relay gathering failed: {err}");
            }
        }

        // Gathering completes once pending srflx checks resolve; the
        // ticker emits the final None.
        {
            let mut state = self.internal.state.lock().await;
            if state.pending_srflx == 0 && !state.gather_done {
                state.gather_done = true;
                drop(state);
                self.internal.emit_candidate(None).await;
            }
        }

        Ok(())
    }

    fn policy(&self) -> CandidateSelectionPolicy {
        self.internal.policy
    }

    async fn gather_relay(&self, server: TurnServer) -> Result<()> {
        let socket = Arc::new(
            UdpSocket::bind("0.0.0.0:0")
                .await
                .map_err(|e| Error::Other(e.to_string()))?,
        );
        Conn::connect(socket.as_ref(), server.addr).await?;

        let client = Arc::new(turn::client::Client::new(turn::client::ClientConfig {
            stun_serv_addr: server.addr,
            username: server.username,
            password: server.password,
            realm: String::new(),
            software: String::new(),
            conn: socket,
            rto: None,
        }));
        client.listen();

        let relayed_addr = client
            .allocate()
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
        let relay_conn = Arc::new(
            client
                .relay_conn()
                .await
                .map_err(|e| Error::Other(e.to_string()))?,
        );

        let candidate = Candidate::new(
            CandidateType::Relay,
            NetworkType::from_addr(relayed_addr.ip(), false),
            relayed_addr.ip().to_string(),
            relayed_addr.port(),
            COMPONENT_RTP,
            None,
        );
        self.internal
            .add_local_base(candidate.clone(), relay_conn.clone())
            .await;
        spawn_read_loop(self.internal.clone(), relay_conn);
        self.internal.emit_candidate(Some(candidate)).await;
        Ok(())
    }

    // add_remote_candidate feeds a trickled candidate into the checklist.
    pub async fn add_remote_candidate(&self, candidate: Candidate) -> Result<()> {
        let mut state = self.internal.state.lock().await;
        if state
            .remote_candidates
            .iter()
            .any(|c| c.address == candidate.address && c.port == candidate.port)
        {
            return Ok(());
        }
        state.remote_candidates.push(candidate.clone());
        self.internal.form_pairs(&mut state, self.policy());
        Ok(())
    }

    // start begins connectivity checks against the remote credentials.
    pub async fn start(
        &self,
        is_controlling: bool,
        remote_ufrag: String,
        remote_pwd: String,
    ) -> Result<()> {
        if remote_ufrag.is_empty() || remote_pwd.is_empty() {
            return Err(Error::ErrRemoteCredentials);
        }
        {
            let mut state = self.internal.state.lock().await;
            state.is_controlling = is_controlling;
            state.remote_ufrag = remote_ufrag;
            state.remote_pwd = remote_pwd;
            state.started_at = Some(Instant::now());
            state.last_inbound = Instant::now();
            self.internal.form_pairs(&mut state, self.policy());
        }
        self.internal
            .set_connection_state(ConnectionState::Checking)
            .await;

        let internal = self.internal.clone();
        tokio::spawn(async move {
            internal.ticker_loop().await;
        });
        Ok(())
    }

    // restart re-keys the session and rebuilds the checklist (ICE
    // restart semantics).
    pub async fn restart(&self, remote_ufrag: String, remote_pwd: String) -> Result<()> {
        let mut state = self.internal.state.lock().await;
        state.remote_ufrag = remote_ufrag;
        state.remote_pwd = remote_pwd;
        state.checklist.clear();
        state.selected = None;
        state.transactions.clear();
        state.started_at = Some(Instant::now());
        self.internal.form_pairs(&mut state, self.policy());
        Ok(())
    }

    pub async fn get_local_candidates(&self) -> Vec<Candidate> {
        let state = self.internal.state.lock().await;
        state.local_bases.iter().map(|b| b.candidate.clone()).collect()
    }

    pub async fn get_selected_candidate_pair(&self) -> Option<CandidatePair> {
        let state = self.internal.state.lock().await;
        let (local_id, remote_addr) = state.selected.clone()?;
        state
            .checklist
            .iter()
            .find(|p| p.local.id == local_id && p.remote.addr() == Some(remote_addr))
            .cloned()
    }

    // agent_conn exposes the nominated pair as a datagram connection.
    pub fn agent_conn(&self) -> Arc<AgentConn> {
        Arc::new(AgentConn::new(self.internal.clone()))
    }

    pub async fn close(&self) -> Result<()> {
        self.internal.closed.store(true, Ordering::SeqCst);
        self.internal
            .set_connection_state(ConnectionState::Closed)
            .await;
        self.internal.selected_notify.notify_waiters();
        Ok(())
    }
}

// default_route_ip discovers the source address of the default route by
// connecting a throwaway UDP socket; no packets are sent.
async fn default_route_ip() -> Option<std::net::IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").await.ok()?;
    socket.connect("8.8.8.8:80").await.ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() {
        None
    } else {
        Some(ip)
    }
}

fn spawn_read_loop(internal: Arc<AgentInternal>, socket: Arc<dyn Conn + Send + Sync>) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 8192];
        loop {
            if internal.closed.load(Ordering::SeqCst) {
                return;
            }
            match socket.recv_from(&mut buf).await {
                Ok((n, from)) => {
                    internal.handle_packet(&socket, &buf[..n], from).await;
                }
                Err(err) => {
                    debug!("ice read loop ended: {err}");
                    return;
                }
            }
        }
    });
}

impl AgentInternal {
    async fn add_local_base(
        &self,
        candidate: Candidate,
        socket: Arc<dyn Conn + Send + Sync>,
    ) -> usize {
        let mut state = self.state.lock().await;
        state.local_bases.push(Arc::new(LocalBase { candidate, socket }));
        let idx = state.local_bases.len() - 1;
        self.form_pairs(&mut state, self.policy);
        idx
    }

    async fn emit_candidate(&self, candidate: Option<Candidate>) {
        let handler = self.candidate_handler.lock().await;
        if let Some(handler) = handler.as_ref() {
            handler(candidate);
        }
    }

    async fn set_connection_state(&self, new_state: ConnectionState) {
        let old = self
            .connection_state
            .swap(state_to_u8(new_state), Ordering::SeqCst);
        if old != state_to_u8(new_state) {
            debug!("ice connection state: {} -> {}", u8_to_state(old), new_state);
            let handler = self.state_handler.lock().await;
            if let Some(handler) = handler.as_ref() {
                handler(new_state);
            }
        }
    }

    // form_pairs pairs every local base with every remote candidate of
    // the same family, honoring the transport policy, sorted by pair
    // priority descending.
    fn form_pairs(&self, state: &mut AgentState, policy: CandidateSelectionPolicy) {
        let is_controlling = state.is_controlling;
        let mut new_pairs = vec![];
        for base in &state.local_bases {
            for remote in &state.remote_candidates {
                if !base
                    .candidate
                    .network_type
                    .same_family(&remote.network_type)
                {
                    continue;
                }
                if base.candidate.component != remote.component {
                    continue;
                }
                if policy == CandidateSelectionPolicy::RelayOnly
                    && base.candidate.candidate_type != CandidateType::Relay
                {
                    continue;
                }
                if remote.addr().is_none() {
                    // Unresolved mDNS candidate, checklist once resolved.
                    continue;
                }
                let pair = CandidatePair::new(base.candidate.clone(), remote.clone());
                if !state.checklist.contains(&pair) {
                    new_pairs.push(pair);
                }
            }
        }
        state.checklist.extend(new_pairs);
        state
            .checklist
            .sort_by(|a, b| b.priority(is_controlling).cmp(&a.priority(is_controlling)));
    }

    //
    // Packet handling
    //

    async fn handle_packet(
        self: &Arc<Self>,
        socket: &Arc<dyn Conn + Send + Sync>,
        data: &[u8],
        from: SocketAddr,
    ) {
        if stun::message::is_message(data) {
            let mut msg = Message::new();
            if msg.write(data).is_err() {
                return;
            }
            if let Err(err) = self.handle_stun(socket, msg, from).await {
                trace!("failed to handle stun message: {err}");
            }
        } else {
            let mut state = self.state.lock().await;
            state.last_inbound = Instant::now();
            drop(state);
            let _ = self.data_tx.try_send((data.to_vec(), from));
        }
    }

    async fn handle_stun(
        self: &Arc<Self>,
        socket: &Arc<dyn Conn + Send + Sync>,
        mut msg: Message,
        from: SocketAddr,
    ) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.last_inbound = Instant::now();
        }

        match msg.typ.class {
            CLASS_REQUEST => self.handle_binding_request(socket, &mut msg, from).await,
            CLASS_SUCCESS_RESPONSE => self.handle_success_response(socket, &msg, from).await,
            CLASS_ERROR_RESPONSE => self.handle_error_response(&msg).await,
            CLASS_INDICATION => Ok(()),
            _ => Ok(()),
        }
    }

    async fn handle_binding_request(
        self: &Arc<Self>,
        socket: &Arc<dyn Conn + Send + Sync>,
        msg: &mut Message,
        from: SocketAddr,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.remote_pwd.is_empty() {
            // Checks can arrive before the answer is applied; ignored
            // rather than failed so the peer retransmits.
            return Ok(());
        }

        // USERNAME must be local:remote, integrity keyed by local pwd.
        let username = TextAttribute::get_from_as(msg, ATTR_USERNAME)?;
        let expected = format!("{}:{}", self.ufrag, state.remote_ufrag);
        if username.text != expected {
            return self
                .send_error_response(socket, msg, from, CODE_UNAUTHORIZED)
                .await;
        }
        let integrity = MessageIntegrity::new_short_term_integrity(self.pwd.clone());
        if integrity.check(msg).is_err() {
            return self
                .send_error_response(socket, msg, from, CODE_UNAUTHORIZED)
                .await;
        }

        // Role conflict resolution (RFC 8445 §7.3.1.1).
        let remote_has_controlling = msg.contains(ATTR_ICE_CONTROLLING);
        let remote_has_controlled = msg.contains(ATTR_ICE_CONTROLLED);
        if state.is_controlling && remote_has_controlling {
            let their_tb = read_tie_breaker(msg, ATTR_ICE_CONTROLLING).unwrap_or(0);
            if self.tie_breaker >= their_tb {
                drop(state);
                return self
                    .send_error_response_locked(socket, msg, from, CODE_ROLE_CONFLICT)
                    .await;
            }
            state.is_controlling = false;
        } else if !state.is_controlling && remote_has_controlled {
            let their_tb = read_tie_breaker(msg, ATTR_ICE_CONTROLLED).unwrap_or(0);
            if self.tie_breaker >= their_tb {
                state.is_controlling = true;
            } else {
                drop(state);
                return self
                    .send_error_response_locked(socket, msg, from, CODE_ROLE_CONFLICT)
                    .await;
            }
        }

        let use_candidate = msg.contains(ATTR_USE_CANDIDATE);

        // An unknown source address becomes a peer-reflexive remote
        // candidate: checklist only, never signaled (RFC 8445 §7.3.1.3).
        let known = state
            .remote_candidates
            .iter()
            .any(|c| c.addr() == Some(from));
        if !known {
            let prflx = Candidate::new(
                CandidateType::PeerReflexive,
                NetworkType::from_addr(from.ip(), false),
                from.ip().to_string(),
                from.port(),
                COMPONENT_RTP,
                Some((from.ip().to_string(), from.port())),
            );
            state.remote_candidates.push(prflx);
            self.form_pairs(&mut state, self.policy);
        }

        // Triggered check: the pair moves to waiting unless done.
        let local_id = local_id_for_socket(&state, socket);
        let pair_idx = state.checklist.iter().position(|p| {
            Some(&p.local.id) == local_id.as_ref() && p.remote.addr() == Some(from)
        });
        if let Some(idx) = pair_idx {
            let pair_state = state.checklist[idx].state;
            if pair_state == CandidatePairState::Frozen || pair_state == CandidatePairState::Failed
            {
                state.checklist[idx].state = CandidatePairState::Waiting;
            }
            if use_candidate {
                state.checklist[idx].nominated = true;
                if state.checklist[idx].state == CandidatePairState::Succeeded
                    && state.selected.is_none()
                {
                    let local_id = state.checklist[idx].local.id.clone();
                    select_pair(&mut state, local_id, from);
                    self.selected_notify.notify_waiters();
                }
            }
        }

        let selected_now = state.selected.is_some();
        drop(state);
        if selected_now {
            self.set_connection_state(ConnectionState::Connected).await;
        }

        // Success response with the reflexive address of the sender.
        let mut response = Message::new();
        response.set_type(BINDING_SUCCESS);
        response.transaction_id = msg.transaction_id;
        response.write_header();
        XorMappedAddress {
            ip: from.ip(),
            port: from.port(),
        }
        .add_to(&mut response)?;
        let integrity = MessageIntegrity::new_short_term_integrity(self.pwd.clone());
        integrity.add_to(&mut response)?;
        FINGERPRINT.add_to(&mut response)?;

        socket.send_to(&response.raw, from).await?;
        Ok(())
    }

    async fn send_error_response(
        &self,
        socket: &Arc<dyn Conn + Send + Sync>,
        msg: &Message,
        from: SocketAddr,
        code: ErrorCode,
    ) -> Result<()> {
        let mut response = Message::new();
        response.set_type(BINDING_ERROR);
        response.transaction_id = msg.transaction_id;
        response.write_header();
        code.add_to(&mut response)?;
        FINGERPRINT.add_to(&mut response)?;
        socket.send_to(&response.raw, from).await?;
        Ok(())
    }

    async fn send_error_response_locked(
        &self,
        socket: &Arc<dyn Conn + Send + Sync>,
        msg: &Message,
        from: SocketAddr,
        code: ErrorCode,
    ) -> Result<()> {
        self.send_error_response(socket, msg, from, code).await
    }

    async fn handle_success_response(
        self: &Arc<Self>,
        _socket: &Arc<dyn Conn + Send + Sync>,
        msg: &Message,
        from: SocketAddr,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(transaction) = state.transactions.remove(&msg.transaction_id) else {
            return Ok(());
        };

        match transaction.kind {
            TransactionKind::Gather { base_index, .. } => {
                state.pending_srflx = state.pending_srflx.saturating_sub(1);
                let mut mapped = XorMappedAddress::default();
                mapped.get_from(msg)?;

                let base = state.local_bases[base_index].clone();
                let srflx = Candidate::new(
                    CandidateType::ServerReflexive,
                    NetworkType::from_addr(mapped.ip, false),
                    mapped.ip.to_string(),
                    mapped.port,
                    COMPONENT_RTP,
                    Some((base.candidate.address.clone(), base.candidate.port)),
                );
                state.local_bases.push(Arc::new(LocalBase {
                    candidate: srflx.clone(),
                    socket: base.socket.clone(),
                }));
                self.form_pairs(&mut state, self.policy);
                let done = state.pending_srflx == 0 && !state.gather_done;
                if done {
                    state.gather_done = true;
                }
                drop(state);
                self.emit_candidate(Some(srflx)).await;
                if done {
                    self.emit_candidate(None).await;
                }
            }
            TransactionKind::Check {
                local_id,
                remote_addr,
                nominate,
            } => {
                if remote_addr != from {
                    // Symmetry check failed: response from elsewhere.
                    return Ok(());
                }
                let is_controlling = state.is_controlling;
                let idx = state
                    .checklist
                    .iter()
                    .position(|p| p.local.id == local_id && p.remote.addr() == Some(remote_addr));
                if let Some(idx) = idx {
                    state.checklist[idx].state = CandidatePairState::Succeeded;
                    let nominated =
                        state.checklist[idx].nominated || (is_controlling && nominate);
                    state.checklist[idx].nominated = nominated;
                    if nominated && state.selected.is_none() {
                        select_pair(&mut state, local_id, remote_addr);
                        drop(state);
                        self.set_connection_state(ConnectionState::Connected).await;
                        self.selected_notify.notify_waiters();
                    }
                }
            }
        }
        Ok(())
    }

    async fn handle_error_response(self: &Arc<Self>, msg: &Message) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(transaction) = state.transactions.remove(&msg.transaction_id) else {
            return Ok(());
        };

        let mut code = ErrorCodeAttribute::default();
        if code.get_from(msg).is_err() {
            return Ok(());
        }

        if let TransactionKind::Check {
            local_id,
            remote_addr,
            ..
        } = transaction.kind
        {
            if code.code == CODE_ROLE_CONFLICT {
                // Switch roles per the tie breaker and retry the check.
                state.is_controlling = !state.is_controlling;
                if let Some(pair) = state
                    .checklist
                    .iter_mut()
                    .find(|p| p.local.id == local_id && p.remote.addr() == Some(remote_addr))
                {
                    pair.state = CandidatePairState::Waiting;
                }
            } else if let Some(pair) = state
                .checklist
                .iter_mut()
                .find(|p| p.local.id == local_id && p.remote.addr() == Some(remote_addr))
            {
                pair.state = CandidatePairState::Failed;
            }
        }
        Ok(())
    }

    //
    // Scheduler
    //

    async fn ticker_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.check_interval);
        loop {
            ticker.tick().await;
            if self.closed.load(Ordering::SeqCst) {
                return;
            }
            self.on_tick().await;
            let cs = u8_to_state(self.connection_state.load(Ordering::SeqCst));
            if matches!(cs, ConnectionState::Failed | ConnectionState::Closed) {
                return;
            }
        }
    }

    async fn on_tick(self: &Arc<Self>) {
        let now = Instant::now();
        let mut to_send: Vec<(Arc<dyn Conn + Send + Sync>, Vec<u8>, SocketAddr)> = vec![];
        let mut new_state: Option<ConnectionState> = None;

        {
            let mut state = self.state.lock().await;

            // Expired transactions: retransmit with doubled RTO, fail the
            // pair when the budget is spent.
            let expired: Vec<TransactionId> = state
                .transactions
                .iter()
                .filter(|(_, t)| now >= t.deadline)
                .map(|(id, _)| *id)
                .collect();
            for id in expired {
                let Some(mut t) = state.transactions.remove(&id) else {
                    continue;
                };
                t.attempts += 1;
                if t.attempts >= DEFAULT_MAX_BINDING_REQUESTS {
                    match t.kind {
                        TransactionKind::Check {
                            ref local_id,
                            remote_addr,
                            ..
                        } => {
                            if let Some(pair) = state.checklist.iter_mut().find(|p| {
                                &p.local.id == local_id && p.remote.addr() == Some(remote_addr)
                            }) {
                                pair.state = CandidatePairState::Failed;
                            }
                        }
                        TransactionKind::Gather { .. } => {
                            state.pending_srflx = state.pending_srflx.saturating_sub(1);
                            if state.pending_srflx == 0 && !state.gather_done {
                                state.gather_done = true;
                                let internal = self.clone();
                                tokio::spawn(async move {
                                    internal.emit_candidate(None).await;
                                });
                            }
                        }
                    }
                    continue;
                }
                // Exponential backoff, capped.
                t.rto = (t.rto * 2).min(Duration::from_secs(3));
                t.deadline = now + t.rto;
                let (socket, target) = match &t.kind {
                    TransactionKind::Check {
                        local_id,
                        remote_addr,
                        ..
                    } => (
                        socket_for_local_id(&state, local_id),
                        Some(*remote_addr),
                    ),
                    TransactionKind::Gather {
                        base_index,
                        stun_server,
                    } => (
                        state.local_bases.get(*base_index).map(|b| b.socket.clone()),
                        Some(*stun_server),
                    ),
                };
                if let (Some(socket), Some(target)) = (socket, target) {
                    to_send.push((socket, t.raw.clone(), target));
                }
                state.transactions.insert(id, t);
            }

            // Launch the next waiting check, highest priority first.
            if !state.remote_pwd.is_empty() {
                let is_controlling = state.is_controlling;
                let next = state
                    .checklist
                    .iter()
                    .position(|p| p.state == CandidatePairState::Waiting);
                if let Some(idx) = next {
                    let local_id = state.checklist[idx].local.id.clone();
                    let remote_addr = state.checklist[idx].remote.addr();
                    if let (Some(remote_addr), Some(socket)) =
                        (remote_addr, socket_for_local_id(&state, &local_id))
                    {
                        state.checklist[idx].state = CandidatePairState::InProgress;
                        state.checklist[idx].binding_request_count += 1;
                        if let Ok((id, raw)) =
                            self.build_check(&state, is_controlling, false)
                        {
                            state.transactions.insert(
                                id,
                                PendingTransaction {
                                    kind: TransactionKind::Check {
                                        local_id,
                                        remote_addr,
                                        nominate: false,
                                    },
                                    raw: raw.clone(),
                                    deadline: now + Duration::from_millis(250),
                                    attempts: 0,
                                    rto: Duration::from_millis(250),
                                },
                            );
                            to_send.push((socket, raw, remote_addr));
                        }
                    }
                }

                // Regular nomination: the controlling agent repeats the
                // best succeeded pair's check with USE-CANDIDATE.
                if is_controlling && state.selected.is_none() {
                    let nominate_idx = state.checklist.iter().position(|p| {
                        p.state == CandidatePairState::Succeeded
                            && !p.nominated
                            && !p.nominate_on_success
                    });
                    if let Some(idx) = nominate_idx {
                        let local_id = state.checklist[idx].local.id.clone();
                        let remote_addr = state.checklist[idx].remote.addr();
                        if let (Some(remote_addr), Some(socket)) =
                            (remote_addr, socket_for_local_id(&state, &local_id))
                        {
                            if let Ok((id, raw)) =
                                self.build_check(&state, is_controlling, true)
                            {
                                state.checklist[idx].nominate_on_success = true;
                                state.transactions.insert(
                                    id,
                                    PendingTransaction {
                                        kind: TransactionKind::Check {
                                            local_id,
                                            remote_addr,
                                            nominate: true,
                                        },
                                        raw: raw.clone(),
                                        deadline: now + Duration::from_millis(250),
                                        attempts: 0,
                                        rto: Duration::from_millis(250),
                                    },
                                );
                                to_send.push((socket, raw, remote_addr));
                            }
                        }
                    }
                }
            }

            // Keepalive on the selected pair.
            if let Some((local_id, remote_addr)) = state.selected.clone() {
                if now.duration_since(state.last_keepalive) >= self.keepalive_interval {
                    state.last_keepalive = now;
                    if let Some(socket) = socket_for_local_id(&state, &local_id) {
                        let mut msg = Message::new();
                        msg.set_type(BINDING_INDICATION);
                        msg.new_transaction_id();
                        let _ = FINGERPRINT.add_to(&mut msg);
                        to_send.push((socket, msg.raw, remote_addr));
                    }
                }

                // Liveness: silence windows drive disconnected/failed.
                let silence = now.duration_since(state.last_inbound);
                if silence > self.failed_timeout {
                    new_state = Some(ConnectionState::Failed);
                } else if silence > self.disconnected_timeout {
                    new_state = Some(ConnectionState::Disconnected);
                } else if u8_to_state(self.connection_state.load(Ordering::SeqCst))
                    == ConnectionState::Disconnected
                {
                    new_state = Some(ConnectionState::Connected);
                }
            } else if let Some(started) = state.started_at {
                // No selected pair yet: overall timeout, or failure when
                // every pair failed with nothing pending.
                if now.duration_since(started) > self.connect_timeout {
                    new_state = Some(ConnectionState::Failed);
                } else if !state.checklist.is_empty()
                    && state
                        .checklist
                        .iter()
                        .all(|p| p.state == CandidatePairState::Failed)
                    && state.gather_done
                {
                    new_state = Some(ConnectionState::Failed);
                }
            }
        }

        for (socket, raw, target) in to_send {
            let _ = socket.send_to(&raw, target).await;
        }
        if let Some(s) = new_state {
            self.set_connection_state(s).await;
            if s == ConnectionState::Failed {
                self.selected_notify.notify_waiters();
            }
        }
    }

    // build_check builds a connectivity check message for the current
    // remote credentials.
    fn build_check(
        &self,
        state: &AgentState,
        is_controlling: bool,
        use_candidate: bool,
    ) -> Result<(TransactionId, Vec<u8>)> {
        let mut msg = Message::new();
        msg.set_type(BINDING_REQUEST);
        msg.new_transaction_id();
        TextAttribute::new(
            ATTR_USERNAME,
            format!("{}:{}", state.remote_ufrag, self.ufrag),
        )
        .add_to(&mut msg)?;
        if is_controlling {
            msg.add(ATTR_ICE_CONTROLLING, &self.tie_breaker.to_be_bytes());
            if use_candidate {
                msg.add(ATTR_USE_CANDIDATE, &[]);
            }
        } else {
            msg.add(ATTR_ICE_CONTROLLED, &self.tie_breaker.to_be_bytes());
        }
        msg.add(
            ATTR_PRIORITY,
            &prflx_priority(COMPONENT_RTP).to_be_bytes(),
        );
        let integrity = MessageIntegrity::new_short_term_integrity(state.remote_pwd.clone());
        integrity.add_to(&mut msg)?;
        FINGERPRINT.add_to(&mut msg)?;
        Ok((msg.transaction_id, msg.raw))
    }
}

fn read_tie_breaker(msg: &Message, attr: AttrType) -> Option<u64> {
    let v = msg.get(attr).ok()?;
    if v.len() != 8 {
        return None;
    }
    Some(u64::from_be_bytes([
        v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7],
    ]))
}

fn local_id_for_socket(
    state: &AgentState,
    socket: &Arc<dyn Conn + Send + Sync>,
) -> Option<String> {
    state
        .local_bases
        .iter()
        .find(|b| Arc::ptr_eq(&b.socket, socket))
        .map(|b| b.candidate.id.clone())
}

fn socket_for_local_id(
    state: &AgentState,
    local_id: &str,
) -> Option<Arc<dyn Conn + Send + Sync>> {
    state
        .local_bases
        .iter()
        .find(|b| b.candidate.id == local_id)
        .map(|b| b.socket.clone())
}

fn select_pair(state: &mut AgentState, local_id: String, remote_addr: SocketAddr) {
    state.selected = Some((local_id, remote_addr));
}
