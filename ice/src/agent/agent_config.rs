use std::net::SocketAddr;
use std::time::Duration;

use crate::mdns::MulticastDnsMode;

// Pacing of outgoing connectivity checks (RFC 8445 Ta, §B.1).
pub(crate) const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(50);
// Keepalive cadence on the selected pair.
pub(crate) const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);
// Inbound silence before the connection is reported disconnected.
pub(crate) const DEFAULT_DISCONNECTED_TIMEOUT: Duration = Duration::from_secs(5);
// Further silence before it is reported failed.
pub(crate) const DEFAULT_FAILED_TIMEOUT: Duration = Duration::from_secs(25);
// Overall deadline for reaching a nominated pair.
pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
// Per-check retransmission schedule.
pub(crate) const DEFAULT_MAX_BINDING_REQUESTS: u16 = 7;

// CandidateTypePolicy mirrors the ice-transport-policy configuration.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum CandidateSelectionPolicy {
    All,
    RelayOnly,
}

impl Default for CandidateSelectionPolicy {
    fn default() -> Self {
        CandidateSelectionPolicy::All
    }
}

// TurnServer is one resolved TURN server with credentials.
#[derive(Debug, Clone)]
pub struct TurnServer {
    pub addr: SocketAddr,
    pub username: String,
    pub password: String,
}

// AgentConfig tunes the agent; the defaults suit WebRTC.
#[derive(Default)]
pub struct AgentConfig {
    pub urls_stun: Vec<SocketAddr>,
    pub urls_turn: Vec<TurnServer>,
    pub local_ufrag: Option<String>,
    pub local_pwd: Option<String>,
    pub multicast_dns_mode: MulticastDnsMode,
    pub candidate_selection_policy: CandidateSelectionPolicy,
    pub check_interval: Option<Duration>,
    pub keepalive_interval: Option<Duration>,
    pub disconnected_timeout: Option<Duration>,
    pub failed_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    // Lite agents only answer checks; not used for WebRTC endpoints.
    pub lite: bool,
}
