use std::sync::Arc;

use ice::agent::agent_config::{AgentConfig, CandidateSelectionPolicy, TurnServer};
use ice::agent::{Agent, AgentConn};
use ice::candidate::Candidate;
use tokio::net::lookup_host;

use crate::error::{Error, Result};
use crate::peer_connection::configuration::{
    parse_ice_servers, RTCIceServer, RTCIceTransportPolicy,
};

// RTCIceCandidateInit is the trickle payload exchanged via signalling.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RTCIceCandidateInit {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

// RTCIceTransport wraps one ICE agent and its selected-pair connection.
pub struct RTCIceTransport {
    pub(crate) agent: Agent,
    pub(crate) conn: Arc<AgentConn>,
}

impl RTCIceTransport {
    // new resolves the configured servers and builds the agent.
    pub async fn new(
        servers: &[RTCIceServer],
        policy: RTCIceTransportPolicy,
    ) -> Result<Self> {
        let parsed = parse_ice_servers(servers)?;

        let mut urls_stun = vec![];
        for (host, port) in parsed.stun_hosts {
            if let Some(addr) = resolve(&host, port).await {
                urls_stun.push(addr);
            }
        }
        let mut urls_turn = vec![];
        for (host, port, username, credential) in parsed.turn_hosts {
            if let Some(addr) = resolve(&host, port).await {
                urls_turn.push(TurnServer {
                    addr,
                    username,
                    password: credential,
                });
            }
        }

        let agent = Agent::new(AgentConfig {
            urls_stun,
            urls_turn,
            candidate_selection_policy: match policy {
                RTCIceTransportPolicy::All => CandidateSelectionPolicy::All,
                RTCIceTransportPolicy::Relay => CandidateSelectionPolicy::RelayOnly,
            },
            ..Default::default()
        })?;
        let conn = agent.agent_conn();

        Ok(RTCIceTransport { agent, conn })
    }

    pub fn credentials(&self) -> (String, String) {
        self.agent.get_local_user_credentials()
    }

    pub async fn add_remote_candidate(&self, init: &RTCIceCandidateInit) -> Result<()> {
        // The attribute may arrive with its "candidate:" prefix.
        let raw = init
            .candidate
            .strip_prefix("candidate:")
            .unwrap_or(&init.candidate);
        let candidate = Candidate::unmarshal(raw).map_err(Error::from)?;
        self.agent.add_remote_candidate(candidate).await?;
        Ok(())
    }

    pub async fn start(
        &self,
        is_controlling: bool,
        remote_ufrag: String,
        remote_pwd: String,
    ) -> Result<()> {
        self.agent
            .start(is_controlling, remote_ufrag, remote_pwd)
            .await?;
        Ok(())
    }

    // wait_connected blocks until nomination completes.
    pub async fn wait_connected(&self) -> Result<()> {
        self.conn
            .wait_for_selected_pair()
            .await
            .map_err(|_| Error::ErrIceFailed)
    }

    pub async fn close(&self) -> Result<()> {
        self.agent.close().await?;
        Ok(())
    }
}

async fn resolve(host: &str, port: u16) -> Option<std::net::SocketAddr> {
    lookup_host((host, port)).await.ok()?.next()
}
