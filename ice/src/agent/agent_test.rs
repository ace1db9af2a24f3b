use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use util::conn::Conn;

use super::agent_config::AgentConfig;
use super::*;

async fn gather_host_candidates(agent: &Agent) -> Vec<Candidate> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    agent
        .on_candidate(Box::new(move |c| {
            let _ = tx.send(c);
        }))
        .await;
    agent.gather_candidates().await.unwrap();

    let mut out = vec![];
    while let Some(c) = rx.recv().await {
        match c {
            Some(c) => out.push(c),
            None => break,
        }
    }
    out
}

#[tokio::test]
async fn test_gather_host_candidates() {
    let agent = Agent::new(AgentConfig::default()).unwrap();
    let candidates = gather_host_candidates(&agent).await;
    assert!(!candidates.is_empty());
    assert!(candidates
        .iter()
        .all(|c| c.candidate_type == CandidateType::Host));
    agent.close().await.unwrap();
}

#[tokio::test]
async fn test_credentials_generated() {
    let agent = Agent::new(AgentConfig::default()).unwrap();
    let (ufrag, pwd) = agent.get_local_user_credentials();
    assert!(ufrag.len() >= 4);
    assert!(pwd.len() >= 22);
    agent.close().await.unwrap();
}

#[tokio::test]
async fn test_rejects_short_credentials() {
    assert!(Agent::new(AgentConfig {
        local_ufrag: Some("ab".to_owned()),
        ..Default::default()
    })
    .is_err());
    assert!(Agent::new(AgentConfig {
        local_pwd: Some("short".to_owned()),
        ..Default::default()
    })
    .is_err());
}

#[tokio::test]
async fn test_connectivity_loopback() {
    let a = Agent::new(AgentConfig::default()).unwrap();
    let b = Agent::new(AgentConfig::default()).unwrap();

    let a_candidates = gather_host_candidates(&a).await;
    let b_candidates = gather_host_candidates(&b).await;

    // Exchange only the loopback candidates for a deterministic path.
    for c in &b_candidates {
        a.add_remote_candidate(c.clone()).await.unwrap();
    }
    for c in &a_candidates {
        b.add_remote_candidate(c.clone()).await.unwrap();
    }

    let (a_ufrag, a_pwd) = a.get_local_user_credentials();
    let (b_ufrag, b_pwd) = b.get_local_user_credentials();

    a.start(true, b_ufrag, b_pwd).await.unwrap();
    b.start(false, a_ufrag, a_pwd).await.unwrap();

    let a_conn = a.agent_conn();
    let b_conn = b.agent_conn();

    timeout(Duration::from_secs(10), a_conn.wait_for_selected_pair())
        .await
        .expect("controlling agent selection timed out")
        .unwrap();
    timeout(Duration::from_secs(10), b_conn.wait_for_selected_pair())
        .await
        .expect("controlled agent selection timed out")
        .unwrap();

    assert!(a.get_selected_candidate_pair().await.is_some());

    // Application data flows over the nominated pair.
    a_conn.send(b"ping over ice").await.unwrap();
    let mut buf = vec![0u8; 1500];
    let n = timeout(Duration::from_secs(5), b_conn.recv(&mut buf))
        .await
        .expect("data receive timed out")
        .unwrap();
    assert_eq!(&buf[..n], b"ping over ice");

    b_conn.send(b"pong").await.unwrap();
    let n = timeout(Duration::from_secs(5), a_conn.recv(&mut buf))
        .await
        .expect("data receive timed out")
        .unwrap();
    assert_eq!(&buf[..n], b"pong");

    a.close().await.unwrap();
    b.close().await.unwrap();
}

#[tokio::test]
async fn test_add_remote_candidate_deduplicates() {
    let agent = Agent::new(AgentConfig::default()).unwrap();
    let c = Candidate::new(
        CandidateType::Host,
        crate::network_type::NetworkType::Udp4,
        "127.0.0.1".to_owned(),
        5000,
        COMPONENT_RTP,
        None,
    );
    agent.add_remote_candidate(c.clone()).await.unwrap();
    agent.add_remote_candidate(c).await.unwrap();
    let state = agent.internal.state.lock().await;
    assert_eq!(state.remote_candidates.len(), 1);
}
