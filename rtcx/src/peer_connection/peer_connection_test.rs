use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::state::*;
use super::*;
use crate::api::APIBuilder;

async fn new_pc() -> Arc<RTCPeerConnection> {
    let api = APIBuilder::new().build();
    api.new_peer_connection(RTCConfiguration::default())
        .await
        .unwrap()
}

// wire_ice trickles each side's candidates into the other.
async fn wire_ice(a: &Arc<RTCPeerConnection>, b: &Arc<RTCPeerConnection>) {
    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    a.on_ice_candidate(Arc::new(move |c| {
        let _ = tx_a.send(c);
    }))
    .await;
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    b.on_ice_candidate(Arc::new(move |c| {
        let _ = tx_b.send(c);
    }))
    .await;

    let b2 = b.clone();
    tokio::spawn(async move {
        while let Some(c) = rx_a.recv().await {
            if let Some(c) = c {
                let _ = b2.add_ice_candidate(c).await;
            }
        }
    });
    let a2 = a.clone();
    tokio::spawn(async move {
        while let Some(c) = rx_b.recv().await {
            if let Some(c) = c {
                let _ = a2.add_ice_candidate(c).await;
            }
        }
    });
}

#[tokio::test]
async fn test_offer_answer_signaling_states() {
    let offerer = new_pc().await;
    let answerer = new_pc().await;

    let offer = offerer.create_offer().await.unwrap();
    assert_eq!(offer.sdp_type, RTCSdpType::Offer);
    offerer.set_local_description(offer.clone()).await.unwrap();
    assert_eq!(
        offerer.signaling_state().await,
        RTCSignalingState::HaveLocalOffer
    );

    answerer.set_remote_description(offer).await.unwrap();
    assert_eq!(
        answerer.signaling_state().await,
        RTCSignalingState::HaveRemoteOffer
    );

    let answer = answerer.create_answer().await.unwrap();
    answerer
        .set_local_description(answer.clone())
        .await
        .unwrap();
    assert_eq!(answerer.signaling_state().await, RTCSignalingState::Stable);

    offerer.set_remote_description(answer).await.unwrap();
    assert_eq!(offerer.signaling_state().await, RTCSignalingState::Stable);

    offerer.close().await.unwrap();
    answerer.close().await.unwrap();
}

#[tokio::test]
async fn test_create_answer_requires_remote_offer() {
    let pc = new_pc().await;
    assert!(pc.create_answer().await.is_err());
    pc.close().await.unwrap();
}

#[tokio::test]
async fn test_rollback_from_local_offer() {
    let pc = new_pc().await;
    let offer = pc.create_offer().await.unwrap();
    pc.set_local_description(offer).await.unwrap();
    pc.set_local_description(RTCSessionDescription {
        sdp_type: RTCSdpType::Rollback,
        sdp: String::new(),
    })
    .await
    .unwrap();
    assert_eq!(pc.signaling_state().await, RTCSignalingState::Stable);
    pc.close().await.unwrap();
}

// The DataChannel echo scenario: a reliable channel labelled
// "benchmark" echoes 100 messages verbatim over the full stack
// (ICE + DTLS + SCTP).
#[tokio::test]
async fn test_data_channel_echo_end_to_end() {
    let offerer = new_pc().await;
    let answerer = new_pc().await;

    let dc = offerer
        .create_data_channel("benchmark", None)
        .await
        .unwrap();

    // Echo every inbound message back on the answerer.
    let (echo_ready_tx, mut echo_ready_rx) = mpsc::unbounded_channel();
    answerer
        .on_data_channel(Arc::new(move |remote_dc| {
            let _ = echo_ready_tx.send(remote_dc);
        }))
        .await;

    wire_ice(&offerer, &answerer).await;

    let offer = offerer.create_offer().await.unwrap();
    offerer.set_local_description(offer.clone()).await.unwrap();
    answerer.set_remote_description(offer).await.unwrap();
    let answer = answerer.create_answer().await.unwrap();
    answerer
        .set_local_description(answer.clone())
        .await
        .unwrap();
    offerer.set_remote_description(answer).await.unwrap();

    timeout(Duration::from_secs(30), dc.wait_open())
        .await
        .expect("data channel open timed out")
        .unwrap();

    let remote_dc = timeout(Duration::from_secs(30), echo_ready_rx.recv())
        .await
        .expect("remote channel timed out")
        .unwrap();
    assert_eq!(remote_dc.label, "benchmark");

    let echo_dc = remote_dc.clone();
    tokio::spawn(async move {
        for _ in 0..100 {
            let Ok((msg, is_string)) = echo_dc.recv().await else {
                return;
            };
            let result = if is_string {
                echo_dc
                    .send_text(String::from_utf8_lossy(&msg).to_string())
                    .await
            } else {
                echo_dc.send(&msg).await
            };
            if result.is_err() {
                return;
            }
        }
    });

    let payload = Bytes::from_static(b"hello");
    for _ in 0..100 {
        dc.send(&payload).await.unwrap();
        let (echoed, _) = timeout(Duration::from_secs(10), dc.recv())
            .await
            .expect("echo timed out")
            .unwrap();
        assert_eq!(echoed, payload);
    }

    assert_eq!(dc.messages_sent(), 100);
    assert_eq!(dc.messages_received(), 100);

    let stats = offerer.get_stats().await;
    assert!(stats
        .data_channels
        .iter()
        .any(|d| d.label == "benchmark" && d.messages_sent == 100));

    offerer.close().await.unwrap();
    answerer.close().await.unwrap();
}

#[tokio::test]
async fn test_queued_sends_flush_on_open() {
    let offerer = new_pc().await;
    let answerer = new_pc().await;

    let dc = offerer.create_data_channel("early", None).await.unwrap();
    // Queued before any transport exists.
    dc.send(&Bytes::from_static(b"first")).await.unwrap();
    dc.send(&Bytes::from_static(b"second")).await.unwrap();

    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel();
    answerer
        .on_data_channel(Arc::new(move |remote_dc| {
            let msg_tx = msg_tx.clone();
            tokio::spawn(async move {
                while let Ok((msg, _)) = remote_dc.recv().await {
                    let _ = msg_tx.send(msg);
                }
            });
        }))
        .await;

    wire_ice(&offerer, &answerer).await;
    let offer = offerer.create_offer().await.unwrap();
    offerer.set_local_description(offer.clone()).await.unwrap();
    answerer.set_remote_description(offer).await.unwrap();
    let answer = answerer.create_answer().await.unwrap();
    answerer
        .set_local_description(answer.clone())
        .await
        .unwrap();
    offerer.set_remote_description(answer).await.unwrap();

    // Flushed in FIFO order once the channel opens.
    let first = timeout(Duration::from_secs(30), msg_rx.recv())
        .await
        .expect("first queued message timed out")
        .unwrap();
    assert_eq!(first, Bytes::from_static(b"first"));
    let second = timeout(Duration::from_secs(10), msg_rx.recv())
        .await
        .expect("second queued message timed out")
        .unwrap();
    assert_eq!(second, Bytes::from_static(b"second"));

    offerer.close().await.unwrap();
    answerer.close().await.unwrap();
}
