use std::sync::Arc;
use std::time::Duration;

use sctp::association::{Association, Config as AssociationConfig};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::*;
use crate::message::message_channel_open::CHANNEL_PRIORITY_NORMAL;

async fn association_pair() -> (Association, Association) {
    let a = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let b = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    a.connect(b.local_addr().unwrap()).await.unwrap();
    b.connect(a.local_addr().unwrap()).await.unwrap();

    let server = tokio::spawn(async move {
        Association::server(AssociationConfig {
            net_conn: b,
            max_receive_buffer_size: 0,
            max_message_size: 0,
            name: "server".to_owned(),
        })
        .await
    });
    let client = Association::client(AssociationConfig {
        net_conn: a,
        max_receive_buffer_size: 0,
        max_message_size: 0,
        name: "client".to_owned(),
    })
    .await
    .unwrap();
    (client, server.await.unwrap().unwrap())
}

#[tokio::test]
async fn test_data_channel_echo() {
    let (client_assoc, server_assoc) = timeout(Duration::from_secs(5), association_pair())
        .await
        .expect("association timed out");

    let accepted = tokio::spawn(async move {
        let dc = DataChannel::accept(&server_assoc).await.unwrap();
        // Echo messages back verbatim.
        for _ in 0..100 {
            let (msg, is_string) = dc.read().await.unwrap();
            dc.write(&msg, is_string).await.unwrap();
        }
        (dc.messages_received(), server_assoc)
    });

    let dc = DataChannel::dial(
        &client_assoc,
        0,
        Config {
            channel_type: ChannelType::Reliable,
            negotiated: false,
            priority: CHANNEL_PRIORITY_NORMAL,
            reliability_parameter: 0,
            label: "benchmark".to_owned(),
            protocol: "".to_owned(),
        },
    )
    .await
    .unwrap();

    let payload = Bytes::from_static(b"hello");
    for _ in 0..100 {
        dc.write(&payload, false).await.unwrap();
        let (echoed, is_string) = timeout(Duration::from_secs(5), dc.read())
            .await
            .expect("echo timed out")
            .unwrap();
        assert!(!is_string);
        assert_eq!(echoed, payload);
    }

    let (received, _server_assoc) = accepted.await.unwrap();
    assert_eq!(received, 100);
    assert_eq!(dc.messages_sent(), 100);
    assert_eq!(dc.messages_received(), 100);
}

#[tokio::test]
async fn test_data_channel_open_metadata() {
    let (client_assoc, server_assoc) = timeout(Duration::from_secs(5), association_pair())
        .await
        .expect("association timed out");

    let accepted = tokio::spawn(async move {
        let dc = DataChannel::accept(&server_assoc).await.unwrap();
        (dc.config.clone(), server_assoc)
    });

    let _dc = DataChannel::dial(
        &client_assoc,
        2,
        Config {
            channel_type: ChannelType::PartialReliableRexmit,
            negotiated: false,
            priority: CHANNEL_PRIORITY_NORMAL,
            reliability_parameter: 3,
            label: "lossy".to_owned(),
            protocol: "proto-x".to_owned(),
        },
    )
    .await
    .unwrap();

    let (config, _assoc) = accepted.await.unwrap();
    assert_eq!(config.label, "lossy");
    assert_eq!(config.protocol, "proto-x");
    assert_eq!(config.channel_type, ChannelType::PartialReliableRexmit);
    assert_eq!(config.reliability_parameter, 3);
}

#[tokio::test]
async fn test_empty_message_markers() {
    let (client_assoc, server_assoc) = timeout(Duration::from_secs(5), association_pair())
        .await
        .expect("association timed out");

    let accepted = tokio::spawn(async move {
        let dc = DataChannel::accept(&server_assoc).await.unwrap();
        let (msg, is_string) = dc.read().await.unwrap();
        (msg, is_string, server_assoc)
    });

    let dc = DataChannel::dial(&client_assoc, 0, Config::default())
        .await
        .unwrap();
    dc.write(&Bytes::new(), true).await.unwrap();

    let (msg, is_string, _assoc) = accepted.await.unwrap();
    assert!(msg.is_empty(), "empty-marker PPID decodes to empty payload");
    assert!(is_string);
}
