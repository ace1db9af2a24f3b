use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::*;
use crate::chunk::chunk_payload_data::PayloadProtocolIdentifier;

async fn udp_pair() -> (Arc<UdpSocket>, Arc<UdpSocket>) {
    let a = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let b = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    a.connect(b.local_addr().unwrap()).await.unwrap();
    b.connect(a.local_addr().unwrap()).await.unwrap();
    (a, b)
}

async fn association_pair() -> (Association, Association) {
    let (ca, cb) = udp_pair().await;
    let server = tokio::spawn(async move {
        Association::server(Config {
            net_conn: cb,
            max_receive_buffer_size: 0,
            max_message_size: 0,
            name: "server".to_owned(),
        })
        .await
    });
    let client = Association::client(Config {
        net_conn: ca,
        max_receive_buffer_size: 0,
        max_message_size: 0,
        name: "client".to_owned(),
    })
    .await
    .unwrap();
    let server = server.await.unwrap().unwrap();
    (client, server)
}

#[tokio::test]
async fn test_association_establishment() {
    let (client, server) = timeout(Duration::from_secs(5), association_pair())
        .await
        .expect("handshake timed out");
    assert!(client.connected());
    assert!(server.connected());
}

#[tokio::test]
async fn test_stream_ordered_delivery() {
    let (client, server) = timeout(Duration::from_secs(5), association_pair())
        .await
        .expect("handshake timed out");

    let s = client
        .open_stream(1, PayloadProtocolIdentifier::Binary)
        .await
        .unwrap();

    for i in 0..10u8 {
        s.write(&Bytes::from(vec![i; 4])).await.unwrap();
    }

    let remote = timeout(Duration::from_secs(5), server.accept_stream())
        .await
        .expect("accept timed out")
        .unwrap();
    assert_eq!(remote.stream_identifier(), 1);

    // Reliable ordered stream delivers in exact send order, no gaps.
    for i in 0..10u8 {
        let (data, ppi) = timeout(Duration::from_secs(5), remote.read_sctp())
            .await
            .expect("read timed out")
            .unwrap();
        assert_eq!(ppi, PayloadProtocolIdentifier::Binary);
        assert_eq!(&data[..], &[i; 4][..]);
    }
}

#[tokio::test]
async fn test_stream_large_message_fragmentation() {
    let (client, server) = timeout(Duration::from_secs(5), association_pair())
        .await
        .expect("handshake timed out");

    let s = client
        .open_stream(3, PayloadProtocolIdentifier::Binary)
        .await
        .unwrap();

    // Larger than the path MTU, forcing B/M/E fragmentation.
    let big: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    s.write(&Bytes::from(big.clone())).await.unwrap();

    let remote = timeout(Duration::from_secs(5), server.accept_stream())
        .await
        .expect("accept timed out")
        .unwrap();
    let (data, _) = timeout(Duration::from_secs(5), remote.read_sctp())
        .await
        .expect("read timed out")
        .unwrap();
    assert_eq!(data.len(), big.len());
    assert_eq!(&data[..], &big[..]);
}

#[tokio::test]
async fn test_message_too_large_rejected() {
    let (client, _server) = timeout(Duration::from_secs(5), association_pair())
        .await
        .expect("handshake timed out");

    let s = client
        .open_stream(5, PayloadProtocolIdentifier::Binary)
        .await
        .unwrap();
    let too_big = Bytes::from(vec![0u8; (client.max_message_size() + 1) as usize]);
    assert_eq!(
        s.write(&too_big).await,
        Err(Error::ErrOutboundPacketTooLarge)
    );
}

#[tokio::test]
async fn test_open_stream_duplicate_id() {
    let (client, _server) = timeout(Duration::from_secs(5), association_pair())
        .await
        .expect("handshake timed out");
    client
        .open_stream(7, PayloadProtocolIdentifier::Binary)
        .await
        .unwrap();
    assert!(matches!(
        client
            .open_stream(7, PayloadProtocolIdentifier::Binary)
            .await,
        Err(Error::ErrStreamAlreadyExist)
    ));
}
