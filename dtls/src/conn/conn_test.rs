use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::*;
use crate::config::Certificate;

async fn udp_pair() -> (Arc<UdpSocket>, Arc<UdpSocket>) {
    let a = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    let b = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
    a.connect(b.local_addr().unwrap()).await.unwrap();
    b.connect(a.local_addr().unwrap()).await.unwrap();
    (a, b)
}

fn config() -> Config {
    Config {
        certificates: vec![Certificate::generate_self_signed("rtcx").unwrap()],
        ..Default::default()
    }
}

async fn dtls_pair() -> (DTLSConn, DTLSConn) {
    let (ca, cb) = udp_pair().await;
    let server = tokio::spawn(async move { DTLSConn::new(cb, config(), false).await });
    let client = DTLSConn::new(ca, config(), true).await.unwrap();
    let server = server.await.unwrap().unwrap();
    (client, server)
}

#[tokio::test]
async fn test_handshake_completes() {
    let (client, server) = timeout(Duration::from_secs(20), dtls_pair())
        .await
        .expect("handshake timed out");

    assert!(client.connection_state().cipher_suite.is_some());
    assert_eq!(
        client.connection_state().cipher_suite,
        server.connection_state().cipher_suite
    );
    // Both sides saw each other's certificate for fingerprint checks.
    assert!(!client.connection_state().peer_certificates.is_empty());
    assert!(!server.connection_state().peer_certificates.is_empty());
}

#[tokio::test]
async fn test_application_data_roundtrip() {
    let (client, server) = timeout(Duration::from_secs(20), dtls_pair())
        .await
        .expect("handshake timed out");

    client.write(b"hello over dtls").await.unwrap();
    let mut buf = vec![0u8; 8192];
    let n = timeout(Duration::from_secs(5), server.read(&mut buf))
        .await
        .expect("read timed out")
        .unwrap();
    assert_eq!(&buf[..n], b"hello over dtls");

    server.write(b"right back").await.unwrap();
    let n = timeout(Duration::from_secs(5), client.read(&mut buf))
        .await
        .expect("read timed out")
        .unwrap();
    assert_eq!(&buf[..n], b"right back");
}

#[tokio::test]
async fn test_exported_srtp_keys_match() {
    let (client, server) = timeout(Duration::from_secs(20), dtls_pair())
        .await
        .expect("handshake timed out");

    // RFC 5764: both sides must derive identical SRTP keying material.
    let c = client
        .export_keying_material("EXTRACTOR-dtls_srtp", 60)
        .unwrap();
    let s = server
        .export_keying_material("EXTRACTOR-dtls_srtp", 60)
        .unwrap();
    assert_eq!(c, s);
    assert_eq!(c.len(), 60);
}

#[tokio::test]
async fn test_srtp_profile_negotiated() {
    let (client, server) = timeout(Duration::from_secs(20), dtls_pair())
        .await
        .expect("handshake timed out");
    let c = client.selected_srtp_protection_profile();
    let s = server.selected_srtp_protection_profile();
    assert!(c.is_some());
    assert_eq!(c, s);
}

#[tokio::test]
async fn test_exporter_rejects_reserved_labels() {
    let (client, _server) = timeout(Duration::from_secs(20), dtls_pair())
        .await
        .expect("handshake timed out");
    assert_eq!(
        client.export_keying_material("master secret", 48),
        Err(Error::ErrReservedExportKeyingMaterial)
    );
}
