#[cfg(test)]
mod mux_test {
    use super::*;

    #[test]
    fn test_match_ranges() {
        // RFC 7983 first-byte demultiplexing.
        assert!(match_dtls(&[23, 0, 0]));
        assert!(match_dtls(&[63]));
        assert!(!match_dtls(&[0]));
        assert!(!match_dtls(&[128]));

        assert!(match_srtp_or_srtcp(&[128, 96]));
        assert!(match_srtp_or_srtcp(&[191, 200]));
        assert!(!match_srtp_or_srtcp(&[22, 0]));

        // RTCP payload types 192..=223 in the second byte.
        assert!(match_srtcp(&[0x80, 200]));
        assert!(match_srtcp(&[0x80, 205]));
        assert!(!match_srtcp(&[0x80, 96]));
        assert!(match_srtp(&[0x80, 96]));
        assert!(!match_srtp(&[0x80, 201]));
    }
}

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, trace};
use tokio::sync::{mpsc, Mutex};
use util::conn::Conn;

// MatchFunc routes an inbound datagram to an endpoint by inspecting its
// first bytes (RFC 7983).
pub type MatchFunc = Box<dyn (Fn(&[u8]) -> bool) + Send + Sync>;

pub fn match_dtls(b: &[u8]) -> bool {
    !b.is_empty() && (20..=63).contains(&b[0])
}

pub fn match_srtp_or_srtcp(b: &[u8]) -> bool {
    !b.is_empty() && (128..=191).contains(&b[0])
}

// RTCP packet types live in 192..=223.
pub fn match_srtcp(b: &[u8]) -> bool {
    match_srtp_or_srtcp(b) && b.len() > 1 && (192..=223).contains(&b[1])
}

pub fn match_srtp(b: &[u8]) -> bool {
    match_srtp_or_srtcp(b) && !match_srtcp(b)
}

const MAX_BUFFERED_PACKETS: usize = 256;

// Endpoint is one demultiplexed slice of the underlying transport; it
// implements Conn so protocol stacks run over it unmodified.
pub struct Endpoint {
    id: usize,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    tx: mpsc::Sender<Vec<u8>>,
    next_conn: Arc<dyn Conn + Send + Sync>,
}

#[async_trait]
impl Conn for Endpoint {
    async fn connect(&self, _addr: SocketAddr) -> util::Result<()> {
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> util::Result<usize> {
        let mut rx = self.rx.lock().await;
        let data = rx
            .recv()
            .await
            .ok_or(util::Error::ErrBufferClosed)?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> util::Result<(usize, SocketAddr)> {
        let n = self.recv(buf).await?;
        Ok((n, SocketAddr::from(([0, 0, 0, 0], 0))))
    }

    async fn send(&self, buf: &[u8]) -> util::Result<usize> {
        self.next_conn.send(buf).await
    }

    async fn send_to(&self, buf: &[u8], _target: SocketAddr) -> util::Result<usize> {
        self.next_conn.send(buf).await
    }

    fn local_addr(&self) -> util::Result<SocketAddr> {
        self.next_conn.local_addr()
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.next_conn.remote_addr()
    }

    async fn close(&self) -> util::Result<()> {
        Ok(())
    }
}

struct EndpointEntry {
    matcher: MatchFunc,
    tx: mpsc::Sender<Vec<u8>>,
    id: usize,
}

// Mux demultiplexes one packet connection into typed endpoints.
pub struct Mux {
    next_conn: Arc<dyn Conn + Send + Sync>,
    endpoints: Arc<Mutex<Vec<EndpointEntry>>>,
}

impl Mux {
    pub fn new(next_conn: Arc<dyn Conn + Send + Sync>) -> Arc<Self> {
        let mux = Arc::new(Mux {
            next_conn: next_conn.clone(),
            endpoints: Arc::new(Mutex::new(vec![])),
        });

        let endpoints = mux.endpoints.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            loop {
                let n = match next_conn.recv(&mut buf).await {
                    Ok(n) => n,
                    Err(err) => {
                        debug!("mux read loop ended: {err}");
                        return;
                    }
                };
                let packet = buf[..n].to_vec();
                let endpoints = endpoints.lock().await;
                let mut matched = false;
                for e in endpoints.iter() {
                    if (e.matcher)(&packet) {
                        let _ = e.tx.try_send(packet.clone());
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    trace!("mux: no endpoint for packet, first byte {:#x}", packet[0]);
                }
            }
        });

        mux
    }

    // new_endpoint registers a match function; earlier registrations win.
    pub async fn new_endpoint(&self, matcher: MatchFunc) -> Arc<Endpoint> {
        let (tx, rx) = mpsc::channel(MAX_BUFFERED_PACKETS);
        let mut endpoints = self.endpoints.lock().await;
        let id = endpoints.len();
        endpoints.push(EndpointEntry {
            matcher,
            tx: tx.clone(),
            id,
        });
        Arc::new(Endpoint {
            id,
            rx: Mutex::new(rx),
            tx,
            next_conn: self.next_conn.clone(),
        })
    }
}
