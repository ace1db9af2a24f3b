use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use util::conn::Conn;

use super::ClientInternal;
use crate::error::Error;

// RelayConn presents a TURN allocation as a datagram connection: reads
// yield peer data from Data indications and ChannelData, writes relay
// through the server with permissions handled transparently.
pub struct RelayConn {
    client: Arc<ClientInternal>,
    relayed_addr: SocketAddr,
    // Peer used by connected-mode send/recv.
    peer: Mutex<Option<SocketAddr>>,
}

impl RelayConn {
    pub(crate) fn new(client: Arc<ClientInternal>, relayed_addr: SocketAddr) -> Self {
        RelayConn {
            client,
            relayed_addr,
            peer: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Conn for RelayConn {
    async fn connect(&self, addr: SocketAddr) -> util::Result<()> {
        *self.peer.lock().await = Some(addr);
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> util::Result<usize> {
        let (n, _) = self.recv_from(buf).await?;
        Ok(n)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> util::Result<(usize, SocketAddr)> {
        let (data, from) = self.client.recv_from().await.map_err(util::Error::from)?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok((n, from))
    }

    async fn send(&self, buf: &[u8]) -> util::Result<usize> {
        let peer = {
            let peer = self.peer.lock().await;
            peer.ok_or_else(|| util::Error::from(Error::ErrNoAllocation))?
        };
        self.send_to(buf, peer).await
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> util::Result<usize> {
        self.client
            .send_to(buf, target)
            .await
            .map_err(util::Error::from)
    }

    fn local_addr(&self) -> util::Result<SocketAddr> {
        Ok(self.relayed_addr)
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }

    async fn close(&self) -> util::Result<()> {
        Ok(())
    }
}
