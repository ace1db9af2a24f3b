use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use util::conn::Conn;

use super::AgentInternal;
use crate::error::Error;

// AgentConn exposes the nominated candidate pair as a datagram
// connection: the DTLS and SRTP layers run over it without knowing which
// path ICE picked.
pub struct AgentConn {
    internal: Arc<AgentInternal>,
}

impl AgentConn {
    pub(crate) fn new(internal: Arc<AgentInternal>) -> Self {
        AgentConn { internal }
    }

    async fn selected(&self) -> util::Result<(Arc<dyn Conn + Send + Sync>, SocketAddr)> {
        let state = self.internal.state.lock().await;
        let (local_id, remote_addr) = state
            .selected
            .clone()
            .ok_or_else(|| util::Error::from(Error::ErrNoViablePair))?;
        let socket = state
            .local_bases
            .iter()
            .find(|b| b.candidate.id == local_id)
            .map(|b| b.socket.clone())
            .ok_or_else(|| util::Error::from(Error::ErrNoViablePair))?;
        Ok((socket, remote_addr))
    }

    // wait_for_selected_pair blocks until nomination completes or the
    // agent fails. The sleep arm closes the check-then-wait race with
    // the notifier.
    pub async fn wait_for_selected_pair(&self) -> util::Result<()> {
        loop {
            {
                let state = self.internal.state.lock().await;
                if state.selected.is_some() {
                    return Ok(());
                }
            }
            if matches!(
                super::u8_to_state(
                    self.internal
                        .connection_state
                        .load(std::sync::atomic::Ordering::SeqCst)
                ),
                crate::state::ConnectionState::Failed | crate::state::ConnectionState::Closed
            ) {
                return Err(util::Error::from(Error::ErrNoViablePair));
            }
            tokio::select! {
                _ = self.internal.selected_notify.notified() => {}
                _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
            }
        }
    }
}

#[async_trait]
impl Conn for AgentConn {
    async fn connect(&self, _addr: SocketAddr) -> util::Result<()> {
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> util::Result<usize> {
        let (n, _) = self.recv_from(buf).await?;
        Ok(n)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> util::Result<(usize, SocketAddr)> {
        let mut rx = self.internal.data_rx.lock().await;
        let (data, from) = rx
            .recv()
            .await
            .ok_or_else(|| util::Error::from(Error::ErrClosed))?;
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok((n, from))
    }

    async fn send(&self, buf: &[u8]) -> util::Result<usize> {
        let (socket, remote) = self.selected().await?;
        socket.send_to(buf, remote).await
    }

    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> util::Result<usize> {
        let (socket, _) = self.selected().await?;
        socket.send_to(buf, target).await
    }

    fn local_addr(&self) -> util::Result<SocketAddr> {
        Err(util::Error::Other("agent conn has no single local addr".to_owned()))
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }

    async fn close(&self) -> util::Result<()> {
        Ok(())
    }
}
