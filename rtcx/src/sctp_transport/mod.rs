use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use sctp::association::{Association, Config as AssociationConfig};
use tokio::sync::Mutex;
use util::conn::Conn;

use crate::data_channel::RTCDataChannel;
use crate::error::{Error, Result};

pub const DEFAULT_SCTP_PORT: u16 = 5000;
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 262144;

// DtlsConnAdapter lets the SCTP association treat the DTLS connection as
// a datagram transport.
pub(crate) struct DtlsConnAdapter {
    pub(crate) dtls: Arc<dtls::conn::DTLSConn>,
}

#[async_trait]
impl Conn for DtlsConnAdapter {
    async fn connect(&self, _addr: SocketAddr) -> util::Result<()> {
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> util::Result<usize> {
        self.dtls
            .read(buf)
            .await
            .map_err(util::Error::from_std)
    }

    async fn recv_from(&self, buf: &mut [u8]) -> util::Result<(usize, SocketAddr)> {
        let n = self.recv(buf).await?;
        Ok((n, SocketAddr::from(([0, 0, 0, 0], 0))))
    }

    async fn send(&self, buf: &[u8]) -> util::Result<usize> {
        self.dtls
            .write(buf)
            .await
            .map_err(util::Error::from_std)
    }

    async fn send_to(&self, buf: &[u8], _target: SocketAddr) -> util::Result<usize> {
        self.send(buf).await
    }

    fn local_addr(&self) -> util::Result<SocketAddr> {
        Ok(SocketAddr::from(([0, 0, 0, 0], 0)))
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }

    async fn close(&self) -> util::Result<()> {
        Ok(())
    }
}

// RTCSctpTransport owns the association carrying the data channels.
pub struct RTCSctpTransport {
    pub(crate) association: Mutex<Option<Arc<Association>>>,
    pub(crate) max_message_size: u32,
    pub(crate) port: u16,
}

impl Default for RTCSctpTransport {
    fn default() -> Self {
        RTCSctpTransport {
            association: Mutex::new(None),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            port: DEFAULT_SCTP_PORT,
        }
    }
}

impl RTCSctpTransport {
    // start establishes the association; the DTLS client is the SCTP
    // client per RFC 8832's stream id parity convention.
    pub async fn start(
        &self,
        dtls_conn: Arc<dtls::conn::DTLSConn>,
        is_client: bool,
    ) -> Result<Arc<Association>> {
        let adapter = Arc::new(DtlsConnAdapter { dtls: dtls_conn });
        let config = AssociationConfig {
            net_conn: adapter,
            max_receive_buffer_size: 0,
            max_message_size: self.max_message_size,
            name: if is_client { "client" } else { "server" }.to_owned(),
        };

        let association = Arc::new(
            tokio::time::timeout(std::time::Duration::from_secs(10), async {
                if is_client {
                    Association::client(config).await
                } else {
                    Association::server(config).await
                }
            })
            .await
            .map_err(|_| Error::ErrSctpFailed("establishment timed out".to_owned()))?
            .map_err(|e| Error::ErrSctpFailed(e.to_string()))?,
        );
        debug!("sctp transport established (client={is_client})");

        *self.association.lock().await = Some(association.clone());
        Ok(association)
    }

    // accept_loop surfaces peer-opened channels through the handler.
    pub(crate) fn spawn_accept_loop(
        association: Arc<Association>,
        handler: Arc<dyn Fn(Arc<RTCDataChannel>) + Send + Sync>,
    ) {
        tokio::spawn(async move {
            loop {
                match data::data_channel::DataChannel::accept(&association).await {
                    Ok(dc) => {
                        let rtc_dc = RTCDataChannel::from_established(Arc::new(dc));
                        handler(rtc_dc);
                    }
                    Err(err) => {
                        debug!("sctp accept loop ended: {err}");
                        return;
                    }
                }
            }
        });
    }

    pub async fn close(&self) -> Result<()> {
        if let Some(association) = self.association.lock().await.as_ref() {
            let _ = association.close().await;
        }
        Ok(())
    }
}
