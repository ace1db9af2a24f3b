pub mod relay_conn;

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use stun::attributes::*;
use stun::error_code::*;
use stun::integrity::MessageIntegrity;
use stun::message::*;
use stun::textattrs::TextAttribute;
use tokio::sync::{mpsc, oneshot, Mutex};
use util::conn::Conn;

use crate::error::{Error, Result};
use crate::proto::*;
pub use relay_conn::RelayConn;

const DEFAULT_RTO: Duration = Duration::from_millis(200);
const MAX_RTX_COUNT: u32 = 7;
// Permissions last 5 minutes on the server; refresh at a safe margin.
pub(crate) const PERMISSION_LIFETIME: Duration = Duration::from_secs(5 * 60);
const MAX_DATA_BUFFER: usize = 64;

// ClientConfig collects what a TURN allocation needs.
pub struct ClientConfig {
    pub stun_serv_addr: SocketAddr,
    pub username: String,
    pub password: String,
    pub realm: String,
    pub software: String,
    pub conn: Arc<dyn Conn + Send + Sync>,
    pub rto: Option<Duration>,
}

pub(crate) struct ClientInternal {
    pub(crate) conn: Arc<dyn Conn + Send + Sync>,
    pub(crate) turn_server: SocketAddr,
    username: String,
    password: String,
    realm: Mutex<String>,
    nonce: Mutex<String>,
    software: String,
    rto: Duration,

    transactions: Mutex<HashMap<TransactionId, oneshot::Sender<Message>>>,
    pub(crate) relay: Mutex<Option<RelayState>>,
    data_tx: mpsc::Sender<(Vec<u8>, SocketAddr)>,
    data_rx: Mutex<mpsc::Receiver<(Vec<u8>, SocketAddr)>>,
}

pub(crate) struct RelayState {
    pub(crate) relayed_addr: SocketAddr,
    pub(crate) mapped_addr: SocketAddr,
    pub(crate) lifetime: Duration,
    pub(crate) permissions: HashMap<IpAddr, tokio::time::Instant>,
    pub(crate) bindings: HashMap<SocketAddr, ChannelNumber>,
    pub(crate) bindings_by_number: HashMap<ChannelNumber, SocketAddr>,
    pub(crate) next_channel: u16,
}

// Client is a TURN client for one allocation over a connected socket.
pub struct Client {
    pub(crate) internal: Arc<ClientInternal>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        let (data_tx, data_rx) = mpsc::channel(MAX_DATA_BUFFER);
        Client {
            internal: Arc::new(ClientInternal {
                conn: config.conn,
                turn_server: config.stun_serv_addr,
                username: config.username,
                password: config.password,
                realm: Mutex::new(config.realm),
                nonce: Mutex::new(String::new()),
                software: config.software,
                rto: config.rto.unwrap_or(DEFAULT_RTO),
                transactions: Mutex::new(HashMap::new()),
                relay: Mutex::new(None),
                data_tx,
                data_rx: Mutex::new(data_rx),
            }),
        }
    }

    // listen starts the demultiplexing read loop. Incoming bytes starting
    // 0x40..=0x7F are ChannelData; everything else is STUN.
    pub fn listen(&self) {
        let internal = self.internal.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            loop {
                let n = match internal.conn.recv(&mut buf).await {
                    Ok(n) => n,
                    Err(err) => {
                        debug!("turn client read loop ended: {err}");
                        return;
                    }
                };
                if let Err(err) = internal.handle_inbound(&buf[..n]).await {
                    warn!("turn client failed to handle packet: {err}");
                }
            }
        });
    }

    // allocate requests a relayed transport address, authenticating with
    // long-term credentials on the expected 401 challenge.
    pub async fn allocate(&self) -> Result<SocketAddr> {
        {
            let relay = self.internal.relay.lock().await;
            if relay.is_some() {
                return Err(Error::ErrOneAllocateOnly);
            }
        }

        // First attempt carries no credentials and harvests REALM/NONCE.
        let mut msg = Message::new();
        msg.set_type(MessageType::new(METHOD_ALLOCATE, CLASS_REQUEST));
        msg.new_transaction_id();
        RequestedTransport(PROTO_UDP).add_to(&mut msg)?;
        self.internal.add_software(&mut msg)?;
        stun::fingerprint::FINGERPRINT.add_to(&mut msg)?;

        let response = self.internal.perform_transaction(msg).await?;

        let response = if response.typ.class == CLASS_ERROR_RESPONSE {
            let mut code = ErrorCodeAttribute::default();
            code.get_from(&response)?;
            if code.code != CODE_UNAUTHORIZED {
                return Err(Error::ErrServerError(format!("allocate: {}", code.code.0)));
            }
            self.internal.update_credentials(&response).await?;

            let mut msg = Message::new();
            msg.set_type(MessageType::new(METHOD_ALLOCATE, CLASS_REQUEST));
            msg.new_transaction_id();
            RequestedTransport(PROTO_UDP).add_to(&mut msg)?;
            self.internal.add_software(&mut msg)?;
            self.internal.add_auth(&mut msg).await?;
            self.internal.perform_transaction(msg).await?
        } else {
            response
        };

        if response.typ.class == CLASS_ERROR_RESPONSE {
            let mut code = ErrorCodeAttribute::default();
            code.get_from(&response)?;
            return Err(Error::ErrServerError(format!("allocate: {}", code.code.0)));
        }

        let mut relayed = XorRelayedAddress::default();
        relayed.get_from(&response)?;
        let mut mapped = stun::addr::XorMappedAddress::default();
        let _ = mapped.get_from(&response);
        let mut lifetime = Lifetime::default();
        let _ = lifetime.get_from(&response);

        let relayed_addr = SocketAddr::new(relayed.0.ip, relayed.0.port);
        {
            let mut relay = self.internal.relay.lock().await;
            *relay = Some(RelayState {
                relayed_addr,
                mapped_addr: SocketAddr::new(mapped.ip, mapped.port),
                lifetime: lifetime.0,
                permissions: HashMap::new(),
                bindings: HashMap::new(),
                bindings_by_number: HashMap::new(),
                next_channel: MIN_CHANNEL_NUMBER,
            });
        }

        self.spawn_refresh(lifetime.0);
        Ok(relayed_addr)
    }

    // relay_conn wraps the allocation as a util::Conn.
    pub async fn relay_conn(self: &Arc<Self>) -> Result<RelayConn> {
        let relay = self.internal.relay.lock().await;
        let state = relay.as_ref().ok_or(Error::ErrNoAllocation)?;
        Ok(RelayConn::new(self.internal.clone(), state.relayed_addr))
    }

    fn spawn_refresh(&self, lifetime: Duration) {
        let internal = self.internal.clone();
        tokio::spawn(async move {
            let period = lifetime.max(Duration::from_secs(60)) / 2;
            loop {
                tokio::time::sleep(period).await;
                if internal.refresh_allocation(lifetime).await.is_err() {
                    return;
                }
            }
        });
    }

    pub async fn close(&self) {
        // A zero-lifetime refresh releases the allocation.
        let _ = self.internal.refresh_allocation(Duration::ZERO).await;
    }
}

impl ClientInternal {
    fn add_software(&self, msg: &mut Message) -> Result<()> {
        if !self.software.is_empty() {
            TextAttribute::new(ATTR_SOFTWARE, self.software.clone()).add_to(msg)?;
        }
        Ok(())
    }

    // add_auth appends USERNAME/REALM/NONCE/MESSAGE-INTEGRITY using the
    // long-term credential key.
    pub(crate) async fn add_auth(&self, msg: &mut Message) -> Result<()> {
        let realm = self.realm.lock().await.clone();
        let nonce = self.nonce.lock().await.clone();
        TextAttribute::new(ATTR_USERNAME, self.username.clone()).add_to(msg)?;
        TextAttribute::new(ATTR_REALM, realm.clone()).add_to(msg)?;
        TextAttribute::new(ATTR_NONCE, nonce).add_to(msg)?;
        let integrity = MessageIntegrity::new_long_term_integrity(
            self.username.clone(),
            realm,
            self.password.clone(),
        );
        integrity.add_to(msg)?;
        Ok(())
    }

    async fn update_credentials(&self, response: &Message) -> Result<()> {
        let realm = TextAttribute::get_from_as(response, ATTR_REALM)
            .map_err(|_| Error::ErrMissingRealmOrNonce)?;
        let nonce = TextAttribute::get_from_as(response, ATTR_NONCE)
            .map_err(|_| Error::ErrMissingRealmOrNonce)?;
        *self.realm.lock().await = realm.text;
        *self.nonce.lock().await = nonce.text;
        Ok(())
    }

    // perform_transaction sends a request and retransmits on an
    // exponential backoff until the response arrives or Rc is exhausted.
    pub(crate) async fn perform_transaction(&self, msg: Message) -> Result<Message> {
        let (tx, mut rx) = oneshot::channel();
        {
            let mut transactions = self.transactions.lock().await;
            transactions.insert(msg.transaction_id, tx);
        }

        let raw = msg.raw.clone();
        let mut rto = self.rto;
        for _ in 0..MAX_RTX_COUNT {
            self.conn.send(&raw).await?;
            match tokio::time::timeout(rto, &mut rx).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(_)) => return Err(Error::ErrTransactionClosed),
                Err(_) => {
                    rto = (rto * 2).min(Duration::from_secs(8));
                }
            }
        }

        let mut transactions = self.transactions.lock().await;
        transactions.remove(&msg.transaction_id);
        Err(Error::ErrAllRetransmissionsFailed)
    }

    async fn handle_inbound(&self, data: &[u8]) -> Result<()> {
        if stun::message::is_message(data) {
            let mut msg = Message::new();
            msg.write(data)?;

            match msg.typ.class {
                CLASS_SUCCESS_RESPONSE | CLASS_ERROR_RESPONSE => {
                    let tx = {
                        let mut transactions = self.transactions.lock().await;
                        transactions.remove(&msg.transaction_id)
                    };
                    if let Some(tx) = tx {
                        let _ = tx.send(msg);
                    }
                    Ok(())
                }
                CLASS_INDICATION if msg.typ.method == METHOD_DATA => {
                    let mut peer = XorPeerAddress::default();
                    peer.get_from(&msg)?;
                    let mut data_attr = Data::default();
                    data_attr.get_from(&msg)?;
                    let from = SocketAddr::new(peer.0.ip, peer.0.port);
                    let _ = self.data_tx.try_send((data_attr.0, from));
                    Ok(())
                }
                _ => Ok(()),
            }
        } else if is_channel_data(data) {
            let cd = ChannelData::unmarshal(data)?;
            let from = {
                let relay = self.relay.lock().await;
                relay
                    .as_ref()
                    .and_then(|r| r.bindings_by_number.get(&cd.number).copied())
            };
            if let Some(from) = from {
                let _ = self.data_tx.try_send((cd.data, from));
            }
            Ok(())
        } else {
            Ok(())
        }
    }

    // ensure_permission installs (or renews) a permission for the peer.
    pub(crate) async fn ensure_permission(&self, peer: SocketAddr) -> Result<()> {
        {
            let relay = self.relay.lock().await;
            let Some(state) = relay.as_ref() else {
                return Err(Error::ErrNoAllocation);
            };
            if let Some(installed) = state.permissions.get(&peer.ip()) {
                if installed.elapsed() < PERMISSION_LIFETIME / 2 {
                    return Ok(());
                }
            }
        }

        let mut msg = Message::new();
        msg.set_type(MessageType::new(METHOD_CREATE_PERMISSION, CLASS_REQUEST));
        msg.new_transaction_id();
        XorPeerAddress(stun::addr::XorMappedAddress {
            ip: peer.ip(),
            port: peer.port(),
        })
        .add_to(&mut msg)?;
        self.add_auth(&mut msg).await?;

        let response = self.perform_transaction(msg).await?;
        if response.typ.class == CLASS_ERROR_RESPONSE {
            let mut code = ErrorCodeAttribute::default();
            code.get_from(&response)?;
            return Err(Error::ErrServerError(format!(
                "create permission: {}",
                code.code.0
            )));
        }

        let mut relay = self.relay.lock().await;
        if let Some(state) = relay.as_mut() {
            state
                .permissions
                .insert(peer.ip(), tokio::time::Instant::now());
        }
        Ok(())
    }

    // bind_channel upgrades a peer to compact ChannelData framing.
    pub(crate) async fn bind_channel(&self, peer: SocketAddr) -> Result<ChannelNumber> {
        let number = {
            let mut relay = self.relay.lock().await;
            let Some(state) = relay.as_mut() else {
                return Err(Error::ErrNoAllocation);
            };
            if let Some(number) = state.bindings.get(&peer) {
                return Ok(*number);
            }
            if state.next_channel > MAX_CHANNEL_NUMBER {
                return Err(Error::ErrInvalidChannelNumber);
            }
            let number = ChannelNumber(state.next_channel);
            state.next_channel += 1;
            number
        };

        let mut msg = Message::new();
        msg.set_type(MessageType::new(METHOD_CHANNEL_BIND, CLASS_REQUEST));
        msg.new_transaction_id();
        number.add_to(&mut msg)?;
        XorPeerAddress(stun::addr::XorMappedAddress {
            ip: peer.ip(),
            port: peer.port(),
        })
        .add_to(&mut msg)?;
        self.add_auth(&mut msg).await?;

        let response = self.perform_transaction(msg).await?;
        if response.typ.class == CLASS_ERROR_RESPONSE {
            return Err(Error::ErrServerError("channel bind".to_owned()));
        }

        let mut relay = self.relay.lock().await;
        if let Some(state) = relay.as_mut() {
            state.bindings.insert(peer, number);
            state.bindings_by_number.insert(number, peer);
        }
        Ok(number)
    }

    // send_to relays application data: ChannelData when bound, otherwise
    // a Send indication.
    pub(crate) async fn send_to(&self, data: &[u8], peer: SocketAddr) -> Result<usize> {
        self.ensure_permission(peer).await?;

        let bound = {
            let relay = self.relay.lock().await;
            relay.as_ref().and_then(|r| r.bindings.get(&peer).copied())
        };

        if let Some(number) = bound {
            let cd = ChannelData {
                number,
                data: data.to_vec(),
            };
            self.conn.send(&cd.marshal()).await?;
        } else {
            let mut msg = Message::new();
            msg.set_type(MessageType::new(METHOD_SEND, CLASS_INDICATION));
            msg.new_transaction_id();
            XorPeerAddress(stun::addr::XorMappedAddress {
                ip: peer.ip(),
                port: peer.port(),
            })
            .add_to(&mut msg)?;
            Data(data.to_vec()).add_to(&mut msg)?;
            self.conn.send(&msg.raw).await?;
        }
        Ok(data.len())
    }

    pub(crate) async fn recv_from(&self) -> Result<(Vec<u8>, SocketAddr)> {
        let mut rx = self.data_rx.lock().await;
        rx.recv().await.ok_or(Error::ErrClosed)
    }

    async fn refresh_allocation(&self, lifetime: Duration) -> Result<()> {
        let mut msg = Message::new();
        msg.set_type(MessageType::new(METHOD_REFRESH, CLASS_REQUEST));
        msg.new_transaction_id();
        Lifetime(lifetime).add_to(&mut msg)?;
        self.add_auth(&mut msg).await?;

        let response = self.perform_transaction(msg).await?;
        if response.typ.class == CLASS_ERROR_RESPONSE {
            // A stale nonce is refreshed and retried once.
            self.update_credentials(&response).await?;
            let mut msg = Message::new();
            msg.set_type(MessageType::new(METHOD_REFRESH, CLASS_REQUEST));
            msg.new_transaction_id();
            Lifetime(lifetime).add_to(&mut msg)?;
            self.add_auth(&mut msg).await?;
            self.perform_transaction(msg).await?;
        }
        Ok(())
    }
}
