use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use data::data_channel::{Config as DataChannelConfig, DataChannel};
use data::message::message_channel_open::{ChannelType, CHANNEL_PRIORITY_NORMAL};
use log::debug;
use sctp::association::Association;
use tokio::sync::{mpsc, Mutex, Notify};

use crate::error::{Error, Result};

// RTCDataChannelState per W3C.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RTCDataChannelState {
    #[default]
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl From<u8> for RTCDataChannelState {
    fn from(v: u8) -> Self {
        match v {
            1 => RTCDataChannelState::Open,
            2 => RTCDataChannelState::Closing,
            3 => RTCDataChannelState::Closed,
            _ => RTCDataChannelState::Connecting,
        }
    }
}

// RTCDataChannelInit mirrors the W3C dictionary.
#[derive(Debug, Clone, Default)]
pub struct RTCDataChannelInit {
    pub ordered: Option<bool>,
    pub max_packet_life_time: Option<u16>,
    pub max_retransmits: Option<u16>,
    pub protocol: Option<String>,
    pub negotiated: Option<u16>,
}

type OnMessageHandler = Arc<dyn Fn(Bytes, bool) + Send + Sync>;
type OnOpenHandler = Arc<dyn Fn() + Send + Sync>;

// RTCDataChannel is the user-facing channel handle. It exists before the
// SCTP association does: sends queue until establishment resolves the
// handle onto exactly one underlying channel.
pub struct RTCDataChannel {
    pub label: String,
    pub protocol: String,
    pub ordered: bool,
    pub max_packet_life_time: Option<u16>,
    pub max_retransmits: Option<u16>,
    pub negotiated: Option<u16>,

    state: AtomicU8,
    inner: Mutex<Option<Arc<DataChannel>>>,
    // Sends issued before open, flushed FIFO on establishment.
    pending: Mutex<Vec<(Bytes, bool)>>,
    open_notify: Notify,

    message_tx: mpsc::Sender<(Bytes, bool)>,
    message_rx: Mutex<mpsc::Receiver<(Bytes, bool)>>,
    on_message: Mutex<Option<OnMessageHandler>>,
    on_open: Mutex<Option<OnOpenHandler>>,
    on_close: Mutex<Option<OnOpenHandler>>,

    messages_sent: AtomicUsize,
    messages_received: AtomicUsize,
}

impl RTCDataChannel {
    pub(crate) fn new(label: String, init: RTCDataChannelInit) -> Arc<Self> {
        let (message_tx, message_rx) = mpsc::channel(256);
        Arc::new(RTCDataChannel {
            label,
            protocol: init.protocol.clone().unwrap_or_default(),
            ordered: init.ordered.unwrap_or(true),
            max_packet_life_time: init.max_packet_life_time,
            max_retransmits: init.max_retransmits,
            negotiated: init.negotiated,
            state: AtomicU8::new(RTCDataChannelState::Connecting as u8),
            inner: Mutex::new(None),
            pending: Mutex::new(vec![]),
            open_notify: Notify::new(),
            message_tx,
            message_rx: Mutex::new(message_rx),
            on_message: Mutex::new(None),
            on_open: Mutex::new(None),
            on_close: Mutex::new(None),
            messages_sent: AtomicUsize::new(0),
            messages_received: AtomicUsize::new(0),
        })
    }

    // from_established wraps a channel the peer opened.
    pub(crate) fn from_established(inner: Arc<DataChannel>) -> Arc<Self> {
        let (message_tx, message_rx) = mpsc::channel(256);
        let dc = Arc::new(RTCDataChannel {
            label: inner.config.label.clone(),
            protocol: inner.config.protocol.clone(),
            ordered: !inner.config.channel_type.unordered(),
            max_packet_life_time: None,
            max_retransmits: None,
            negotiated: None,
            state: AtomicU8::new(RTCDataChannelState::Open as u8),
            inner: Mutex::new(Some(inner)),
            pending: Mutex::new(vec![]),
            open_notify: Notify::new(),
            message_tx,
            message_rx: Mutex::new(message_rx),
            on_message: Mutex::new(None),
            on_open: Mutex::new(None),
            on_close: Mutex::new(None),
            messages_sent: AtomicUsize::new(0),
            messages_received: AtomicUsize::new(0),
        });
        dc.clone().spawn_read_loop();
        dc
    }

    fn channel_type(&self) -> ChannelType {
        match (self.max_retransmits, self.max_packet_life_time, self.ordered) {
            (Some(_), _, true) => ChannelType::PartialReliableRexmit,
            (Some(_), _, false) => ChannelType::PartialReliableRexmitUnordered,
            (None, Some(_), true) => ChannelType::PartialReliableTimed,
            (None, Some(_), false) => ChannelType::PartialReliableTimedUnordered,
            (None, None, true) => ChannelType::Reliable,
            (None, None, false) => ChannelType::ReliableUnordered,
        }
    }

    // open binds the handle to the association; stream id parity follows
    // the DTLS role (RFC 8832 §6).
    pub(crate) async fn open(
        self: &Arc<Self>,
        association: &Association,
        stream_id: u16,
    ) -> Result<()> {
        let reliability_parameter = self
            .max_retransmits
            .map(u32::from)
            .or_else(|| self.max_packet_life_time.map(u32::from))
            .unwrap_or(0);

        let config = DataChannelConfig {
            channel_type: self.channel_type(),
            negotiated: self.negotiated.is_some(),
            priority: CHANNEL_PRIORITY_NORMAL,
            reliability_parameter,
            label: self.label.clone(),
            protocol: self.protocol.clone(),
        };

        let inner = Arc::new(DataChannel::dial(association, stream_id, config).await?);
        *self.inner.lock().await = Some(inner);
        self.state
            .store(RTCDataChannelState::Open as u8, Ordering::SeqCst);

        // Flush queued sends in FIFO order.
        let pending = std::mem::take(&mut *self.pending.lock().await);
        for (payload, is_string) in pending {
            self.send_now(&payload, is_string).await?;
        }

        self.clone().spawn_read_loop();
        self.open_notify.notify_waiters();
        if let Some(handler) = self.on_open.lock().await.as_ref() {
            handler();
        }
        Ok(())
    }

    fn spawn_read_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                let inner = {
                    let guard = self.inner.lock().await;
                    match guard.as_ref() {
                        Some(inner) => inner.clone(),
                        None => return,
                    }
                };
                match inner.read().await {
                    Ok((payload, is_string)) => {
                        self.messages_received.fetch_add(1, Ordering::SeqCst);
                        let handler = self.on_message.lock().await.clone();
                        if let Some(handler) = handler {
                            handler(payload, is_string);
                        } else if self.message_tx.send((payload, is_string)).await.is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        debug!("data channel '{}' read loop ended: {err}", self.label);
                        self.state
                            .store(RTCDataChannelState::Closed as u8, Ordering::SeqCst);
                        if let Some(handler) = self.on_close.lock().await.as_ref() {
                            handler();
                        }
                        return;
                    }
                }
            }
        });
    }

    pub fn ready_state(&self) -> RTCDataChannelState {
        RTCDataChannelState::from(self.state.load(Ordering::SeqCst))
    }

    pub async fn on_message(&self, handler: OnMessageHandler) {
        *self.on_message.lock().await = Some(handler);
    }

    pub async fn on_open(&self, handler: OnOpenHandler) {
        *self.on_open.lock().await = Some(handler);
    }

    pub async fn on_close(&self, handler: OnOpenHandler) {
        *self.on_close.lock().await = Some(handler);
    }

    // recv returns the next message when no on_message handler is set.
    pub async fn recv(&self) -> Result<(Bytes, bool)> {
        let mut rx = self.message_rx.lock().await;
        rx.recv().await.ok_or(Error::ErrConnectionClosed)
    }

    // wait_open resolves once the channel reaches the open state. The
    // sleep arm covers the window between the state check and waiter
    // registration.
    pub async fn wait_open(&self) -> Result<()> {
        loop {
            match self.ready_state() {
                RTCDataChannelState::Open => return Ok(()),
                RTCDataChannelState::Closed | RTCDataChannelState::Closing => {
                    return Err(Error::ErrDataChannelNotOpen)
                }
                _ => {
                    tokio::select! {
                        _ = self.open_notify.notified() => {}
                        _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
                    }
                }
            }
        }
    }

    // send queues before open, transmits immediately after, and fails
    // once closed.
    pub async fn send(&self, payload: &Bytes) -> Result<usize> {
        self.send_inner(payload, false).await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<usize> {
        let text = text.into();
        self.send_inner(&Bytes::from(text.into_bytes()), true).await
    }

    async fn send_inner(&self, payload: &Bytes, is_string: bool) -> Result<usize> {
        match self.ready_state() {
            RTCDataChannelState::Connecting => {
                self.pending
                    .lock()
                    .await
                    .push((payload.clone(), is_string));
                Ok(payload.len())
            }
            RTCDataChannelState::Open => self.send_now(payload, is_string).await,
            _ => Err(Error::ErrDataChannelNotOpen),
        }
    }

    async fn send_now(&self, payload: &Bytes, is_string: bool) -> Result<usize> {
        let inner = {
            let guard = self.inner.lock().await;
            guard.as_ref().cloned().ok_or(Error::ErrDataChannelNotOpen)?
        };
        let n = inner.write(payload, is_string).await?;
        self.messages_sent.fetch_add(1, Ordering::SeqCst);
        Ok(n)
    }

    pub fn messages_sent(&self) -> usize {
        self.messages_sent.load(Ordering::SeqCst)
    }

    pub fn messages_received(&self) -> usize {
        self.messages_received.load(Ordering::SeqCst)
    }

    pub async fn buffered_amount(&self) -> usize {
        match self.inner.lock().await.as_ref() {
            Some(inner) => inner.buffered_amount(),
            None => self.pending.lock().await.iter().map(|(p, _)| p.len()).sum(),
        }
    }

    // close resets the underlying stream; the association stays up.
    pub async fn close(&self) -> Result<()> {
        let prev = self
            .state
            .swap(RTCDataChannelState::Closing as u8, Ordering::SeqCst);
        if prev == RTCDataChannelState::Closed as u8 {
            return Ok(());
        }
        if let Some(inner) = self.inner.lock().await.as_ref() {
            let _ = inner.close().await;
        }
        self.state
            .store(RTCDataChannelState::Closed as u8, Ordering::SeqCst);
        if let Some(handler) = self.on_close.lock().await.as_ref() {
            handler();
        }
        Ok(())
    }
}
