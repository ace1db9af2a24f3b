use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use log::debug;
use tokio::sync::Notify;

use crate::association::AssociationInternal;
use crate::chunk::chunk_payload_data::{ChunkPayloadData, PayloadProtocolIdentifier};
use crate::error::{Error, Result};
use crate::queue::ReassemblyQueue;

// ReliabilityType of a stream, mapped from the DCEP channel types
// (RFC 8831 §6.7 / RFC 3758).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ReliabilityType {
    // Fully reliable.
    #[default]
    Reliable = 0,
    // Give up after a number of retransmissions.
    Rexmit = 1,
    // Give up after a lifetime in milliseconds.
    Timed = 2,
}

impl From<u8> for ReliabilityType {
    fn from(v: u8) -> Self {
        match v {
            1 => ReliabilityType::Rexmit,
            2 => ReliabilityType::Timed,
            _ => ReliabilityType::Reliable,
        }
    }
}

// Maximum bytes queued towards the association before write applies
// backpressure.
const DEFAULT_MAX_BUFFERED_AMOUNT: usize = 1024 * 1024;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
enum StreamState {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

// Stream is one SCTP stream: an independently sequenced, optionally
// partially reliable message channel inside the association.
pub struct Stream {
    stream_identifier: u16,
    max_payload_size: u32,

    default_payload_type: AtomicU32,
    reliability_type: AtomicU8,
    reliability_value: AtomicU32,
    unordered: AtomicBool,

    next_ssn: AtomicU16,
    state: AtomicU8,
    eof: AtomicBool,

    // A std mutex: every critical section is short and free of awaits.
    reassembly: std::sync::Mutex<ReassemblyQueue>,
    reassembly_bytes: AtomicUsize,
    readable: Notify,
    writable: Notify,
    buffered_amount: AtomicUsize,
    max_buffered_amount: usize,

    pub(crate) association: std::sync::Mutex<Weak<tokio::sync::Mutex<AssociationInternal>>>,
    awake_write: Arc<Notify>,
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("stream_identifier", &self.stream_identifier)
            .finish()
    }
}

impl Stream {
    pub(crate) fn new(
        stream_identifier: u16,
        max_payload_size: u32,
        awake_write: Arc<Notify>,
    ) -> Self {
        Stream {
            stream_identifier,
            max_payload_size,
            default_payload_type: AtomicU32::new(PayloadProtocolIdentifier::Unknown as u32),
            reliability_type: AtomicU8::new(ReliabilityType::Reliable as u8),
            reliability_value: AtomicU32::new(0),
            unordered: AtomicBool::new(false),
            next_ssn: AtomicU16::new(0),
            state: AtomicU8::new(StreamState::Open as u8),
            eof: AtomicBool::new(false),
            reassembly: std::sync::Mutex::new(ReassemblyQueue::new(stream_identifier)),
            reassembly_bytes: AtomicUsize::new(0),
            readable: Notify::new(),
            writable: Notify::new(),
            buffered_amount: AtomicUsize::new(0),
            max_buffered_amount: DEFAULT_MAX_BUFFERED_AMOUNT,
            association: std::sync::Mutex::new(Weak::new()),
            awake_write,
        }
    }

    pub(crate) fn set_association(&self, weak: Weak<tokio::sync::Mutex<AssociationInternal>>) {
        *self.association.lock().unwrap() = weak;
    }

    pub fn stream_identifier(&self) -> u16 {
        self.stream_identifier
    }

    pub fn set_default_payload_type(&self, ppi: PayloadProtocolIdentifier) {
        self.default_payload_type.store(ppi as u32, Ordering::SeqCst);
    }

    // set_reliability_params configures ordering and partial reliability;
    // applies to subsequently written messages.
    pub fn set_reliability_params(&self, unordered: bool, rel_type: ReliabilityType, rel_val: u32) {
        self.unordered.store(unordered, Ordering::SeqCst);
        self.reliability_type.store(rel_type as u8, Ordering::SeqCst);
        self.reliability_value.store(rel_val, Ordering::SeqCst);
    }

    pub fn buffered_amount(&self) -> usize {
        self.buffered_amount.load(Ordering::SeqCst)
    }

    // read_sctp awaits the next complete message along with its PPID.
    // Returns ErrEof once the stream is reset or the association dies.
    pub async fn read_sctp(&self) -> Result<(Bytes, PayloadProtocolIdentifier)> {
        loop {
            {
                let mut reassembly = self.reassembly.lock().unwrap();
                if let Some((data, ppi)) = reassembly.read() {
                    self.reassembly_bytes
                        .store(reassembly.get_num_bytes(), Ordering::SeqCst);
                    return Ok((data, ppi));
                }
            }
            if self.eof.load(Ordering::SeqCst) {
                return Err(Error::ErrEof);
            }
            self.readable.notified().await;
        }
    }

    // write queues a message with the stream's default PPID.
    pub async fn write(&self, p: &Bytes) -> Result<usize> {
        let ppi = PayloadProtocolIdentifier::from(self.default_payload_type.load(Ordering::SeqCst));
        self.write_sctp(p, ppi).await
    }

    // write_sctp fragments the message and hands it to the association.
    // When the send buffer is full the call awaits drain, surfacing the
    // backpressure the transport is under.
    pub async fn write_sctp(
        &self,
        p: &Bytes,
        ppi: PayloadProtocolIdentifier,
    ) -> Result<usize> {
        if self.state.load(Ordering::SeqCst) != StreamState::Open as u8 {
            return Err(Error::ErrStreamClosed);
        }

        let assoc = {
            let weak = self.association.lock().unwrap();
            weak.upgrade().ok_or(Error::ErrStreamClosed)?
        };

        {
            let ai = assoc.lock().await;
            if p.len() > ai.max_message_size as usize {
                return Err(Error::ErrOutboundPacketTooLarge);
            }
        }

        // Backpressure: wait for the queue to drain below the cap.
        while self.buffered_amount.load(Ordering::SeqCst) + p.len() > self.max_buffered_amount {
            if self.state.load(Ordering::SeqCst) != StreamState::Open as u8 {
                return Err(Error::ErrStreamClosed);
            }
            self.writable.notified().await;
        }

        let chunks = self.packetize(p, ppi);
        self.buffered_amount.fetch_add(p.len(), Ordering::SeqCst);

        {
            let mut ai = assoc.lock().await;
            ai.push_pending(chunks);
        }
        self.awake_write.notify_one();

        Ok(p.len())
    }

    fn packetize(&self, raw: &Bytes, ppi: PayloadProtocolIdentifier) -> Vec<ChunkPayloadData> {
        let unordered = self.unordered.load(Ordering::SeqCst);
        let rel_type = ReliabilityType::from(self.reliability_type.load(Ordering::SeqCst));
        let rel_val = self.reliability_value.load(Ordering::SeqCst);
        let ssn = if unordered {
            0
        } else {
            self.next_ssn.fetch_add(1, Ordering::SeqCst)
        };

        let (max_retransmits, lifetime) = match rel_type {
            ReliabilityType::Reliable => (None, None),
            ReliabilityType::Rexmit => (Some(rel_val), None),
            ReliabilityType::Timed => (None, Some(Duration::from_millis(rel_val as u64))),
        };

        let max = self.max_payload_size as usize;
        let mut chunks = vec![];
        let mut remaining = raw.len();
        let mut offset = 0;
        loop {
            let fragment_size = remaining.min(max);
            chunks.push(ChunkPayloadData {
                stream_identifier: self.stream_identifier,
                user_data: raw.slice(offset..offset + fragment_size),
                unordered,
                beginning_fragment: offset == 0,
                ending_fragment: remaining <= max,
                payload_type: ppi,
                stream_sequence_number: ssn,
                max_retransmits,
                lifetime,
                ..Default::default()
            });
            remaining -= fragment_size;
            offset += fragment_size;
            if remaining == 0 {
                break;
            }
        }
        chunks
    }

    // shutdown closes the outgoing direction by issuing a RE-CONFIG
    // outgoing SSN reset for this stream.
    pub async fn shutdown(&self) -> Result<()> {
        let prev = self
            .state
            .swap(StreamState::Closing as u8, Ordering::SeqCst);
        if prev == StreamState::Closed as u8 {
            return Err(Error::ErrStreamClosed);
        }

        let assoc = {
            let weak = self.association.lock().unwrap();
            weak.upgrade().ok_or(Error::ErrStreamClosed)?
        };
        let mut ai = assoc.lock().await;
        ai.send_reset_request(self.stream_identifier)?;
        Ok(())
    }

    //
    // Called by the association with its lock held.
    //

    pub(crate) fn handle_data(&self, chunk: ChunkPayloadData) {
        let mut reassembly = self.reassembly.lock().unwrap();
        reassembly.push(chunk);
        self.reassembly_bytes
            .store(reassembly.get_num_bytes(), Ordering::SeqCst);
        if reassembly.is_readable() {
            self.readable.notify_one();
        }
    }

    pub(crate) fn handle_forward_tsn_for_ordered(&self, last_ssn: u16) {
        let mut reassembly = self.reassembly.lock().unwrap();
        reassembly.forward_tsn_for_ordered(last_ssn);
        self.reassembly_bytes
            .store(reassembly.get_num_bytes(), Ordering::SeqCst);
        if reassembly.is_readable() {
            self.readable.notify_one();
        }
    }

    pub(crate) fn handle_forward_tsn_for_unordered(&self, new_cumulative_tsn: u32) {
        let mut reassembly = self.reassembly.lock().unwrap();
        reassembly.forward_tsn_for_unordered(new_cumulative_tsn);
        self.reassembly_bytes
            .store(reassembly.get_num_bytes(), Ordering::SeqCst);
    }

    pub(crate) fn get_num_bytes_in_reassembly_queue(&self) -> usize {
        self.reassembly_bytes.load(Ordering::SeqCst)
    }

    pub(crate) fn sub_buffered(&self, n: usize) {
        self.buffered_amount.fetch_sub(n.min(self.buffered_amount.load(Ordering::SeqCst)), Ordering::SeqCst);
        self.writable.notify_waiters();
    }

    pub(crate) fn notify_writable(&self) {
        self.writable.notify_waiters();
    }

    pub(crate) fn mark_eof(&self) {
        self.eof.store(true, Ordering::SeqCst);
        self.state.store(StreamState::Closed as u8, Ordering::SeqCst);
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }

    pub(crate) fn mark_reset(&self) {
        debug!("stream {} reset", self.stream_identifier);
        self.mark_eof();
    }
}
