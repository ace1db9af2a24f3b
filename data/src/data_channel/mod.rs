#[cfg(test)]
mod data_channel_test;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use log::debug;
use sctp::association::Association;
use sctp::chunk::chunk_payload_data::PayloadProtocolIdentifier;
use sctp::stream::{ReliabilityType, Stream};

use crate::error::{Error, Result};
use crate::message::message_channel_open::{ChannelType, DataChannelOpen};
use crate::message::{DataChannelAck, Message};

// Config is the channel description carried in DATA_CHANNEL_OPEN.
#[derive(Eq, PartialEq, Default, Clone, Debug)]
pub struct Config {
    pub channel_type: ChannelType,
    pub negotiated: bool,
    pub priority: u16,
    pub reliability_parameter: u32,
    pub label: String,
    pub protocol: String,
}

// DataChannel is a WebRTC data channel bound to one SCTP stream, with
// DCEP establishment handled in-band on PPID 50.
#[derive(Debug)]
pub struct DataChannel {
    pub config: Config,
    stream: Arc<Stream>,

    messages_sent: AtomicUsize,
    messages_received: AtomicUsize,
    bytes_sent: AtomicUsize,
    bytes_received: AtomicUsize,
}

impl DataChannel {
    pub(crate) fn new(stream: Arc<Stream>, config: Config) -> Self {
        DataChannel {
            config,
            stream,
            messages_sent: AtomicUsize::new(0),
            messages_received: AtomicUsize::new(0),
            bytes_sent: AtomicUsize::new(0),
            bytes_received: AtomicUsize::new(0),
        }
    }

    // dial opens a stream on the association and sends DATA_CHANNEL_OPEN.
    pub async fn dial(
        association: &Association,
        identifier: u16,
        config: Config,
    ) -> Result<Self> {
        let stream = association
            .open_stream(identifier, PayloadProtocolIdentifier::Binary)
            .await?;

        Self::client(stream, config).await
    }

    // accept waits for a stream and reads the DATA_CHANNEL_OPEN from it.
    pub async fn accept(association: &Association) -> Result<Self> {
        let stream = association
            .accept_stream()
            .await
            .ok_or(Error::ErrClosedDataChannel)?;
        Self::server(stream).await
    }

    // client establishes a channel on an already-open stream.
    pub async fn client(stream: Arc<Stream>, config: Config) -> Result<Self> {
        stream.set_reliability_params(
            config.channel_type.unordered(),
            channel_type_to_reliability(config.channel_type),
            config.reliability_parameter,
        );

        if !config.negotiated {
            let msg = Message::DataChannelOpen(DataChannelOpen {
                channel_type: config.channel_type,
                priority: config.priority,
                reliability_parameter: config.reliability_parameter,
                label: config.label.bytes().collect(),
                protocol: config.protocol.bytes().collect(),
            });
            let mut buf = BytesMut::with_capacity(msg.marshal_size());
            msg.marshal(&mut buf);
            stream
                .write_sctp(&buf.freeze(), PayloadProtocolIdentifier::Dcep)
                .await?;
        }
        Ok(DataChannel::new(stream, config))
    }

    // server reads the open handshake from an accepted stream and acks it.
    pub async fn server(stream: Arc<Stream>) -> Result<Self> {
        let (data, ppi) = stream.read_sctp().await?;
        if ppi != PayloadProtocolIdentifier::Dcep {
            return Err(Error::InvalidPayloadProtocolIdentifier(ppi as u32));
        }

        let mut buf = &data[..];
        let msg = Message::unmarshal(&mut buf)?;
        let Message::DataChannelOpen(open) = msg else {
            return Err(Error::InvalidMessageType(0x02));
        };

        let config = Config {
            channel_type: open.channel_type,
            negotiated: false,
            priority: open.priority,
            reliability_parameter: open.reliability_parameter,
            label: String::from_utf8(open.label).map_err(|_| Error::InvalidLabel)?,
            protocol: String::from_utf8(open.protocol).map_err(|_| Error::InvalidLabel)?,
        };

        stream.set_reliability_params(
            config.channel_type.unordered(),
            channel_type_to_reliability(config.channel_type),
            config.reliability_parameter,
        );

        // DATA_CHANNEL_ACK completes the handshake.
        let mut ack = BytesMut::with_capacity(1);
        Message::DataChannelAck(DataChannelAck {}).marshal(&mut ack);
        stream
            .write_sctp(&ack.freeze(), PayloadProtocolIdentifier::Dcep)
            .await?;

        Ok(DataChannel::new(stream, config))
    }

    // read returns one message, decoding empty-marker PPIDs into empty
    // payloads. DCEP acks are consumed transparently.
    pub async fn read(&self) -> Result<(Bytes, bool)> {
        loop {
            let (data, ppi) = self.stream.read_sctp().await?;
            match ppi {
                PayloadProtocolIdentifier::Dcep => {
                    let mut buf = &data[..];
                    match Message::unmarshal(&mut buf) {
                        Ok(Message::DataChannelAck(_)) => continue,
                        Ok(other) => {
                            debug!("unexpected DCEP message mid-stream: {:?}", other);
                            continue;
                        }
                        Err(err) => return Err(err),
                    }
                }
                PayloadProtocolIdentifier::String => {
                    self.note_received(data.len());
                    return Ok((data, true));
                }
                PayloadProtocolIdentifier::StringEmpty => {
                    self.note_received(0);
                    return Ok((Bytes::new(), true));
                }
                PayloadProtocolIdentifier::Binary => {
                    self.note_received(data.len());
                    return Ok((data, false));
                }
                PayloadProtocolIdentifier::BinaryEmpty => {
                    self.note_received(0);
                    return Ok((Bytes::new(), false));
                }
                other => {
                    return Err(Error::InvalidPayloadProtocolIdentifier(other as u32));
                }
            }
        }
    }

    // write sends a message; empty payloads ride the empty-marker PPIDs
    // because SCTP cannot carry zero-length user data.
    pub async fn write(&self, data: &Bytes, is_string: bool) -> Result<usize> {
        let ppi = match (is_string, data.is_empty()) {
            (false, false) => PayloadProtocolIdentifier::Binary,
            (false, true) => PayloadProtocolIdentifier::BinaryEmpty,
            (true, false) => PayloadProtocolIdentifier::String,
            (true, true) => PayloadProtocolIdentifier::StringEmpty,
        };

        let to_send = if data.is_empty() {
            Bytes::from_static(&[0])
        } else {
            data.clone()
        };

        self.stream.write_sctp(&to_send, ppi).await?;
        self.messages_sent.fetch_add(1, Ordering::SeqCst);
        self.bytes_sent.fetch_add(data.len(), Ordering::SeqCst);
        Ok(data.len())
    }

    fn note_received(&self, n: usize) {
        self.messages_received.fetch_add(1, Ordering::SeqCst);
        self.bytes_received.fetch_add(n, Ordering::SeqCst);
    }

    pub fn stream_identifier(&self) -> u16 {
        self.stream.stream_identifier()
    }

    pub fn buffered_amount(&self) -> usize {
        self.stream.buffered_amount()
    }

    pub fn messages_sent(&self) -> usize {
        self.messages_sent.load(Ordering::SeqCst)
    }

    pub fn messages_received(&self) -> usize {
        self.messages_received.load(Ordering::SeqCst)
    }

    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent.load(Ordering::SeqCst)
    }

    pub fn bytes_received(&self) -> usize {
        self.bytes_received.load(Ordering::SeqCst)
    }

    // close resets the underlying stream without touching the
    // association.
    pub async fn close(&self) -> Result<()> {
        Ok(self.stream.shutdown().await?)
    }
}

fn channel_type_to_reliability(channel_type: ChannelType) -> ReliabilityType {
    match channel_type {
        ChannelType::Reliable | ChannelType::ReliableUnordered => ReliabilityType::Reliable,
        ChannelType::PartialReliableRexmit | ChannelType::PartialReliableRexmitUnordered => {
            ReliabilityType::Rexmit
        }
        ChannelType::PartialReliableTimed | ChannelType::PartialReliableTimedUnordered => {
            ReliabilityType::Timed
        }
    }
}
