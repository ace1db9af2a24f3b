#[cfg(test)]
mod message_test;

pub mod message_channel_ack;
pub mod message_channel_open;

use bytes::{Buf, BufMut};

use crate::error::{Error, Result};
pub use message_channel_ack::DataChannelAck;
pub use message_channel_open::DataChannelOpen;

// Message type bytes of the Data Channel Establishment Protocol
// (RFC 8832 §8.2.1).
pub const MESSAGE_TYPE_ACK: u8 = 0x02;
pub const MESSAGE_TYPE_OPEN: u8 = 0x03;

// Message is a DCEP message: either a DATA_CHANNEL_OPEN or its ACK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    DataChannelAck(DataChannelAck),
    DataChannelOpen(DataChannelOpen),
}

impl Message {
    pub fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        B: Buf,
    {
        if buf.remaining() < 1 {
            return Err(Error::UnexpectedEndOfBuffer);
        }
        match buf.get_u8() {
            MESSAGE_TYPE_ACK => Ok(Message::DataChannelAck(DataChannelAck {})),
            MESSAGE_TYPE_OPEN => Ok(Message::DataChannelOpen(DataChannelOpen::unmarshal(buf)?)),
            other => Err(Error::InvalidMessageType(other)),
        }
    }

    pub fn marshal_size(&self) -> usize {
        match self {
            Message::DataChannelAck(_) => 1,
            Message::DataChannelOpen(open) => 1 + open.marshal_size(),
        }
    }

    pub fn marshal<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        match self {
            Message::DataChannelAck(_) => buf.put_u8(MESSAGE_TYPE_ACK),
            Message::DataChannelOpen(open) => {
                buf.put_u8(MESSAGE_TYPE_OPEN);
                open.marshal(buf);
            }
        }
    }
}
