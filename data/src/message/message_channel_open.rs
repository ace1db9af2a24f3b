use bytes::{Buf, BufMut};

use crate::error::{Error, Result};

// ChannelType maps to SCTP reliability modes (RFC 8832 §5.1).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ChannelType {
    #[default]
    Reliable = 0x00,
    ReliableUnordered = 0x80,
    PartialReliableRexmit = 0x01,
    PartialReliableRexmitUnordered = 0x81,
    PartialReliableTimed = 0x02,
    PartialReliableTimedUnordered = 0x82,
}

impl ChannelType {
    pub fn unordered(&self) -> bool {
        (*self as u8) & 0x80 != 0
    }
}

impl TryFrom<u8> for ChannelType {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0x00 => Ok(ChannelType::Reliable),
            0x80 => Ok(ChannelType::ReliableUnordered),
            0x01 => Ok(ChannelType::PartialReliableRexmit),
            0x81 => Ok(ChannelType::PartialReliableRexmitUnordered),
            0x02 => Ok(ChannelType::PartialReliableTimed),
            0x82 => Ok(ChannelType::PartialReliableTimedUnordered),
            other => Err(Error::InvalidChannelType(other)),
        }
    }
}

pub const CHANNEL_PRIORITY_BELOW_NORMAL: u16 = 128;
pub const CHANNEL_PRIORITY_NORMAL: u16 = 256;
pub const CHANNEL_PRIORITY_HIGH: u16 = 512;
pub const CHANNEL_PRIORITY_EXTRA_HIGH: u16 = 1024;

// DataChannelOpen is the DATA_CHANNEL_OPEN message body (RFC 8832 §5.1).
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |  Message Type |  Channel Type |            Priority           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    Reliability Parameter                      |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |         Label Length          |       Protocol Length         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |  Label ... | Protocol ...
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataChannelOpen {
    pub channel_type: ChannelType,
    pub priority: u16,
    pub reliability_parameter: u32,
    pub label: Vec<u8>,
    pub protocol: Vec<u8>,
}

impl DataChannelOpen {
    pub fn marshal_size(&self) -> usize {
        11 + self.label.len() + self.protocol.len()
    }

    pub fn marshal<B>(&self, buf: &mut B)
    where
        B: BufMut,
    {
        buf.put_u8(self.channel_type as u8);
        buf.put_u16(self.priority);
        buf.put_u32(self.reliability_parameter);
        buf.put_u16(self.label.len() as u16);
        buf.put_u16(self.protocol.len() as u16);
        buf.put_slice(&self.label);
        buf.put_slice(&self.protocol);
    }

    pub fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        B: Buf,
    {
        if buf.remaining() < 11 {
            return Err(Error::UnexpectedEndOfBuffer);
        }
        let channel_type = ChannelType::try_from(buf.get_u8())?;
        let priority = buf.get_u16();
        let reliability_parameter = buf.get_u32();
        let label_len = buf.get_u16() as usize;
        let protocol_len = buf.get_u16() as usize;

        if buf.remaining() < label_len + protocol_len {
            return Err(Error::UnexpectedEndOfBuffer);
        }
        let mut label = vec![0u8; label_len];
        buf.copy_to_slice(&mut label);
        let mut protocol = vec![0u8; protocol_len];
        buf.copy_to_slice(&mut protocol);

        Ok(DataChannelOpen {
            channel_type,
            priority,
            reliability_parameter,
            label,
            protocol,
        })
    }
}
