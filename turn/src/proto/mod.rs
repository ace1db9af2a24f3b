#[cfg(test)]
mod proto_test;

use std::fmt;

use stun::attributes::*;
use stun::error::Result as StunResult;
use stun::message::*;

// Channel numbers live in 0x4000..=0x7FFE (RFC 5766 §11).
pub const MIN_CHANNEL_NUMBER: u16 = 0x4000;
pub const MAX_CHANNEL_NUMBER: u16 = 0x7FFE;

pub const CHANNEL_DATA_HEADER_SIZE: usize = 4;

// Transport protocol numbers for REQUESTED-TRANSPORT.
pub const PROTO_UDP: u8 = 17;
pub const PROTO_TCP: u8 = 6;

// is_channel_data recognizes the ChannelData framing by its first byte
// (0x40..=0x7F per RFC 5766 §11).
pub fn is_channel_data(b: &[u8]) -> bool {
    !b.is_empty() && (0x40..=0x7F).contains(&b[0])
}

// ChannelNumber is the CHANNEL-NUMBER attribute.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ChannelNumber(pub u16);

impl fmt::Display for ChannelNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl Setter for ChannelNumber {
    fn add_to(&self, m: &mut Message) -> StunResult<()> {
        let mut v = [0u8; 4];
        v[..2].copy_from_slice(&self.0.to_be_bytes());
        // Bytes 2-3 are RFFU, zero.
        m.add(ATTR_CHANNEL_NUMBER, &v);
        Ok(())
    }
}

impl Getter for ChannelNumber {
    fn get_from(&mut self, m: &Message) -> StunResult<()> {
        let v = m.get(ATTR_CHANNEL_NUMBER)?;
        if v.len() < 2 {
            return Err(stun::error::Error::ErrUnexpectedEof);
        }
        self.0 = u16::from_be_bytes([v[0], v[1]]);
        Ok(())
    }
}

impl ChannelNumber {
    pub fn valid(&self) -> bool {
        (MIN_CHANNEL_NUMBER..=MAX_CHANNEL_NUMBER).contains(&self.0)
    }
}

// Lifetime is the LIFETIME attribute, seconds of allocation life.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Lifetime(pub std::time::Duration);

impl Setter for Lifetime {
    fn add_to(&self, m: &mut Message) -> StunResult<()> {
        m.add(ATTR_LIFETIME, &(self.0.as_secs() as u32).to_be_bytes());
        Ok(())
    }
}

impl Getter for Lifetime {
    fn get_from(&mut self, m: &Message) -> StunResult<()> {
        let v = m.get(ATTR_LIFETIME)?;
        if v.len() != 4 {
            return Err(stun::error::Error::ErrAttributeSizeInvalid);
        }
        let secs = u32::from_be_bytes([v[0], v[1], v[2], v[3]]);
        self.0 = std::time::Duration::from_secs(secs as u64);
        Ok(())
    }
}

// RequestedTransport is the REQUESTED-TRANSPORT attribute.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestedTransport(pub u8);

impl Default for RequestedTransport {
    fn default() -> Self {
        RequestedTransport(PROTO_UDP)
    }
}

impl Setter for RequestedTransport {
    fn add_to(&self, m: &mut Message) -> StunResult<()> {
        m.add(ATTR_REQUESTED_TRANSPORT, &[self.0, 0, 0, 0]);
        Ok(())
    }
}

impl Getter for RequestedTransport {
    fn get_from(&mut self, m: &Message) -> StunResult<()> {
        let v = m.get(ATTR_REQUESTED_TRANSPORT)?;
        if v.is_empty() {
            return Err(stun::error::Error::ErrUnexpectedEof);
        }
        self.0 = v[0];
        Ok(())
    }
}

// Data is the DATA attribute of Send/Data indications.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Data(pub Vec<u8>);

impl Setter for Data {
    fn add_to(&self, m: &mut Message) -> StunResult<()> {
        m.add(ATTR_DATA, &self.0);
        Ok(())
    }
}

impl Getter for Data {
    fn get_from(&mut self, m: &Message) -> StunResult<()> {
        self.0 = m.get(ATTR_DATA)?;
        Ok(())
    }
}

// PeerAddress is XOR-PEER-ADDRESS, the remote peer of a relay exchange.
pub type PeerAddress = XorPeerAddress;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorPeerAddress(pub stun::addr::XorMappedAddress);

impl Default for XorPeerAddress {
    fn default() -> Self {
        XorPeerAddress(stun::addr::XorMappedAddress::default())
    }
}

impl Setter for XorPeerAddress {
    fn add_to(&self, m: &mut Message) -> StunResult<()> {
        self.0.add_to_as(m, ATTR_XOR_PEER_ADDRESS)
    }
}

impl Getter for XorPeerAddress {
    fn get_from(&mut self, m: &Message) -> StunResult<()> {
        self.0.get_from_as(m, ATTR_XOR_PEER_ADDRESS)
    }
}

// RelayedAddress is XOR-RELAYED-ADDRESS, the allocation on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorRelayedAddress(pub stun::addr::XorMappedAddress);

impl Default for XorRelayedAddress {
    fn default() -> Self {
        XorRelayedAddress(stun::addr::XorMappedAddress::default())
    }
}

impl Setter for XorRelayedAddress {
    fn add_to(&self, m: &mut Message) -> StunResult<()> {
        self.0.add_to_as(m, ATTR_XOR_RELAYED_ADDRESS)
    }
}

impl Getter for XorRelayedAddress {
    fn get_from(&mut self, m: &Message) -> StunResult<()> {
        self.0.get_from_as(m, ATTR_XOR_RELAYED_ADDRESS)
    }
}

// ChannelData is the compact relay framing: 4-byte header, then the
// application data.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChannelData {
    pub number: ChannelNumber,
    pub data: Vec<u8>,
}

impl ChannelData {
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CHANNEL_DATA_HEADER_SIZE + self.data.len());
        out.extend_from_slice(&self.number.0.to_be_bytes());
        out.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    pub fn unmarshal(raw: &[u8]) -> crate::error::Result<Self> {
        if raw.len() < CHANNEL_DATA_HEADER_SIZE {
            return Err(crate::error::Error::ErrShortChannelData);
        }
        let number = ChannelNumber(u16::from_be_bytes([raw[0], raw[1]]));
        if !number.valid() {
            return Err(crate::error::Error::ErrInvalidChannelNumber);
        }
        let length = u16::from_be_bytes([raw[2], raw[3]]) as usize;
        if raw.len() < CHANNEL_DATA_HEADER_SIZE + length {
            return Err(crate::error::Error::ErrShortChannelData);
        }
        Ok(ChannelData {
            number,
            data: raw[CHANNEL_DATA_HEADER_SIZE..CHANNEL_DATA_HEADER_SIZE + length].to_vec(),
        })
    }
}
