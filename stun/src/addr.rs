#[cfg(test)]
mod addr_test;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::attributes::*;
use crate::error::{Error, Result};
use crate::message::*;

pub const FAMILY_IPV4: u16 = 0x01;
pub const FAMILY_IPV6: u16 = 0x02;

pub const IPV4LEN: usize = 4;
pub const IPV6LEN: usize = 16;

// MappedAddress is the MAPPED-ADDRESS attribute (RFC 5389 §15.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for MappedAddress {
    fn default() -> Self {
        MappedAddress {
            ip: IpAddr::V4(Ipv4Addr::from(0)),
            port: 0,
        }
    }
}

impl fmt::Display for MappedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(_) => write!(f, "{}:{}", self.ip, self.port),
            IpAddr::V6(_) => write!(f, "[{}]:{}", self.ip, self.port),
        }
    }
}

impl Setter for MappedAddress {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        self.add_to_as(m, ATTR_MAPPED_ADDRESS)
    }
}

impl Getter for MappedAddress {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.get_from_as(m, ATTR_MAPPED_ADDRESS)
    }
}

impl MappedAddress {
    // add_to_as encodes the address value under attribute type t.
    pub fn add_to_as(&self, m: &mut Message, t: AttrType) -> Result<()> {
        let (family, ip) = match self.ip {
            IpAddr::V4(ipv4) => (FAMILY_IPV4, ipv4.octets().to_vec()),
            IpAddr::V6(ipv6) => (FAMILY_IPV6, ipv6.octets().to_vec()),
        };
        let mut value = Vec::with_capacity(4 + ip.len());
        value.extend_from_slice(&family.to_be_bytes());
        value.extend_from_slice(&self.port.to_be_bytes());
        value.extend_from_slice(&ip);
        m.add(t, &value);
        Ok(())
    }

    pub fn get_from_as(&mut self, m: &Message, t: AttrType) -> Result<()> {
        let v = m.get(t)?;
        if v.len() <= 4 {
            return Err(Error::ErrUnexpectedEof);
        }
        let family = u16::from_be_bytes([v[0], v[1]]);
        self.port = u16::from_be_bytes([v[2], v[3]]);
        match family {
            FAMILY_IPV4 => {
                check_overflow(t, v[4..].len(), IPV4LEN)?;
                let mut ip = [0u8; IPV4LEN];
                ip.copy_from_slice(&v[4..4 + IPV4LEN]);
                self.ip = IpAddr::V4(Ipv4Addr::from(ip));
            }
            FAMILY_IPV6 => {
                check_overflow(t, v[4..].len(), IPV6LEN)?;
                let mut ip = [0u8; IPV6LEN];
                ip.copy_from_slice(&v[4..4 + IPV6LEN]);
                self.ip = IpAddr::V6(Ipv6Addr::from(ip));
            }
            other => return Err(Error::Other(format!("bad address family value {other}"))),
        }
        Ok(())
    }
}

// AlternateServer is the ALTERNATE-SERVER attribute (RFC 5389 §15.11).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlternateServer(pub MappedAddress);

impl Setter for AlternateServer {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        self.0.add_to_as(m, ATTR_ALTERNATE_SERVER)
    }
}

impl Getter for AlternateServer {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.0.get_from_as(m, ATTR_ALTERNATE_SERVER)
    }
}

fn xor_bytes(dst: &mut [u8], a: &[u8], b: &[u8]) -> usize {
    let n = a.len().min(b.len()).min(dst.len());
    for i in 0..n {
        dst[i] = a[i] ^ b[i];
    }
    n
}

// XorMappedAddress is the XOR-MAPPED-ADDRESS attribute (RFC 5389 §15.2).
// The port is XOR-ed with the upper 16 bits of the magic cookie and the
// address with the concatenation of magic cookie and transaction id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorMappedAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for XorMappedAddress {
    fn default() -> Self {
        XorMappedAddress {
            ip: IpAddr::V4(Ipv4Addr::from(0)),
            port: 0,
        }
    }
}

impl fmt::Display for XorMappedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(_) => write!(f, "{}:{}", self.ip, self.port),
            IpAddr::V6(_) => write!(f, "[{}]:{}", self.ip, self.port),
        }
    }
}

impl Setter for XorMappedAddress {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        self.add_to_as(m, ATTR_XORMAPPED_ADDRESS)
    }
}

impl Getter for XorMappedAddress {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.get_from_as(m, ATTR_XORMAPPED_ADDRESS)
    }
}

impl XorMappedAddress {
    pub fn add_to_as(&self, m: &mut Message, t: AttrType) -> Result<()> {
        let (family, ip_len, ip) = match self.ip {
            IpAddr::V4(ipv4) => (FAMILY_IPV4, IPV4LEN, ipv4.octets().to_vec()),
            IpAddr::V6(ipv6) => (FAMILY_IPV6, IPV6LEN, ipv6.octets().to_vec()),
        };

        let mut xor_value = vec![0u8; 4 + TRANSACTION_ID_SIZE];
        xor_value[..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
        xor_value[4..].copy_from_slice(&m.transaction_id.0);

        let mut value = vec![0u8; 4 + ip_len];
        value[0..2].copy_from_slice(&family.to_be_bytes());
        value[2..4].copy_from_slice(&(self.port ^ (MAGIC_COOKIE >> 16) as u16).to_be_bytes());
        xor_bytes(&mut value[4..], &ip, &xor_value);
        m.add(t, &value);
        Ok(())
    }

    pub fn get_from_as(&mut self, m: &Message, t: AttrType) -> Result<()> {
        let v = m.get(t)?;
        if v.len() <= 4 {
            return Err(Error::ErrUnexpectedEof);
        }

        let family = u16::from_be_bytes([v[0], v[1]]);
        if family != FAMILY_IPV4 && family != FAMILY_IPV6 {
            return Err(Error::Other(format!("bad address family value {family}")));
        }

        let mut xor_value = vec![0u8; 4 + TRANSACTION_ID_SIZE];
        xor_value[..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
        xor_value[4..].copy_from_slice(&m.transaction_id.0);

        self.port = u16::from_be_bytes([v[2], v[3]]) ^ (MAGIC_COOKIE >> 16) as u16;
        if family == FAMILY_IPV6 {
            check_overflow(t, v[4..].len(), IPV6LEN)?;
            let mut ip = [0u8; IPV6LEN];
            xor_bytes(&mut ip, &v[4..], &xor_value);
            self.ip = IpAddr::V6(Ipv6Addr::from(ip));
        } else {
            check_overflow(t, v[4..].len(), IPV4LEN)?;
            let mut ip = [0u8; IPV4LEN];
            xor_bytes(&mut ip, &v[4..], &xor_value);
            self.ip = IpAddr::V4(Ipv4Addr::from(ip));
        }
        Ok(())
    }
}
