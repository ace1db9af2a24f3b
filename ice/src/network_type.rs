use std::fmt;
use std::net::IpAddr;

// NetworkType is the transport plus IP family of a candidate. Only UDP
// is gathered natively; TCP shows up via relayed transports.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum NetworkType {
    Udp4,
    Udp6,
    Tcp4,
    Tcp6,
}

impl Default for NetworkType {
    fn default() -> Self {
        NetworkType::Udp4
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkType::Udp4 | NetworkType::Udp6 => "udp",
            NetworkType::Tcp4 | NetworkType::Tcp6 => "tcp",
        };
        write!(f, "{s}")
    }
}

impl NetworkType {
    pub fn from_addr(ip: IpAddr, is_tcp: bool) -> Self {
        match (ip.is_ipv4(), is_tcp) {
            (true, false) => NetworkType::Udp4,
            (false, false) => NetworkType::Udp6,
            (true, true) => NetworkType::Tcp4,
            (false, true) => NetworkType::Tcp6,
        }
    }

    pub fn is_ipv4(&self) -> bool {
        matches!(self, NetworkType::Udp4 | NetworkType::Tcp4)
    }

    pub fn is_tcp(&self) -> bool {
        matches!(self, NetworkType::Tcp4 | NetworkType::Tcp6)
    }

    // same_family pairs only candidates of one IP family (RFC 8445 §6.1.2.2).
    pub fn same_family(&self, other: &NetworkType) -> bool {
        self.is_ipv4() == other.is_ipv4()
    }
}
