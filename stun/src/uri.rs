#[cfg(test)]
mod uri_test;

use std::fmt;

use crate::error::{Error, Result};

// SchemeType is the type of a STUN or TURN server URI scheme.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum SchemeType {
    Stun,
    Stuns,
    Turn,
    Turns,
    Unknown,
}

impl Default for SchemeType {
    fn default() -> Self {
        SchemeType::Unknown
    }
}

impl From<&str> for SchemeType {
    fn from(raw: &str) -> Self {
        match raw {
            "stun" => SchemeType::Stun,
            "stuns" => SchemeType::Stuns,
            "turn" => SchemeType::Turn,
            "turns" => SchemeType::Turns,
            _ => SchemeType::Unknown,
        }
    }
}

impl fmt::Display for SchemeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            SchemeType::Stun => "stun",
            SchemeType::Stuns => "stuns",
            SchemeType::Turn => "turn",
            SchemeType::Turns => "turns",
            SchemeType::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

// ProtoType is the transport protocol of a TURN server.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum ProtoType {
    Udp,
    Tcp,
}

impl Default for ProtoType {
    fn default() -> Self {
        ProtoType::Udp
    }
}

impl fmt::Display for ProtoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ProtoType::Udp => write!(f, "udp"),
            ProtoType::Tcp => write!(f, "tcp"),
        }
    }
}

// Uri is a parsed STUN or TURN URI per RFC 7064 / RFC 7065.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Uri {
    pub scheme: SchemeType,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub proto: ProtoType,
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host = if self.host.contains("::") {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        match self.scheme {
            SchemeType::Turn | SchemeType::Turns => write!(
                f,
                "{}:{}:{}?transport={}",
                self.scheme, host, self.port, self.proto
            ),
            _ => write!(f, "{}:{}:{}", self.scheme, host, self.port),
        }
    }
}

impl Uri {
    // parse_uri parses a STUN or TURN server URI, e.g.
    // "stun:stun.l.google.com:19302" or "turn:turn.example.org?transport=tcp".
    pub fn parse_uri(raw: &str) -> Result<Uri> {
        // work around url crate not parsing stun: as authority
        let (scheme, rest) = raw
            .split_once(':')
            .ok_or(Error::ErrInvalidUrl)?;
        let scheme = SchemeType::from(scheme);
        if scheme == SchemeType::Unknown {
            return Err(Error::ErrSchemeType);
        }

        let (rest, query) = match rest.split_once('?') {
            Some((r, q)) => (r, Some(q)),
            None => (rest, None),
        };

        let is_secure = scheme == SchemeType::Stuns || scheme == SchemeType::Turns;
        let default_port = if is_secure { 5349 } else { 3478 };
        let (host, port) = parse_host_port(rest, default_port)?;

        let proto = match query {
            Some(q) => {
                if scheme == SchemeType::Stun || scheme == SchemeType::Stuns {
                    return Err(Error::ErrStunQuery);
                }
                match q.strip_prefix("transport=") {
                    Some("udp") => ProtoType::Udp,
                    Some("tcp") => ProtoType::Tcp,
                    _ => return Err(Error::ErrProtoType),
                }
            }
            None => {
                if is_secure {
                    ProtoType::Tcp
                } else {
                    ProtoType::Udp
                }
            }
        };

        Ok(Uri {
            scheme,
            host,
            port,
            username: String::new(),
            password: String::new(),
            proto,
        })
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == SchemeType::Stuns || self.scheme == SchemeType::Turns
    }
}

fn parse_host_port(s: &str, default_port: u16) -> Result<(String, u16)> {
    if s.is_empty() {
        return Err(Error::ErrHost);
    }
    if let Some(rest) = s.strip_prefix('[') {
        // bracketed IPv6 literal
        let (host, rest) = rest.split_once(']').ok_or(Error::ErrHost)?;
        let port = match rest.strip_prefix(':') {
            Some(p) => p.parse::<u16>().map_err(|_| Error::ErrPort)?,
            None => default_port,
        };
        return Ok((host.to_owned(), port));
    }
    match s.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            if host.is_empty() {
                return Err(Error::ErrHost);
            }
            Ok((host.to_owned(), port.parse::<u16>().map_err(|_| Error::ErrPort)?))
        }
        _ => Ok((s.to_owned(), default_port)),
    }
}
