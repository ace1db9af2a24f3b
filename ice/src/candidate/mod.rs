#[cfg(test)]
mod candidate_test;

pub mod candidate_pair;

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crc::{Crc, CRC_32_ISO_HDLC};

use crate::error::{Error, Result};
use crate::network_type::NetworkType;

pub use candidate_pair::{CandidatePair, CandidatePairState};

// Component ids; with BUNDLE and rtcp-mux everything rides component 1.
pub const COMPONENT_RTP: u16 = 1;
pub const COMPONENT_RTCP: u16 = 2;

// Type preferences per RFC 8445 §5.1.2.1.
const HOST_CANDIDATE_PREFERENCE: u16 = 126;
const SRFLX_CANDIDATE_PREFERENCE: u16 = 100;
const PRFLX_CANDIDATE_PREFERENCE: u16 = 110;
const RELAY_CANDIDATE_PREFERENCE: u16 = 0;

pub const DEFAULT_LOCAL_PREFERENCE: u16 = 65535;

// CandidateType per RFC 8445 §5.1.1.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum CandidateType {
    Host,
    ServerReflexive,
    PeerReflexive,
    Relay,
    Unspecified,
}

impl Default for CandidateType {
    fn default() -> Self {
        CandidateType::Unspecified
    }
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CandidateType::Host => "host",
            CandidateType::ServerReflexive => "srflx",
            CandidateType::PeerReflexive => "prflx",
            CandidateType::Relay => "relay",
            CandidateType::Unspecified => "unspecified",
        };
        write!(f, "{s}")
    }
}

impl CandidateType {
    pub fn preference(&self) -> u16 {
        match self {
            CandidateType::Host => HOST_CANDIDATE_PREFERENCE,
            CandidateType::PeerReflexive => PRFLX_CANDIDATE_PREFERENCE,
            CandidateType::ServerReflexive => SRFLX_CANDIDATE_PREFERENCE,
            CandidateType::Relay | CandidateType::Unspecified => RELAY_CANDIDATE_PREFERENCE,
        }
    }
}

// Candidate is one transport address, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub candidate_type: CandidateType,
    pub network_type: NetworkType,
    // The published address: an IP, or a .local hostname when mDNS
    // concealment is active.
    pub address: String,
    pub port: u16,
    pub component: u16,
    pub priority: u32,
    // Related address: base of srflx/prflx, server-reflexive seen by the
    // TURN server for relay.
    pub related_address: Option<(String, u16)>,
    pub foundation: String,
    // Resolved socket address for sending; None for unresolved mDNS
    // peers.
    pub resolved_addr: Option<SocketAddr>,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}{}",
            self.network_type,
            self.candidate_type,
            self.address,
            self.port,
            self.related_address
                .as_ref()
                .map(|(a, p)| format!(" related {a}:{p}"))
                .unwrap_or_default()
        )
    }
}

impl Candidate {
    pub fn new(
        candidate_type: CandidateType,
        network_type: NetworkType,
        address: String,
        port: u16,
        component: u16,
        related_address: Option<(String, u16)>,
    ) -> Self {
        let mut c = Candidate {
            id: crate::rand::generate_cand_id(),
            candidate_type,
            network_type,
            address: address.clone(),
            port,
            component,
            priority: 0,
            related_address,
            foundation: String::new(),
            resolved_addr: address.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, port)),
        };
        c.priority = c.compute_priority(DEFAULT_LOCAL_PREFERENCE);
        c.foundation = c.compute_foundation();
        c
    }

    // compute_priority per RFC 8445 §5.1.2.1:
    // (2^24)·type pref + (2^8)·local pref + (256 - component).
    pub fn compute_priority(&self, local_preference: u16) -> u32 {
        (1 << 24) * self.candidate_type.preference() as u32
            + (1 << 8) * local_preference as u32
            + (256 - self.component as u32)
    }

    // compute_foundation hashes type, base address and protocol so
    // candidates from one base freeze together (RFC 8445 §5.1.1.3).
    fn compute_foundation(&self) -> String {
        let input = format!(
            "{}{}{}",
            self.candidate_type, self.base_address(), self.network_type
        );
        let checksum = Crc::<u32>::new(&CRC_32_ISO_HDLC).checksum(input.as_bytes());
        checksum.to_string()
    }

    fn base_address(&self) -> String {
        match (&self.candidate_type, &self.related_address) {
            // The base of a reflexive candidate is its related address.
            (CandidateType::ServerReflexive | CandidateType::PeerReflexive, Some((a, _))) => {
                a.clone()
            }
            _ => self.address.clone(),
        }
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.resolved_addr
    }

    // marshal renders the a=candidate attribute value.
    pub fn marshal(&self) -> String {
        let mut out = format!(
            "{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component,
            self.network_type,
            self.priority,
            self.address,
            self.port,
            self.candidate_type
        );
        if let Some((raddr, rport)) = &self.related_address {
            out += &format!(" raddr {raddr} rport {rport}");
        }
        out
    }

    // unmarshal parses an a=candidate attribute value.
    pub fn unmarshal(raw: &str) -> Result<Candidate> {
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.len() < 8 {
            return Err(Error::ErrAttributeTooShortIceCandidate);
        }

        let foundation = fields[0].to_owned();
        let component = fields[1].parse::<u16>().map_err(|_| Error::ErrParseComponent)?;
        let is_tcp = fields[2].eq_ignore_ascii_case("tcp");
        let priority = fields[3].parse::<u32>().map_err(|_| Error::ErrParsePriority)?;
        let address = fields[4].to_owned();
        let port = fields[5].parse::<u16>().map_err(|_| Error::ErrParsePort)?;

        if fields[6] != "typ" {
            return Err(Error::ErrUnknownCandidateType);
        }
        let candidate_type = match fields[7] {
            "host" => CandidateType::Host,
            "srflx" => CandidateType::ServerReflexive,
            "prflx" => CandidateType::PeerReflexive,
            "relay" => CandidateType::Relay,
            _ => return Err(Error::ErrUnknownCandidateType),
        };

        let mut related_address = None;
        let mut i = 8;
        while i + 1 < fields.len() {
            match fields[i] {
                "raddr" => {
                    let addr = fields[i + 1].to_owned();
                    let port = fields
                        .get(i + 3)
                        .and_then(|p| p.parse::<u16>().ok())
                        .unwrap_or(0);
                    related_address = Some((addr, port));
                    i += 4;
                }
                _ => i += 2,
            }
        }

        let ip = address.parse::<IpAddr>().ok();
        let network_type = match ip {
            Some(ip) => NetworkType::from_addr(ip, is_tcp),
            // Unresolved mDNS names are assumed IPv4 UDP until resolved.
            None => NetworkType::Udp4,
        };

        Ok(Candidate {
            id: crate::rand::generate_cand_id(),
            candidate_type,
            network_type,
            address,
            port,
            component,
            priority,
            related_address,
            foundation,
            resolved_addr: ip.map(|ip| SocketAddr::new(ip, port)),
        })
    }
}
