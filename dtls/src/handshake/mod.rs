#[cfg(test)]
mod handshake_test;

use rand::Rng;

use crate::cipher_suite::CipherSuiteId;
use crate::error::{Error, Result};
use crate::extension::{marshal_extensions, unmarshal_extensions, Extension};
use crate::record_layer::{ProtocolVersion, PROTOCOL_VERSION1_2};

pub const HANDSHAKE_HEADER_LENGTH: usize = 12;
pub const RANDOM_LENGTH: usize = 32;
pub const COOKIE_LENGTH: usize = 20;
pub const VERIFY_DATA_LENGTH: usize = 12;

// HandshakeType per RFC 5246 §7.4 with the DTLS HelloVerifyRequest.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    HelloVerifyRequest = 3,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
    Invalid = 255,
}

impl From<u8> for HandshakeType {
    fn from(v: u8) -> Self {
        match v {
            0 => HandshakeType::HelloRequest,
            1 => HandshakeType::ClientHello,
            2 => HandshakeType::ServerHello,
            3 => HandshakeType::HelloVerifyRequest,
            11 => HandshakeType::Certificate,
            12 => HandshakeType::ServerKeyExchange,
            13 => HandshakeType::CertificateRequest,
            14 => HandshakeType::ServerHelloDone,
            15 => HandshakeType::CertificateVerify,
            16 => HandshakeType::ClientKeyExchange,
            20 => HandshakeType::Finished,
            _ => HandshakeType::Invalid,
        }
    }
}

// HandshakeHeader is the 12-byte DTLS handshake prefix carrying the
// fragmentation fields (RFC 6347 §4.2.2).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HandshakeHeader {
    pub handshake_type: HandshakeType,
    pub length: u32,
    pub message_sequence: u16,
    pub fragment_offset: u32,
    pub fragment_length: u32,
}

impl HandshakeHeader {
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HANDSHAKE_HEADER_LENGTH);
        out.push(self.handshake_type as u8);
        out.extend_from_slice(&self.length.to_be_bytes()[1..4]);
        out.extend_from_slice(&self.message_sequence.to_be_bytes());
        out.extend_from_slice(&self.fragment_offset.to_be_bytes()[1..4]);
        out.extend_from_slice(&self.fragment_length.to_be_bytes()[1..4]);
        out
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.len() < HANDSHAKE_HEADER_LENGTH {
            return Err(Error::ErrBufferTooSmall);
        }
        Ok(HandshakeHeader {
            handshake_type: HandshakeType::from(raw[0]),
            length: u32::from_be_bytes([0, raw[1], raw[2], raw[3]]),
            message_sequence: u16::from_be_bytes([raw[4], raw[5]]),
            fragment_offset: u32::from_be_bytes([0, raw[6], raw[7], raw[8]]),
            fragment_length: u32::from_be_bytes([0, raw[9], raw[10], raw[11]]),
        })
    }
}

// HandshakeRandom: 4 bytes of time plus 28 random bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HandshakeRandom(pub [u8; RANDOM_LENGTH]);

impl Default for HandshakeRandom {
    fn default() -> Self {
        HandshakeRandom([0u8; RANDOM_LENGTH])
    }
}

impl HandshakeRandom {
    pub fn generate() -> Self {
        let mut bytes = [0u8; RANDOM_LENGTH];
        let now = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        bytes[..4].copy_from_slice(&now.to_be_bytes());
        rand::thread_rng().fill(&mut bytes[4..]);
        HandshakeRandom(bytes)
    }
}

// HandshakeMessage is the decoded body of one handshake message.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeMessage {
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    HelloVerifyRequest(HelloVerifyRequest),
    Certificate(CertificateMsg),
    ServerKeyExchange(ServerKeyExchange),
    CertificateRequest(CertificateRequest),
    ServerHelloDone,
    CertificateVerify(CertificateVerify),
    ClientKeyExchange(ClientKeyExchange),
    Finished(Finished),
}

impl HandshakeMessage {
    pub fn handshake_type(&self) -> HandshakeType {
        match self {
            HandshakeMessage::ClientHello(_) => HandshakeType::ClientHello,
            HandshakeMessage::ServerHello(_) => HandshakeType::ServerHello,
            HandshakeMessage::HelloVerifyRequest(_) => HandshakeType::HelloVerifyRequest,
            HandshakeMessage::Certificate(_) => HandshakeType::Certificate,
            HandshakeMessage::ServerKeyExchange(_) => HandshakeType::ServerKeyExchange,
            HandshakeMessage::CertificateRequest(_) => HandshakeType::CertificateRequest,
            HandshakeMessage::ServerHelloDone => HandshakeType::ServerHelloDone,
            HandshakeMessage::CertificateVerify(_) => HandshakeType::CertificateVerify,
            HandshakeMessage::ClientKeyExchange(_) => HandshakeType::ClientKeyExchange,
            HandshakeMessage::Finished(_) => HandshakeType::Finished,
        }
    }

    pub fn marshal_body(&self) -> Vec<u8> {
        match self {
            HandshakeMessage::ClientHello(m) => m.marshal(),
            HandshakeMessage::ServerHello(m) => m.marshal(),
            HandshakeMessage::HelloVerifyRequest(m) => m.marshal(),
            HandshakeMessage::Certificate(m) => m.marshal(),
            HandshakeMessage::ServerKeyExchange(m) => m.marshal(),
            HandshakeMessage::CertificateRequest(m) => m.marshal(),
            HandshakeMessage::ServerHelloDone => vec![],
            HandshakeMessage::CertificateVerify(m) => m.marshal(),
            HandshakeMessage::ClientKeyExchange(m) => m.marshal(),
            HandshakeMessage::Finished(m) => m.marshal(),
        }
    }

    pub fn unmarshal_body(typ: HandshakeType, raw: &[u8]) -> Result<Self> {
        Ok(match typ {
            HandshakeType::ClientHello => {
                HandshakeMessage::ClientHello(ClientHello::unmarshal(raw)?)
            }
            HandshakeType::ServerHello => {
                HandshakeMessage::ServerHello(ServerHello::unmarshal(raw)?)
            }
            HandshakeType::HelloVerifyRequest => {
                HandshakeMessage::HelloVerifyRequest(HelloVerifyRequest::unmarshal(raw)?)
            }
            HandshakeType::Certificate => {
                HandshakeMessage::Certificate(CertificateMsg::unmarshal(raw)?)
            }
            HandshakeType::ServerKeyExchange => {
                HandshakeMessage::ServerKeyExchange(ServerKeyExchange::unmarshal(raw)?)
            }
            HandshakeType::CertificateRequest => {
                HandshakeMessage::CertificateRequest(CertificateRequest::unmarshal(raw)?)
            }
            HandshakeType::ServerHelloDone => HandshakeMessage::ServerHelloDone,
            HandshakeType::CertificateVerify => {
                HandshakeMessage::CertificateVerify(CertificateVerify::unmarshal(raw)?)
            }
            HandshakeType::ClientKeyExchange => {
                HandshakeMessage::ClientKeyExchange(ClientKeyExchange::unmarshal(raw)?)
            }
            HandshakeType::Finished => HandshakeMessage::Finished(Finished::unmarshal(raw)?),
            _ => return Err(Error::ErrInvalidHandshakeType),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientHello {
    pub version: ProtocolVersion,
    pub random: HandshakeRandom,
    pub session_id: Vec<u8>,
    pub cookie: Vec<u8>,
    pub cipher_suites: Vec<CipherSuiteId>,
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = vec![self.version.major, self.version.minor];
        out.extend_from_slice(&self.random.0);
        out.push(self.session_id.len() as u8);
        out.extend_from_slice(&self.session_id);
        out.push(self.cookie.len() as u8);
        out.extend_from_slice(&self.cookie);
        out.extend_from_slice(&((self.cipher_suites.len() * 2) as u16).to_be_bytes());
        for cs in &self.cipher_suites {
            out.extend_from_slice(&(*cs as u16).to_be_bytes());
        }
        // Single null compression method.
        out.push(1);
        out.push(0);
        out.extend_from_slice(&marshal_extensions(&self.extensions));
        out
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        let mut o = 0usize;
        let need = |o: usize, n: usize| {
            if o + n > raw.len() {
                Err(Error::ErrBufferTooSmall)
            } else {
                Ok(())
            }
        };

        need(o, 2 + RANDOM_LENGTH + 1)?;
        let version = ProtocolVersion {
            major: raw[0],
            minor: raw[1],
        };
        o += 2;
        let mut random = [0u8; RANDOM_LENGTH];
        random.copy_from_slice(&raw[o..o + RANDOM_LENGTH]);
        o += RANDOM_LENGTH;

        let sid_len = raw[o] as usize;
        o += 1;
        need(o, sid_len + 1)?;
        let session_id = raw[o..o + sid_len].to_vec();
        o += sid_len;

        let cookie_len = raw[o] as usize;
        o += 1;
        need(o, cookie_len + 2)?;
        let cookie = raw[o..o + cookie_len].to_vec();
        o += cookie_len;

        let cs_len = u16::from_be_bytes([raw[o], raw[o + 1]]) as usize;
        o += 2;
        need(o, cs_len + 1)?;
        let mut cipher_suites = vec![];
        for chunk in raw[o..o + cs_len].chunks_exact(2) {
            cipher_suites.push(CipherSuiteId::from(u16::from_be_bytes([
                chunk[0], chunk[1],
            ])));
        }
        o += cs_len;

        let compression_len = raw[o] as usize;
        o += 1 + compression_len;
        need(o, 0)?;

        let extensions = if o < raw.len() {
            unmarshal_extensions(&raw[o..])?
        } else {
            vec![]
        };

        Ok(ClientHello {
            version,
            random: HandshakeRandom(random),
            session_id,
            cookie,
            cipher_suites,
            extensions,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerHello {
    pub version: ProtocolVersion,
    pub random: HandshakeRandom,
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuiteId,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = vec![self.version.major, self.version.minor];
        out.extend_from_slice(&self.random.0);
        out.push(self.session_id.len() as u8);
        out.extend_from_slice(&self.session_id);
        out.extend_from_slice(&(self.cipher_suite as u16).to_be_bytes());
        out.push(0); // null compression
        out.extend_from_slice(&marshal_extensions(&self.extensions));
        out
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.len() < 2 + RANDOM_LENGTH + 1 {
            return Err(Error::ErrBufferTooSmall);
        }
        let version = ProtocolVersion {
            major: raw[0],
            minor: raw[1],
        };
        let mut o = 2;
        let mut random = [0u8; RANDOM_LENGTH];
        random.copy_from_slice(&raw[o..o + RANDOM_LENGTH]);
        o += RANDOM_LENGTH;

        let sid_len = raw[o] as usize;
        o += 1;
        if raw.len() < o + sid_len + 3 {
            return Err(Error::ErrBufferTooSmall);
        }
        let session_id = raw[o..o + sid_len].to_vec();
        o += sid_len;

        let cipher_suite = CipherSuiteId::from(u16::from_be_bytes([raw[o], raw[o + 1]]));
        o += 2;
        o += 1; // compression method

        let extensions = if o < raw.len() {
            unmarshal_extensions(&raw[o..])?
        } else {
            vec![]
        };

        Ok(ServerHello {
            version,
            random: HandshakeRandom(random),
            session_id,
            cipher_suite,
            extensions,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub version: ProtocolVersion,
    pub cookie: Vec<u8>,
}

impl HelloVerifyRequest {
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = vec![self.version.major, self.version.minor, self.cookie.len() as u8];
        out.extend_from_slice(&self.cookie);
        out
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.len() < 3 {
            return Err(Error::ErrBufferTooSmall);
        }
        let cookie_len = raw[2] as usize;
        if raw.len() < 3 + cookie_len {
            return Err(Error::ErrBufferTooSmall);
        }
        Ok(HelloVerifyRequest {
            version: ProtocolVersion {
                major: raw[0],
                minor: raw[1],
            },
            cookie: raw[3..3 + cookie_len].to_vec(),
        })
    }
}

// CertificateMsg carries the DER certificate chain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CertificateMsg {
    pub certificate: Vec<Vec<u8>>,
}

impl CertificateMsg {
    pub fn marshal(&self) -> Vec<u8> {
        let mut certs = vec![];
        for cert in &self.certificate {
            certs.extend_from_slice(&(cert.len() as u32).to_be_bytes()[1..4]);
            certs.extend_from_slice(cert);
        }
        let mut out = vec![];
        out.extend_from_slice(&(certs.len() as u32).to_be_bytes()[1..4]);
        out.extend_from_slice(&certs);
        out
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.len() < 3 {
            return Err(Error::ErrBufferTooSmall);
        }
        let total = u32::from_be_bytes([0, raw[0], raw[1], raw[2]]) as usize;
        if raw.len() < 3 + total {
            return Err(Error::ErrBufferTooSmall);
        }
        let mut certificate = vec![];
        let mut o = 3;
        while o + 3 <= 3 + total {
            let len = u32::from_be_bytes([0, raw[o], raw[o + 1], raw[o + 2]]) as usize;
            o += 3;
            if o + len > raw.len() {
                return Err(Error::ErrBufferTooSmall);
            }
            certificate.push(raw[o..o + len].to_vec());
            o += len;
        }
        Ok(CertificateMsg { certificate })
    }
}

pub const ELLIPTIC_CURVE_TYPE_NAMED_CURVE: u8 = 3;

// ServerKeyExchange carries the ECDHE params and their signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyExchange {
    pub named_curve: u16,
    pub public_key: Vec<u8>,
    pub signature_scheme: u16,
    pub signature: Vec<u8>,
}

impl ServerKeyExchange {
    // params_bytes is the signed portion: curve type, curve and pubkey.
    pub fn params_bytes(&self) -> Vec<u8> {
        let mut out = vec![ELLIPTIC_CURVE_TYPE_NAMED_CURVE];
        out.extend_from_slice(&self.named_curve.to_be_bytes());
        out.push(self.public_key.len() as u8);
        out.extend_from_slice(&self.public_key);
        out
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut out = self.params_bytes();
        out.extend_from_slice(&self.signature_scheme.to_be_bytes());
        out.extend_from_slice(&(self.signature.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.signature);
        out
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.len() < 4 {
            return Err(Error::ErrBufferTooSmall);
        }
        if raw[0] != ELLIPTIC_CURVE_TYPE_NAMED_CURVE {
            return Err(Error::ErrInvalidHandshakeType);
        }
        let named_curve = u16::from_be_bytes([raw[1], raw[2]]);
        let pk_len = raw[3] as usize;
        let mut o = 4;
        if raw.len() < o + pk_len + 4 {
            return Err(Error::ErrBufferTooSmall);
        }
        let public_key = raw[o..o + pk_len].to_vec();
        o += pk_len;
        let signature_scheme = u16::from_be_bytes([raw[o], raw[o + 1]]);
        o += 2;
        let sig_len = u16::from_be_bytes([raw[o], raw[o + 1]]) as usize;
        o += 2;
        if raw.len() < o + sig_len {
            return Err(Error::ErrBufferTooSmall);
        }
        Ok(ServerKeyExchange {
            named_curve,
            public_key,
            signature_scheme,
            signature: raw[o..o + sig_len].to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CertificateRequest {
    pub certificate_types: Vec<u8>,
    pub signature_schemes: Vec<u16>,
}

impl CertificateRequest {
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = vec![self.certificate_types.len() as u8];
        out.extend_from_slice(&self.certificate_types);
        out.extend_from_slice(&((self.signature_schemes.len() * 2) as u16).to_be_bytes());
        for s in &self.signature_schemes {
            out.extend_from_slice(&s.to_be_bytes());
        }
        // Zero distinguished names.
        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::ErrBufferTooSmall);
        }
        let ct_len = raw[0] as usize;
        let mut o = 1;
        if raw.len() < o + ct_len + 2 {
            return Err(Error::ErrBufferTooSmall);
        }
        let certificate_types = raw[o..o + ct_len].to_vec();
        o += ct_len;
        let ss_len = u16::from_be_bytes([raw[o], raw[o + 1]]) as usize;
        o += 2;
        if raw.len() < o + ss_len {
            return Err(Error::ErrBufferTooSmall);
        }
        let mut signature_schemes = vec![];
        for chunk in raw[o..o + ss_len].chunks_exact(2) {
            signature_schemes.push(u16::from_be_bytes([chunk[0], chunk[1]]));
        }
        Ok(CertificateRequest {
            certificate_types,
            signature_schemes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    pub signature_scheme: u16,
    pub signature: Vec<u8>,
}

impl CertificateVerify {
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = vec![];
        out.extend_from_slice(&self.signature_scheme.to_be_bytes());
        out.extend_from_slice(&(self.signature.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.signature);
        out
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.len() < 4 {
            return Err(Error::ErrBufferTooSmall);
        }
        let signature_scheme = u16::from_be_bytes([raw[0], raw[1]]);
        let sig_len = u16::from_be_bytes([raw[2], raw[3]]) as usize;
        if raw.len() < 4 + sig_len {
            return Err(Error::ErrBufferTooSmall);
        }
        Ok(CertificateVerify {
            signature_scheme,
            signature: raw[4..4 + sig_len].to_vec(),
        })
    }
}

// ClientKeyExchange carries the client's ephemeral public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKeyExchange {
    pub public_key: Vec<u8>,
}

impl ClientKeyExchange {
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = vec![self.public_key.len() as u8];
        out.extend_from_slice(&self.public_key);
        out
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::ErrBufferTooSmall);
        }
        let len = raw[0] as usize;
        if raw.len() < 1 + len {
            return Err(Error::ErrBufferTooSmall);
        }
        Ok(ClientKeyExchange {
            public_key: raw[1..1 + len].to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: Vec<u8>,
}

impl Finished {
    pub fn marshal(&self) -> Vec<u8> {
        self.verify_data.clone()
    }

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        Ok(Finished {
            verify_data: raw.to_vec(),
        })
    }
}

// default_client_hello_version is fixed to DTLS 1.2.
pub fn client_hello_version() -> ProtocolVersion {
    PROTOCOL_VERSION1_2
}
