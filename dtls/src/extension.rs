#[cfg(test)]
mod extension_test {
    use super::*;

    #[test]
    fn test_extensions_roundtrip() {
        let extensions = vec![
            Extension::SupportedGroups(vec![NAMED_CURVE_X25519, NAMED_CURVE_P256]),
            Extension::EcPointFormats(vec![0]),
            Extension::SignatureAlgorithms(vec![
                SIGNATURE_SCHEME_ECDSA_SECP256R1_SHA256,
                SIGNATURE_SCHEME_RSA_PKCS1_SHA256,
            ]),
            Extension::UseSrtp {
                protection_profiles: vec![0x0007, 0x0001],
                mki: vec![],
            },
            Extension::ExtendedMasterSecret,
            Extension::RenegotiationInfo(vec![]),
        ];
        let raw = marshal_extensions(&extensions);
        let parsed = unmarshal_extensions(&raw).unwrap();
        assert_eq!(parsed, extensions);
    }

    #[test]
    fn test_unknown_extension_preserved() {
        // Extension type 0xABCD with 2 bytes of payload.
        let raw = [
            0x00, 0x06, // total length
            0xAB, 0xCD, 0x00, 0x02, 0x01, 0x02,
        ];
        let parsed = unmarshal_extensions(&raw).unwrap();
        assert_eq!(
            parsed,
            vec![Extension::Unknown {
                typ: 0xABCD,
                data: vec![0x01, 0x02]
            }]
        );
    }
}

use crate::error::{Error, Result};

pub const EXTENSION_SUPPORTED_GROUPS: u16 = 10;
pub const EXTENSION_EC_POINT_FORMATS: u16 = 11;
pub const EXTENSION_SIGNATURE_ALGORITHMS: u16 = 13;
pub const EXTENSION_USE_SRTP: u16 = 14;
pub const EXTENSION_EXTENDED_MASTER_SECRET: u16 = 23;
pub const EXTENSION_RENEGOTIATION_INFO: u16 = 65281;

pub const NAMED_CURVE_P256: u16 = 0x0017;
pub const NAMED_CURVE_P384: u16 = 0x0018;
pub const NAMED_CURVE_X25519: u16 = 0x001d;

pub const SIGNATURE_SCHEME_ECDSA_SECP256R1_SHA256: u16 = 0x0403;
pub const SIGNATURE_SCHEME_RSA_PKCS1_SHA256: u16 = 0x0401;
pub const SIGNATURE_SCHEME_ED25519: u16 = 0x0807;

// Extension is one hello extension; only the kinds this stack negotiates
// are decoded, the rest are carried opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    SupportedGroups(Vec<u16>),
    EcPointFormats(Vec<u8>),
    SignatureAlgorithms(Vec<u16>),
    UseSrtp {
        protection_profiles: Vec<u16>,
        mki: Vec<u8>,
    },
    ExtendedMasterSecret,
    RenegotiationInfo(Vec<u8>),
    Unknown {
        typ: u16,
        data: Vec<u8>,
    },
}

impl Extension {
    fn typ(&self) -> u16 {
        match self {
            Extension::SupportedGroups(_) => EXTENSION_SUPPORTED_GROUPS,
            Extension::EcPointFormats(_) => EXTENSION_EC_POINT_FORMATS,
            Extension::SignatureAlgorithms(_) => EXTENSION_SIGNATURE_ALGORITHMS,
            Extension::UseSrtp { .. } => EXTENSION_USE_SRTP,
            Extension::ExtendedMasterSecret => EXTENSION_EXTENDED_MASTER_SECRET,
            Extension::RenegotiationInfo(_) => EXTENSION_RENEGOTIATION_INFO,
            Extension::Unknown { typ, .. } => *typ,
        }
    }

    fn body(&self) -> Vec<u8> {
        match self {
            Extension::SupportedGroups(groups) => {
                let mut out = vec![];
                out.extend_from_slice(&((groups.len() * 2) as u16).to_be_bytes());
                for g in groups {
                    out.extend_from_slice(&g.to_be_bytes());
                }
                out
            }
            Extension::EcPointFormats(formats) => {
                let mut out = vec![formats.len() as u8];
                out.extend_from_slice(formats);
                out
            }
            Extension::SignatureAlgorithms(algos) => {
                let mut out = vec![];
                out.extend_from_slice(&((algos.len() * 2) as u16).to_be_bytes());
                for a in algos {
                    out.extend_from_slice(&a.to_be_bytes());
                }
                out
            }
            Extension::UseSrtp {
                protection_profiles,
                mki,
            } => {
                let mut out = vec![];
                out.extend_from_slice(&((protection_profiles.len() * 2) as u16).to_be_bytes());
                for p in protection_profiles {
                    out.extend_from_slice(&p.to_be_bytes());
                }
                out.push(mki.len() as u8);
                out.extend_from_slice(mki);
                out
            }
            Extension::ExtendedMasterSecret => vec![],
            Extension::RenegotiationInfo(data) => {
                let mut out = vec![data.len() as u8];
                out.extend_from_slice(data);
                out
            }
            Extension::Unknown { data, .. } => data.clone(),
        }
    }
}

// marshal_extensions renders the extensions block including its 2-byte
// total length prefix.
pub fn marshal_extensions(extensions: &[Extension]) -> Vec<u8> {
    let mut body = vec![];
    for e in extensions {
        let eb = e.body();
        body.extend_from_slice(&e.typ().to_be_bytes());
        body.extend_from_slice(&(eb.len() as u16).to_be_bytes());
        body.extend_from_slice(&eb);
    }
    let mut out = vec![];
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(&body);
    out
}

pub fn unmarshal_extensions(raw: &[u8]) -> Result<Vec<Extension>> {
    if raw.len() < 2 {
        return Err(Error::ErrBufferTooSmall);
    }
    let total = u16::from_be_bytes([raw[0], raw[1]]) as usize;
    if raw.len() < 2 + total {
        return Err(Error::ErrBufferTooSmall);
    }

    let mut out = vec![];
    let mut offset = 2;
    while offset + 4 <= 2 + total {
        let typ = u16::from_be_bytes([raw[offset], raw[offset + 1]]);
        let len = u16::from_be_bytes([raw[offset + 2], raw[offset + 3]]) as usize;
        offset += 4;
        if offset + len > raw.len() {
            return Err(Error::ErrBufferTooSmall);
        }
        let body = &raw[offset..offset + len];
        offset += len;

        let ext = match typ {
            EXTENSION_SUPPORTED_GROUPS => {
                if body.len() < 2 {
                    return Err(Error::ErrBufferTooSmall);
                }
                let n = u16::from_be_bytes([body[0], body[1]]) as usize;
                let mut groups = vec![];
                for chunk in body[2..2 + n.min(body.len() - 2)].chunks_exact(2) {
                    groups.push(u16::from_be_bytes([chunk[0], chunk[1]]));
                }
                Extension::SupportedGroups(groups)
            }
            EXTENSION_EC_POINT_FORMATS => {
                if body.is_empty() {
                    return Err(Error::ErrBufferTooSmall);
                }
                let n = body[0] as usize;
                Extension::EcPointFormats(body[1..1 + n.min(body.len() - 1)].to_vec())
            }
            EXTENSION_SIGNATURE_ALGORITHMS => {
                if body.len() < 2 {
                    return Err(Error::ErrBufferTooSmall);
                }
                let n = u16::from_be_bytes([body[0], body[1]]) as usize;
                let mut algos = vec![];
                for chunk in body[2..2 + n.min(body.len() - 2)].chunks_exact(2) {
                    algos.push(u16::from_be_bytes([chunk[0], chunk[1]]));
                }
                Extension::SignatureAlgorithms(algos)
            }
            EXTENSION_USE_SRTP => {
                if body.len() < 2 {
                    return Err(Error::ErrBufferTooSmall);
                }
                let n = u16::from_be_bytes([body[0], body[1]]) as usize;
                if body.len() < 2 + n + 1 {
                    return Err(Error::ErrBufferTooSmall);
                }
                let mut protection_profiles = vec![];
                for chunk in body[2..2 + n].chunks_exact(2) {
                    protection_profiles.push(u16::from_be_bytes([chunk[0], chunk[1]]));
                }
                let mki_len = body[2 + n] as usize;
                let mki = body[2 + n + 1..(2 + n + 1 + mki_len).min(body.len())].to_vec();
                Extension::UseSrtp {
                    protection_profiles,
                    mki,
                }
            }
            EXTENSION_EXTENDED_MASTER_SECRET => Extension::ExtendedMasterSecret,
            EXTENSION_RENEGOTIATION_INFO => {
                if body.is_empty() {
                    Extension::RenegotiationInfo(vec![])
                } else {
                    let n = body[0] as usize;
                    Extension::RenegotiationInfo(body[1..1 + n.min(body.len() - 1)].to_vec())
                }
            }
            _ => Extension::Unknown {
                typ,
                data: body.to_vec(),
            },
        };
        out.push(ext);
    }

    Ok(out)
}

// find helpers used during negotiation.
pub fn find_use_srtp(extensions: &[Extension]) -> Option<(&[u16], &[u8])> {
    extensions.iter().find_map(|e| match e {
        Extension::UseSrtp {
            protection_profiles,
            mki,
        } => Some((protection_profiles.as_slice(), mki.as_slice())),
        _ => None,
    })
}

pub fn has_extended_master_secret(extensions: &[Extension]) -> bool {
    extensions
        .iter()
        .any(|e| matches!(e, Extension::ExtendedMasterSecret))
}

pub fn find_supported_groups(extensions: &[Extension]) -> Option<&[u16]> {
    extensions.iter().find_map(|e| match e {
        Extension::SupportedGroups(groups) => Some(groups.as_slice()),
        _ => None,
    })
}
