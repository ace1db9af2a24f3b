use super::*;
use crate::cipher_suite::CipherSuiteId;
use crate::extension::Extension;

#[test]
fn test_handshake_header_roundtrip() {
    let header = HandshakeHeader {
        handshake_type: HandshakeType::ClientHello,
        length: 0x012345,
        message_sequence: 7,
        fragment_offset: 0x10,
        fragment_length: 0x22,
    };
    let raw = header.marshal();
    assert_eq!(raw.len(), HANDSHAKE_HEADER_LENGTH);
    assert_eq!(HandshakeHeader::unmarshal(&raw).unwrap(), header);
}

#[test]
fn test_client_hello_roundtrip() {
    let hello = ClientHello {
        version: client_hello_version(),
        random: HandshakeRandom::generate(),
        session_id: vec![],
        cookie: vec![1, 2, 3, 4],
        cipher_suites: vec![
            CipherSuiteId::TlsEcdheEcdsaWithAes128GcmSha256,
            CipherSuiteId::TlsEcdheRsaWithAes128GcmSha256,
        ],
        extensions: vec![
            Extension::ExtendedMasterSecret,
            Extension::UseSrtp {
                protection_profiles: vec![0x0007],
                mki: vec![],
            },
        ],
    };
    let raw = hello.marshal();
    let parsed = ClientHello::unmarshal(&raw).unwrap();
    assert_eq!(parsed, hello);
}

#[test]
fn test_server_hello_roundtrip() {
    let hello = ServerHello {
        version: client_hello_version(),
        random: HandshakeRandom::generate(),
        session_id: vec![0xAA; 16],
        cipher_suite: CipherSuiteId::TlsEcdheEcdsaWithAes128GcmSha256,
        extensions: vec![Extension::ExtendedMasterSecret],
    };
    let raw = hello.marshal();
    assert_eq!(ServerHello::unmarshal(&raw).unwrap(), hello);
}

#[test]
fn test_certificate_roundtrip() {
    let msg = CertificateMsg {
        certificate: vec![vec![1, 2, 3], vec![4, 5]],
    };
    let raw = msg.marshal();
    assert_eq!(CertificateMsg::unmarshal(&raw).unwrap(), msg);
}

#[test]
fn test_server_key_exchange_roundtrip() {
    let ske = ServerKeyExchange {
        named_curve: crate::extension::NAMED_CURVE_X25519,
        public_key: vec![0x33; 32],
        signature_scheme: crate::extension::SIGNATURE_SCHEME_ECDSA_SECP256R1_SHA256,
        signature: vec![0x44; 70],
    };
    let raw = ske.marshal();
    assert_eq!(ServerKeyExchange::unmarshal(&raw).unwrap(), ske);
}

#[test]
fn test_hello_verify_request_roundtrip() {
    let hvr = HelloVerifyRequest {
        version: client_hello_version(),
        cookie: vec![9u8; COOKIE_LENGTH],
    };
    let raw = hvr.marshal();
    assert_eq!(HelloVerifyRequest::unmarshal(&raw).unwrap(), hvr);
}

#[test]
fn test_truncated_messages_rejected() {
    assert!(ClientHello::unmarshal(&[0u8; 10]).is_err());
    assert!(ServerHello::unmarshal(&[0u8; 5]).is_err());
    assert!(CertificateMsg::unmarshal(&[0u8; 2]).is_err());
    assert!(ServerKeyExchange::unmarshal(&[3, 0]).is_err());
}
