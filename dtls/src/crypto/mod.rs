pub mod crypto_gcm;

#[cfg(test)]
mod crypto_test {
    use super::*;

    #[test]
    fn test_ecdh_shared_secret_agreement_x25519() {
        let a = NamedCurveKeypair::generate(crate::extension::NAMED_CURVE_X25519).unwrap();
        let b = NamedCurveKeypair::generate(crate::extension::NAMED_CURVE_X25519).unwrap();
        let s1 = a.shared_secret(&b.public_key).unwrap();
        let s2 = b.shared_secret(&a.public_key).unwrap();
        assert_eq!(s1, s2);
        assert_eq!(s1.len(), 32);
    }

    #[test]
    fn test_ecdh_shared_secret_agreement_p256() {
        let a = NamedCurveKeypair::generate(crate::extension::NAMED_CURVE_P256).unwrap();
        let b = NamedCurveKeypair::generate(crate::extension::NAMED_CURVE_P256).unwrap();
        let s1 = a.shared_secret(&b.public_key).unwrap();
        let s2 = b.shared_secret(&a.public_key).unwrap();
        assert_eq!(s1, s2);
    }

    #[test]
    fn test_key_exchange_signature_roundtrip() {
        let signing_key = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let verifying_key = signing_key.verifying_key();
        let spki = spki_from_p256(verifying_key);

        let msg = b"client random server random params";
        let sig = sign_key_exchange(&signing_key, msg).unwrap();
        verify_signature(
            &spki,
            crate::extension::SIGNATURE_SCHEME_ECDSA_SECP256R1_SHA256,
            msg,
            &sig,
        )
        .unwrap();

        // A tampered message must not verify.
        assert!(verify_signature(
            &spki,
            crate::extension::SIGNATURE_SCHEME_ECDSA_SECP256R1_SHA256,
            b"other message",
            &sig,
        )
        .is_err());
    }

    // spki_from_p256 builds the DER SubjectPublicKeyInfo for a P-256 key,
    // the shape verify_signature expects from a parsed certificate.
    fn spki_from_p256(key: &p256::ecdsa::VerifyingKey) -> Vec<u8> {
        let point = key.to_encoded_point(false);
        let mut spki = vec![
            0x30, 0x59, // SEQUENCE
            0x30, 0x13, // SEQUENCE (algorithm)
            0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, // id-ecPublicKey
            0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, // prime256v1
            0x03, 0x42, 0x00, // BIT STRING
        ];
        spki.extend_from_slice(point.as_bytes());
        spki
    }
}

use p256::ecdsa::signature::Signer;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Error, Result};
use crate::extension::{
    NAMED_CURVE_P256, NAMED_CURVE_X25519, SIGNATURE_SCHEME_ECDSA_SECP256R1_SHA256,
    SIGNATURE_SCHEME_RSA_PKCS1_SHA256,
};

// NamedCurveKeypair is an ephemeral ECDHE keypair on one of the curves
// this endpoint offers.
pub struct NamedCurveKeypair {
    pub curve: u16,
    pub public_key: Vec<u8>,
    secret: KeypairSecret,
}

enum KeypairSecret {
    X25519(x25519_dalek::StaticSecret),
    P256(p256::ecdh::EphemeralSecret),
}

impl NamedCurveKeypair {
    pub fn generate(curve: u16) -> Result<Self> {
        match curve {
            NAMED_CURVE_X25519 => {
                let mut secret_bytes = [0u8; 32];
                OsRng.fill_bytes(&mut secret_bytes);
                let secret = x25519_dalek::StaticSecret::from(secret_bytes);
                let public = x25519_dalek::PublicKey::from(&secret);
                Ok(NamedCurveKeypair {
                    curve,
                    public_key: public.as_bytes().to_vec(),
                    secret: KeypairSecret::X25519(secret),
                })
            }
            NAMED_CURVE_P256 => {
                let secret = p256::ecdh::EphemeralSecret::random(&mut OsRng);
                let public = secret.public_key();
                Ok(NamedCurveKeypair {
                    curve,
                    // Uncompressed SEC1 point.
                    public_key: public.to_encoded_point(false).as_bytes().to_vec(),
                    secret: KeypairSecret::P256(secret),
                })
            }
            _ => Err(Error::ErrNoSupportedEllipticCurves),
        }
    }

    // shared_secret runs ECDH against the peer's public key.
    pub fn shared_secret(&self, peer_public: &[u8]) -> Result<Vec<u8>> {
        match &self.secret {
            KeypairSecret::X25519(secret) => {
                if peer_public.len() != 32 {
                    return Err(Error::Crypto("bad X25519 public key length".to_owned()));
                }
                let mut pk = [0u8; 32];
                pk.copy_from_slice(peer_public);
                let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(pk));
                Ok(shared.as_bytes().to_vec())
            }
            KeypairSecret::P256(secret) => {
                let peer = p256::PublicKey::from_sec1_bytes(peer_public)
                    .map_err(|e| Error::Crypto(e.to_string()))?;
                let shared = secret.diffie_hellman(&peer);
                Ok(shared.raw_secret_bytes().to_vec())
            }
        }
    }
}

// sign_key_exchange signs ServerKeyExchange params (or the
// CertificateVerify transcript) with the local ECDSA certificate key,
// producing an ASN.1 DER signature.
pub fn sign_key_exchange(signing_key: &p256::ecdsa::SigningKey, message: &[u8]) -> Result<Vec<u8>> {
    let signature: p256::ecdsa::Signature = signing_key
        .try_sign(message)
        .map_err(|e| Error::Crypto(e.to_string()))?;
    Ok(signature.to_der().as_bytes().to_vec())
}

// verify_signature verifies an ECDSA-P256-SHA256 or RSA-PKCS1-SHA256
// signature against the peer certificate's SubjectPublicKeyInfo.
pub fn verify_signature(
    spki_der: &[u8],
    signature_scheme: u16,
    message: &[u8],
    signature: &[u8],
) -> Result<()> {
    let algorithm: &dyn ring::signature::VerificationAlgorithm = match signature_scheme {
        SIGNATURE_SCHEME_ECDSA_SECP256R1_SHA256 => &ring::signature::ECDSA_P256_SHA256_ASN1,
        SIGNATURE_SCHEME_RSA_PKCS1_SHA256 => &ring::signature::RSA_PKCS1_2048_8192_SHA256,
        _ => return Err(Error::ErrKeySignatureMismatch),
    };

    let raw_key = subject_public_key(spki_der, signature_scheme)?;
    let key = ring::signature::UnparsedPublicKey::new(algorithm, raw_key);
    key.verify(message, signature)
        .map_err(|_| Error::ErrKeySignatureMismatch)
}

// subject_public_key extracts the raw key bits ring expects: for ECDSA
// the uncompressed point, for RSA the RSAPublicKey structure.
fn subject_public_key(spki_der: &[u8], signature_scheme: u16) -> Result<Vec<u8>> {
    use x509_parser::prelude::FromDer;
    let (_, spki) = x509_parser::x509::SubjectPublicKeyInfo::from_der(spki_der)
        .map_err(|e| Error::Crypto(e.to_string()))?;
    let _ = signature_scheme;
    Ok(spki.subject_public_key.data.to_vec())
}

// peer_spki pulls the SubjectPublicKeyInfo out of a DER certificate.
pub fn peer_spki(cert_der: &[u8]) -> Result<Vec<u8>> {
    let (_, cert) = x509_parser::parse_x509_certificate(cert_der)
        .map_err(|e| Error::Crypto(e.to_string()))?;
    Ok(cert.tbs_certificate.subject_pki.raw.to_vec())
}
