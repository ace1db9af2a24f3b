use std::sync::Arc;
use std::time::Duration;

use crate::SrtpProtectionProfile;

// Certificate pairs the DER chain with its ECDSA P-256 signing key.
#[derive(Clone)]
pub struct Certificate {
    pub certificate: Vec<Vec<u8>>,
    pub private_key: Arc<p256::ecdsa::SigningKey>,
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("chain_len", &self.certificate.len())
            .finish()
    }
}

impl Certificate {
    // generate_self_signed creates an ECDSA P-256 certificate valid for
    // about a day, the WebRTC default.
    pub fn generate_self_signed(common_name: &str) -> crate::error::Result<Self> {
        let mut params = rcgen::CertificateParams::new(vec![common_name.to_owned()])
            .map_err(|e| crate::error::Error::Crypto(e.to_string()))?;
        let now = std::time::SystemTime::now();
        params.not_before = (now - Duration::from_secs(60 * 60)).into();
        params.not_after = (now + Duration::from_secs(24 * 60 * 60)).into();

        let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)
            .map_err(|e| crate::error::Error::Crypto(e.to_string()))?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| crate::error::Error::Crypto(e.to_string()))?;

        use p256::pkcs8::DecodePrivateKey;
        let private_key =
            p256::ecdsa::SigningKey::from_pkcs8_der(&key_pair.serialize_der())
                .map_err(|e| crate::error::Error::Crypto(e.to_string()))?;

        Ok(Certificate {
            certificate: vec![cert.der().to_vec()],
            private_key: Arc::new(private_key),
        })
    }
}

// Config drives one DTLS connection.
#[derive(Clone)]
pub struct Config {
    pub certificates: Vec<Certificate>,
    // WebRTC verifies the peer by SDP fingerprint instead of a CA chain,
    // so chain validation is skipped and the caller checks the
    // fingerprint against connection_state().peer_certificates.
    pub insecure_skip_verify: bool,
    pub srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    // Entire-handshake deadline.
    pub handshake_timeout: Duration,
    // First retransmission timeout of a flight; doubles up to 60 s.
    pub flight_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            certificates: vec![],
            insecure_skip_verify: true,
            srtp_protection_profiles: vec![
                SrtpProtectionProfile::AeadAes128Gcm,
                SrtpProtectionProfile::Aes128CmHmacSha1_80,
            ],
            handshake_timeout: Duration::from_secs(60),
            flight_interval: Duration::from_secs(1),
        }
    }
}
