use crate::cipher_suite::CipherSuiteId;
use crate::error::{Error, Result};
use crate::prf::prf_export_keying_material;
use crate::SrtpProtectionProfile;

// Labels reserved by the TLS key schedule; the exporter refuses them.
pub static INVALID_KEYING_LABELS: &[&str] = &[
    "client finished",
    "server finished",
    "master secret",
    "key expansion",
];

// State is the negotiated session state surfaced once the handshake
// completes.
#[derive(Clone, Default)]
pub struct State {
    pub is_client: bool,
    pub cipher_suite: Option<CipherSuiteId>,
    pub srtp_protection_profile: Option<SrtpProtectionProfile>,
    pub peer_certificates: Vec<Vec<u8>>,
    pub local_random: [u8; 32],
    pub remote_random: [u8; 32],
    pub(crate) master_secret: Vec<u8>,
    pub(crate) extended_master_secret: bool,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The master secret stays out of debug output.
        f.debug_struct("State")
            .field("is_client", &self.is_client)
            .field("cipher_suite", &self.cipher_suite)
            .field("srtp_protection_profile", &self.srtp_protection_profile)
            .field("peer_certificates", &self.peer_certificates.len())
            .finish()
    }
}

impl State {
    // export_keying_material implements the RFC 5705 exporter used to key
    // SRTP (label "EXTRACTOR-dtls_srtp", RFC 5764 §4.2).
    pub fn export_keying_material(&self, label: &str, length: usize) -> Result<Vec<u8>> {
        if self.master_secret.is_empty() {
            return Err(Error::ErrHandshakeInProgress);
        }
        if INVALID_KEYING_LABELS.contains(&label) {
            return Err(Error::ErrReservedExportKeyingMaterial);
        }
        let (client_random, server_random) = if self.is_client {
            (&self.local_random, &self.remote_random)
        } else {
            (&self.remote_random, &self.local_random)
        };
        prf_export_keying_material(
            &self.master_secret,
            label,
            client_random,
            server_random,
            length,
        )
    }
}
