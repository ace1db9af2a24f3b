pub mod cipher_suite_aes_128_gcm_sha256;

use std::fmt;

use crate::error::Result;
use crate::record_layer::RecordLayerHeader;
pub use cipher_suite_aes_128_gcm_sha256::CipherSuiteAes128GcmSha256;

// CipherSuiteId is the 16-bit IANA cipher suite number.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum CipherSuiteId {
    TlsEcdheEcdsaWithAes128GcmSha256 = 0xC02B,
    TlsEcdheRsaWithAes128GcmSha256 = 0xC02F,
    Unsupported = 0x0000,
}

impl From<u16> for CipherSuiteId {
    fn from(v: u16) -> Self {
        match v {
            0xC02B => CipherSuiteId::TlsEcdheEcdsaWithAes128GcmSha256,
            0xC02F => CipherSuiteId::TlsEcdheRsaWithAes128GcmSha256,
            _ => CipherSuiteId::Unsupported,
        }
    }
}

impl fmt::Display for CipherSuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CipherSuiteId::TlsEcdheEcdsaWithAes128GcmSha256 => {
                "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256"
            }
            CipherSuiteId::TlsEcdheRsaWithAes128GcmSha256 => {
                "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"
            }
            CipherSuiteId::Unsupported => "Unsupported",
        };
        write!(f, "{s}")
    }
}

impl CipherSuiteId {
    // is_ecdsa selects the CertificateVerify/ServerKeyExchange signature
    // family the suite expects.
    pub fn is_ecdsa(&self) -> bool {
        matches!(self, CipherSuiteId::TlsEcdheEcdsaWithAes128GcmSha256)
    }
}

// default_cipher_suites lists the mandatory suites in preference order.
pub fn default_cipher_suites() -> Vec<CipherSuiteId> {
    vec![
        CipherSuiteId::TlsEcdheEcdsaWithAes128GcmSha256,
        CipherSuiteId::TlsEcdheRsaWithAes128GcmSha256,
    ]
}

// CipherSuite protects the record layer once keys are negotiated.
pub trait CipherSuite: Send + Sync {
    fn id(&self) -> CipherSuiteId;
    fn is_initialized(&self) -> bool;

    fn init(
        &mut self,
        master_secret: &[u8],
        client_random: &[u8],
        server_random: &[u8],
        is_client: bool,
    ) -> Result<()>;

    // encrypt seals one record payload, returning the wire form
    // including the rewritten header.
    fn encrypt(&self, header: &RecordLayerHeader, payload: &[u8]) -> Result<Vec<u8>>;

    // decrypt opens one record (header included in `raw`).
    fn decrypt(&self, raw: &[u8]) -> Result<Vec<u8>>;
}
