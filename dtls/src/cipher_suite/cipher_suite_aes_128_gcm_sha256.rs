use crate::cipher_suite::{CipherSuite, CipherSuiteId};
use crate::crypto::crypto_gcm::CryptoGcm;
use crate::error::{Error, Result};
use crate::prf::prf_encryption_keys;
use crate::record_layer::RecordLayerHeader;

pub(crate) const PRF_KEY_LEN: usize = 16;
pub(crate) const PRF_IV_LEN: usize = 4;

// AES-128-GCM suite shared by the ECDHE_ECDSA and ECDHE_RSA variants;
// only the negotiated id differs.
pub struct CipherSuiteAes128GcmSha256 {
    id: CipherSuiteId,
    gcm: Option<CryptoGcm>,
}

impl CipherSuiteAes128GcmSha256 {
    pub fn new(rsa: bool) -> Self {
        CipherSuiteAes128GcmSha256 {
            id: if rsa {
                CipherSuiteId::TlsEcdheRsaWithAes128GcmSha256
            } else {
                CipherSuiteId::TlsEcdheEcdsaWithAes128GcmSha256
            },
            gcm: None,
        }
    }
}

impl CipherSuite for CipherSuiteAes128GcmSha256 {
    fn id(&self) -> CipherSuiteId {
        self.id
    }

    fn is_initialized(&self) -> bool {
        self.gcm.is_some()
    }

    fn init(
        &mut self,
        master_secret: &[u8],
        client_random: &[u8],
        server_random: &[u8],
        is_client: bool,
    ) -> Result<()> {
        let keys = prf_encryption_keys(
            master_secret,
            client_random,
            server_random,
            PRF_KEY_LEN,
            PRF_IV_LEN,
        )?;

        let gcm = if is_client {
            CryptoGcm::new(
                &keys.client_write_key,
                &keys.client_write_iv,
                &keys.server_write_key,
                &keys.server_write_iv,
            )?
        } else {
            CryptoGcm::new(
                &keys.server_write_key,
                &keys.server_write_iv,
                &keys.client_write_key,
                &keys.client_write_iv,
            )?
        };
        self.gcm = Some(gcm);
        Ok(())
    }

    fn encrypt(&self, header: &RecordLayerHeader, payload: &[u8]) -> Result<Vec<u8>> {
        match &self.gcm {
            Some(gcm) => gcm.encrypt(header, payload),
            None => Err(Error::ErrCipherSuiteNotInit),
        }
    }

    fn decrypt(&self, raw: &[u8]) -> Result<Vec<u8>> {
        match &self.gcm {
            Some(gcm) => gcm.decrypt(raw),
            None => Err(Error::ErrCipherSuiteNotInit),
        }
    }
}
