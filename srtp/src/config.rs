use crate::error::{Error, Result};
use crate::option::ContextOption;
use crate::protection_profile::ProtectionProfile;

// SessionKeys holds one direction's master key and salt.
#[derive(Default, Debug, Clone)]
pub struct SessionKeys {
    pub local_master_key: Vec<u8>,
    pub local_master_salt: Vec<u8>,
    pub remote_master_key: Vec<u8>,
    pub remote_master_salt: Vec<u8>,
}

// Config collects everything needed to build the two SRTP contexts of a
// session.
#[derive(Default)]
pub struct Config {
    pub keys: SessionKeys,
    pub profile: ProtectionProfile,
    pub srtp_replay_protection: Option<ContextOption>,
    pub srtcp_replay_protection: Option<ContextOption>,
}

pub const LABEL_EXTRACTOR_DTLS_SRTP: &str = "EXTRACTOR-dtls_srtp";

impl Config {
    // extract_session_keys_from_dtls splits DTLS exported keying material
    // into client/server write keys and salts per RFC 5764 §4.2: keys
    // first, then salts, client before server.
    pub fn extract_session_keys_from_dtls(
        &mut self,
        exported_key_material: &[u8],
        is_client: bool,
    ) -> Result<()> {
        let key_len = self.profile.key_len();
        let salt_len = self.profile.salt_len();

        if exported_key_material.len() != 2 * (key_len + salt_len) {
            return Err(Error::ExporterFailed);
        }

        let client_write_key = &exported_key_material[..key_len];
        let server_write_key = &exported_key_material[key_len..2 * key_len];
        let client_write_salt = &exported_key_material[2 * key_len..2 * key_len + salt_len];
        let server_write_salt = &exported_key_material[2 * key_len + salt_len..];

        if is_client {
            self.keys.local_master_key = client_write_key.to_vec();
            self.keys.local_master_salt = client_write_salt.to_vec();
            self.keys.remote_master_key = server_write_key.to_vec();
            self.keys.remote_master_salt = server_write_salt.to_vec();
        } else {
            self.keys.local_master_key = server_write_key.to_vec();
            self.keys.local_master_salt = server_write_salt.to_vec();
            self.keys.remote_master_key = client_write_key.to_vec();
            self.keys.remote_master_salt = client_write_salt.to_vec();
        }

        Ok(())
    }
}
