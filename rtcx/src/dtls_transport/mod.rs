use std::sync::Arc;

use log::debug;
use srtp::config::LABEL_EXTRACTOR_DTLS_SRTP;
use srtp::protection_profile::ProtectionProfile;
use tokio::sync::Mutex;
use util::conn::Conn;

use crate::error::{Error, Result};
use crate::peer_connection::certificate::{RTCCertificate, RTCDtlsFingerprint};

// RTCDtlsRole resolved from the SDP setup attributes (RFC 5763): the
// offerer is actpass, the answerer defaults to active (client).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RTCDtlsRole {
    #[default]
    Auto,
    Client,
    Server,
}

// RTCDtlsTransport runs the DTLS handshake over the nominated pair,
// verifies the peer against the SDP fingerprints and keys SRTP.
pub struct RTCDtlsTransport {
    pub(crate) certificate: RTCCertificate,
    pub(crate) conn: Mutex<Option<Arc<dtls::conn::DTLSConn>>>,
    pub(crate) srtp_profile: Mutex<Option<ProtectionProfile>>,
}

pub(crate) struct SrtpKeys {
    pub(crate) profile: ProtectionProfile,
    pub(crate) local_master_key: Vec<u8>,
    pub(crate) local_master_salt: Vec<u8>,
    pub(crate) remote_master_key: Vec<u8>,
    pub(crate) remote_master_salt: Vec<u8>,
}

impl RTCDtlsTransport {
    pub fn new(certificate: RTCCertificate) -> Self {
        RTCDtlsTransport {
            certificate,
            conn: Mutex::new(None),
            srtp_profile: Mutex::new(None),
        }
    }

    pub fn fingerprint(&self) -> RTCDtlsFingerprint {
        self.certificate.fingerprint()
    }

    // start handshakes over the endpoint and verifies the peer
    // certificate against the fingerprints from the remote description.
    pub async fn start(
        &self,
        endpoint: Arc<dyn Conn + Send + Sync>,
        is_client: bool,
        remote_fingerprints: &[RTCDtlsFingerprint],
    ) -> Result<Arc<dtls::conn::DTLSConn>> {
        let config = dtls::config::Config {
            certificates: vec![self.certificate.dtls_certificate.clone()],
            ..Default::default()
        };

        let conn = Arc::new(
            dtls::conn::DTLSConn::new(endpoint, config, is_client)
                .await
                .map_err(|e| Error::ErrDtlsHandshake(e.to_string()))?,
        );

        // Any one advertised fingerprint matching the presented leaf
        // certificate is sufficient.
        let peer_certs = &conn.connection_state().peer_certificates;
        let leaf = peer_certs.first().ok_or(Error::ErrFingerprintMismatch)?;
        if !remote_fingerprints.iter().any(|fp| fp.matches(leaf)) {
            return Err(Error::ErrFingerprintMismatch);
        }
        debug!("dtls transport: peer fingerprint verified");

        let profile = match conn.selected_srtp_protection_profile() {
            Some(dtls::SrtpProtectionProfile::AeadAes128Gcm) => ProtectionProfile::AeadAes128Gcm,
            Some(dtls::SrtpProtectionProfile::AeadAes256Gcm) => ProtectionProfile::AeadAes256Gcm,
            Some(dtls::SrtpProtectionProfile::Aes128CmHmacSha1_80) => {
                ProtectionProfile::Aes128CmHmacSha1_80
            }
            Some(dtls::SrtpProtectionProfile::Aes128CmHmacSha1_32) => {
                ProtectionProfile::Aes128CmHmacSha1_32
            }
            _ => return Err(Error::ErrUnsupportedSrtpProfile),
        };

        *self.conn.lock().await = Some(conn.clone());
        *self.srtp_profile.lock().await = Some(profile);
        Ok(conn)
    }

    // srtp_keys exports and splits the DTLS-SRTP keying material.
    pub(crate) async fn srtp_keys(&self) -> Result<SrtpKeys> {
        let conn_guard = self.conn.lock().await;
        let conn = conn_guard.as_ref().ok_or(Error::ErrConnectionClosed)?;
        let profile =
            (*self.srtp_profile.lock().await).ok_or(Error::ErrUnsupportedSrtpProfile)?;

        let key_len = profile.key_len();
        let salt_len = profile.salt_len();
        let material =
            conn.export_keying_material(LABEL_EXTRACTOR_DTLS_SRTP, 2 * (key_len + salt_len))?;

        let mut config = srtp::config::Config {
            profile,
            ..Default::default()
        };
        config.extract_session_keys_from_dtls(
            &material,
            conn.connection_state().is_client,
        )?;

        Ok(SrtpKeys {
            profile,
            local_master_key: config.keys.local_master_key,
            local_master_salt: config.keys.local_master_salt,
            remote_master_key: config.keys.remote_master_key,
            remote_master_salt: config.keys.remote_master_salt,
        })
    }

    pub async fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().await.as_ref() {
            let _ = conn.close().await;
        }
        Ok(())
    }
}
