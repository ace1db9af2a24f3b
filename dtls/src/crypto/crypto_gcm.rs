#[cfg(test)]
mod crypto_gcm_test {
    use super::*;
    use crate::content::ContentType;
    use crate::record_layer::PROTOCOL_VERSION1_2;

    fn header(seq: u64, len: u16) -> RecordLayerHeader {
        RecordLayerHeader {
            content_type: ContentType::ApplicationData,
            protocol_version: PROTOCOL_VERSION1_2,
            epoch: 1,
            sequence_number: seq,
            content_len: len,
        }
    }

    fn pair() -> (CryptoGcm, CryptoGcm) {
        let ck = [1u8; 16];
        let civ = [2u8; 4];
        let sk = [3u8; 16];
        let siv = [4u8; 4];
        let client = CryptoGcm::new(&ck, &civ, &sk, &siv).unwrap();
        let server = CryptoGcm::new(&sk, &siv, &ck, &civ).unwrap();
        (client, server)
    }

    #[test]
    fn test_gcm_record_roundtrip() {
        let (client, server) = pair();
        let payload = b"application payload";
        let sealed = client.encrypt(&header(5, payload.len() as u16), payload).unwrap();
        let opened = server.decrypt(&sealed).unwrap();
        assert_eq!(&opened[RECORD_LAYER_HEADER_SIZE..], payload);
    }

    #[test]
    fn test_gcm_tamper_detected() {
        let (client, server) = pair();
        let mut sealed = client.encrypt(&header(5, 4), b"data").unwrap();
        let n = sealed.len();
        sealed[n - 1] ^= 0xFF;
        assert!(server.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_gcm_header_is_authenticated() {
        let (client, server) = pair();
        let mut sealed = client.encrypt(&header(5, 4), b"data").unwrap();
        // Flip the epoch in the header: AAD verification must fail.
        sealed[3] ^= 0x01;
        assert!(server.decrypt(&sealed).is_err());
    }
}

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};

use crate::error::{Error, Result};
use crate::record_layer::{RecordLayerHeader, RECORD_LAYER_HEADER_SIZE};

pub(crate) const GCM_EXPLICIT_NONCE_LEN: usize = 8;
pub(crate) const GCM_TAG_LENGTH: usize = 16;

// CryptoGcm is the AES-128-GCM record protection of RFC 5288 applied to
// DTLS: 4-byte implicit IV from the key block, 8-byte explicit nonce on
// the wire, and the record pseudo-header as AAD.
pub struct CryptoGcm {
    local_gcm: Aes128Gcm,
    local_write_iv: [u8; 4],
    remote_gcm: Aes128Gcm,
    remote_write_iv: [u8; 4],
}

impl CryptoGcm {
    pub fn new(
        local_key: &[u8],
        local_write_iv: &[u8],
        remote_key: &[u8],
        remote_write_iv: &[u8],
    ) -> Result<Self> {
        if local_write_iv.len() != 4 || remote_write_iv.len() != 4 {
            return Err(Error::Crypto("GCM implicit IV must be 4 bytes".to_owned()));
        }
        let mut liv = [0u8; 4];
        liv.copy_from_slice(local_write_iv);
        let mut riv = [0u8; 4];
        riv.copy_from_slice(remote_write_iv);
        Ok(CryptoGcm {
            local_gcm: Aes128Gcm::new_from_slice(local_key)
                .map_err(|e| Error::Crypto(e.to_string()))?,
            local_write_iv: liv,
            remote_gcm: Aes128Gcm::new_from_slice(remote_key)
                .map_err(|e| Error::Crypto(e.to_string()))?,
            remote_write_iv: riv,
        })
    }

    // additional_data is the TLS pseudo-header: seq/epoch, type, version
    // and the plaintext length.
    fn additional_data(header: &RecordLayerHeader, payload_len: usize) -> [u8; 13] {
        let mut aad = [0u8; 13];
        aad[..2].copy_from_slice(&header.epoch.to_be_bytes());
        aad[2..8].copy_from_slice(&header.sequence_number.to_be_bytes()[2..8]);
        aad[8] = header.content_type as u8;
        aad[9] = header.protocol_version.major;
        aad[10] = header.protocol_version.minor;
        aad[11..13].copy_from_slice(&(payload_len as u16).to_be_bytes());
        aad
    }

    fn nonce(write_iv: &[u8; 4], explicit: &[u8]) -> [u8; 12] {
        let mut nonce = [0u8; 12];
        nonce[..4].copy_from_slice(write_iv);
        nonce[4..12].copy_from_slice(explicit);
        nonce
    }

    // encrypt seals the payload and emits header || explicit_nonce ||
    // ciphertext+tag, fixing up the header length.
    pub fn encrypt(&self, header: &RecordLayerHeader, payload: &[u8]) -> Result<Vec<u8>> {
        // Explicit nonce is epoch+sequence, unique per record.
        let mut explicit = [0u8; GCM_EXPLICIT_NONCE_LEN];
        explicit[..2].copy_from_slice(&header.epoch.to_be_bytes());
        explicit[2..8].copy_from_slice(&header.sequence_number.to_be_bytes()[2..8]);

        let nonce = Self::nonce(&self.local_write_iv, &explicit);
        let aad = Self::additional_data(header, payload.len());

        let ciphertext = self
            .local_gcm
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: payload,
                    aad: &aad,
                },
            )
            .map_err(|_| Error::Crypto("record encryption failed".to_owned()))?;

        let mut out_header = *header;
        out_header.content_len = (GCM_EXPLICIT_NONCE_LEN + ciphertext.len()) as u16;
        let mut out = out_header.marshal();
        out.extend_from_slice(&explicit);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    // decrypt opens header || explicit_nonce || ciphertext+tag, returning
    // header || plaintext.
    pub fn decrypt(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let header = RecordLayerHeader::unmarshal(raw)?;
        let body = &raw[RECORD_LAYER_HEADER_SIZE..];
        if body.len() < GCM_EXPLICIT_NONCE_LEN + GCM_TAG_LENGTH {
            return Err(Error::ErrBufferTooSmall);
        }

        let nonce = Self::nonce(&self.remote_write_iv, &body[..GCM_EXPLICIT_NONCE_LEN]);
        let ciphertext = &body[GCM_EXPLICIT_NONCE_LEN..];
        let plaintext_len = ciphertext.len() - GCM_TAG_LENGTH;
        let aad = Self::additional_data(&header, plaintext_len);

        let plaintext = self
            .remote_gcm
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| Error::Crypto("record authentication failed".to_owned()))?;

        let mut out_header = header;
        out_header.content_len = plaintext.len() as u16;
        let mut out = out_header.marshal();
        out.extend_from_slice(&plaintext);
        Ok(out)
    }
}
