use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, KeyInit, Nonce};
use bytes::{BufMut, Bytes, BytesMut};
use util::marshal::MarshalSize;

use super::cipher_aes_cm_hmac_sha1::SRTCP_INDEX_SIZE;
use super::Cipher;
use crate::error::{Error, Result};
use crate::key_derivation::*;
use crate::protection_profile::ProtectionProfile;

pub const CIPHER_AEAD_AES_GCM_AUTH_TAG_LEN: usize = 16;

const RTCP_ENCRYPTION_FLAG: u8 = 0x80;

enum AeadCipher {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl AeadCipher {
    fn new(key: &[u8]) -> Result<Self> {
        match key.len() {
            16 => Ok(AeadCipher::Aes128(Box::new(
                Aes128Gcm::new_from_slice(key).map_err(|e| Error::Other(e.to_string()))?,
            ))),
            32 => Ok(AeadCipher::Aes256(Box::new(
                Aes256Gcm::new_from_slice(key).map_err(|e| Error::Other(e.to_string()))?,
            ))),
            other => Err(Error::SrtpMasterKeyLength(16, other)),
        }
    }

    fn encrypt(&self, nonce: &[u8], payload: Payload<'_, '_>) -> Result<Vec<u8>> {
        match self {
            AeadCipher::Aes128(c) => c
                .encrypt(Nonce::from_slice(nonce), payload)
                .map_err(|_| Error::FailedToVerifyAuthTag),
            AeadCipher::Aes256(c) => c
                .encrypt(Nonce::from_slice(nonce), payload)
                .map_err(|_| Error::FailedToVerifyAuthTag),
        }
    }

    fn decrypt(&self, nonce: &[u8], payload: Payload<'_, '_>) -> Result<Vec<u8>> {
        match self {
            AeadCipher::Aes128(c) => c
                .decrypt(Nonce::from_slice(nonce), payload)
                .map_err(|_| Error::FailedToVerifyAuthTag),
            AeadCipher::Aes256(c) => c
                .decrypt(Nonce::from_slice(nonce), payload)
                .map_err(|_| Error::FailedToVerifyAuthTag),
        }
    }
}

// CipherAeadAesGcm implements AEAD protection per RFC 7714 for both
// 128- and 256-bit keys.
pub(crate) struct CipherAeadAesGcm {
    profile: ProtectionProfile,
    srtp_cipher: AeadCipher,
    srtcp_cipher: AeadCipher,
    srtp_session_salt: Vec<u8>,
    srtcp_session_salt: Vec<u8>,
}

impl CipherAeadAesGcm {
    pub(crate) fn new(
        profile: ProtectionProfile,
        master_key: &[u8],
        master_salt: &[u8],
    ) -> Result<CipherAeadAesGcm> {
        let srtp_session_key = aes_cm_key_derivation(
            LABEL_SRTP_ENCRYPTION,
            master_key,
            master_salt,
            0,
            master_key.len(),
        )?;
        let srtcp_session_key = aes_cm_key_derivation(
            LABEL_SRTCP_ENCRYPTION,
            master_key,
            master_salt,
            0,
            master_key.len(),
        )?;
        let srtp_session_salt = aes_cm_key_derivation(
            LABEL_SRTP_SALT,
            master_key,
            master_salt,
            0,
            master_salt.len(),
        )?;
        let srtcp_session_salt = aes_cm_key_derivation(
            LABEL_SRTCP_SALT,
            master_key,
            master_salt,
            0,
            master_salt.len(),
        )?;

        Ok(CipherAeadAesGcm {
            profile,
            srtp_cipher: AeadCipher::new(&srtp_session_key)?,
            srtcp_cipher: AeadCipher::new(&srtcp_session_key)?,
            srtp_session_salt,
            srtcp_session_salt,
        })
    }

    // rtp_initialization_vector per RFC 7714 §8.1: 2 zero octets, the
    // SSRC, the ROC and the sequence number, XOR-ed with the session salt.
    pub(crate) fn rtp_initialization_vector(
        &self,
        header: &rtp::header::Header,
        roc: u32,
    ) -> [u8; 12] {
        let mut iv = [0u8; 12];
        iv[2..6].copy_from_slice(&header.ssrc.to_be_bytes());
        iv[6..10].copy_from_slice(&roc.to_be_bytes());
        iv[10..12].copy_from_slice(&header.sequence_number.to_be_bytes());
        for (i, v) in iv.iter_mut().enumerate() {
            *v ^= self.srtp_session_salt[i];
        }
        iv
    }

    // rtcp_initialization_vector per RFC 7714 §9.1.
    pub(crate) fn rtcp_initialization_vector(&self, srtcp_index: usize, ssrc: u32) -> [u8; 12] {
        let mut iv = [0u8; 12];
        iv[2..6].copy_from_slice(&ssrc.to_be_bytes());
        iv[8..12].copy_from_slice(&(srtcp_index as u32).to_be_bytes());
        for (i, v) in iv.iter_mut().enumerate() {
            *v ^= self.srtcp_session_salt[i];
        }
        iv
    }

    // rtcp_additional_authenticated_data: the first 8 RTCP octets plus
    // the ESRTCP word (E flag and index), RFC 7714 §17.
    pub(crate) fn rtcp_additional_authenticated_data(
        &self,
        rtcp_packet: &[u8],
        srtcp_index: usize,
    ) -> [u8; 12] {
        let mut aad = [0u8; 12];
        aad[..8].copy_from_slice(&rtcp_packet[..8]);
        aad[8..12].copy_from_slice(&(srtcp_index as u32).to_be_bytes());
        aad[8] |= RTCP_ENCRYPTION_FLAG;
        aad
    }
}

impl Cipher for CipherAeadAesGcm {
    fn rtp_auth_tag_len(&self) -> usize {
        self.profile.rtp_auth_tag_len()
    }

    fn rtcp_auth_tag_len(&self) -> usize {
        self.profile.rtcp_auth_tag_len()
    }

    fn aead_auth_tag_len(&self) -> usize {
        self.profile.aead_auth_tag_len()
    }

    fn encrypt_rtp(
        &mut self,
        plaintext: &[u8],
        header: &rtp::header::Header,
        roc: u32,
    ) -> Result<Bytes> {
        // The AAD is the entire serialized header, extensions included.
        let header_len = header.marshal_size();
        let mut writer =
            BytesMut::with_capacity(plaintext.len() + self.aead_auth_tag_len());

        writer.extend_from_slice(&plaintext[..header_len]);

        let nonce = self.rtp_initialization_vector(header, roc);
        let encrypted = self.srtp_cipher.encrypt(
            &nonce,
            Payload {
                msg: &plaintext[header_len..],
                aad: &writer,
            },
        )?;

        writer.extend(encrypted);
        Ok(writer.freeze())
    }

    fn decrypt_rtp(
        &mut self,
        ciphertext: &[u8],
        header: &rtp::header::Header,
        roc: u32,
    ) -> Result<Bytes> {
        if ciphertext.len() < self.aead_auth_tag_len() {
            return Err(Error::FailedToVerifyAuthTag);
        }

        let nonce = self.rtp_initialization_vector(header, roc);
        let payload_offset = header.marshal_size();
        let decrypted = self.srtp_cipher.decrypt(
            &nonce,
            Payload {
                msg: &ciphertext[payload_offset..],
                aad: &ciphertext[..payload_offset],
            },
        )?;

        let mut writer = BytesMut::with_capacity(payload_offset + decrypted.len());
        writer.extend_from_slice(&ciphertext[..payload_offset]);
        writer.extend(decrypted);
        Ok(writer.freeze())
    }

    fn encrypt_rtcp(&mut self, plaintext: &[u8], srtcp_index: usize, ssrc: u32) -> Result<Bytes> {
        if plaintext.len() < 8 {
            return Err(Error::TooShortRtcp);
        }
        let iv = self.rtcp_initialization_vector(srtcp_index, ssrc);
        let aad = self.rtcp_additional_authenticated_data(plaintext, srtcp_index);

        let encrypted = self.srtcp_cipher.encrypt(
            &iv,
            Payload {
                msg: &plaintext[8..],
                aad: &aad,
            },
        )?;

        let mut writer = BytesMut::with_capacity(8 + encrypted.len() + SRTCP_INDEX_SIZE);
        writer.extend_from_slice(&plaintext[..8]);
        writer.extend(encrypted);
        writer.put_slice(&aad[8..]);
        Ok(writer.freeze())
    }

    fn decrypt_rtcp(&mut self, ciphertext: &[u8], srtcp_index: usize, ssrc: u32) -> Result<Bytes> {
        if ciphertext.len() < 8 + self.aead_auth_tag_len() + SRTCP_INDEX_SIZE {
            return Err(Error::FailedToVerifyAuthTag);
        }

        let nonce = self.rtcp_initialization_vector(srtcp_index, ssrc);
        let aad = self.rtcp_additional_authenticated_data(ciphertext, srtcp_index);

        let decrypted = self.srtcp_cipher.decrypt(
            &nonce,
            Payload {
                msg: &ciphertext[8..ciphertext.len() - SRTCP_INDEX_SIZE],
                aad: &aad,
            },
        )?;

        let mut writer = BytesMut::with_capacity(8 + decrypted.len());
        writer.extend_from_slice(&ciphertext[..8]);
        writer.extend(decrypted);
        Ok(writer.freeze())
    }

    fn get_rtcp_index(&self, input: &[u8]) -> usize {
        let pos = input.len() - 4;
        let val = u32::from_be_bytes([input[pos], input[pos + 1], input[pos + 2], input[pos + 3]]);
        (val & !((RTCP_ENCRYPTION_FLAG as u32) << 24)) as usize
    }
}
