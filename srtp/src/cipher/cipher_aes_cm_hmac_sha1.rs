use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes128;
use bytes::{BufMut, Bytes, BytesMut};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use util::marshal::MarshalSize;

use super::Cipher;
use crate::error::{Error, Result};
use crate::key_derivation::*;
use crate::protection_profile::ProtectionProfile;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type HmacSha1 = Hmac<Sha1>;

pub(crate) const SRTCP_INDEX_SIZE: usize = 4;

// CipherAesCmHmacSha1 implements the AES-128 counter mode transform with
// HMAC-SHA1 authentication tags (RFC 3711 §4).
pub(crate) struct CipherAesCmHmacSha1 {
    profile: ProtectionProfile,

    srtp_session_key: Vec<u8>,
    srtp_session_salt: Vec<u8>,
    srtp_session_auth: HmacSha1,

    srtcp_session_key: Vec<u8>,
    srtcp_session_salt: Vec<u8>,
    srtcp_session_auth: HmacSha1,
}

impl CipherAesCmHmacSha1 {
    pub(crate) fn new(
        profile: ProtectionProfile,
        master_key: &[u8],
        master_salt: &[u8],
    ) -> Result<Self> {
        let srtp_session_key = aes_cm_key_derivation(
            LABEL_SRTP_ENCRYPTION,
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
        let srtp_session_auth_tag = aes_cm_key_derivation(
            LABEL_SRTP_AUTHENTICATION_TAG,
            master_key,
            master_salt,
            0,
            profile.auth_key_len(),
        )?;

        let srtcp_session_key = aes_cm_key_derivation(
            LABEL_SRTCP_ENCRYPTION,
            master_key,
            master_salt,
            0,
            master_key.len(),
        )?;
        let srtcp_session_salt = aes_cm_key_derivation(
            LABEL_SRTCP_SALT,
            master_key,
            master_salt,
            0,
            master_salt.len(),
        )?;
        let srtcp_session_auth_tag = aes_cm_key_derivation(
            LABEL_SRTCP_AUTHENTICATION_TAG,
            master_key,
            master_salt,
            0,
            profile.auth_key_len(),
        )?;

        let srtp_session_auth = HmacSha1::new_from_slice(&srtp_session_auth_tag)
            .map_err(|e| Error::Other(e.to_string()))?;
        let srtcp_session_auth = HmacSha1::new_from_slice(&srtcp_session_auth_tag)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(CipherAesCmHmacSha1 {
            profile,
            srtp_session_key,
            srtp_session_salt,
            srtp_session_auth,
            srtcp_session_key,
            srtcp_session_salt,
            srtcp_session_auth,
        })
    }

    // generate_srtp_auth_tag computes the truncated HMAC over
    // header || ciphertext || ROC.
    fn generate_srtp_auth_tag(&mut self, buf: &[u8], roc: u32) -> Vec<u8> {
        let mut auth = self.srtp_session_auth.clone();
        auth.update(buf);
        auth.update(&roc.to_be_bytes());
        let tag = auth.finalize().into_bytes();
        tag[..self.profile.rtp_auth_tag_len()].to_vec()
    }

    fn generate_srtcp_auth_tag(&mut self, buf: &[u8]) -> Vec<u8> {
        let mut auth = self.srtcp_session_auth.clone();
        auth.update(buf);
        let tag = auth.finalize().into_bytes();
        tag[..self.profile.rtcp_auth_tag_len()].to_vec()
    }
}

impl Cipher for CipherAesCmHmacSha1 {
    fn rtp_auth_tag_len(&self) -> usize {
        self.profile.rtp_auth_tag_len()
    }

    fn rtcp_auth_tag_len(&self) -> usize {
        self.profile.rtcp_auth_tag_len()
    }

    fn aead_auth_tag_len(&self) -> usize {
        0
    }

    fn encrypt_rtp(
        &mut self,
        plaintext: &[u8],
        header: &rtp::header::Header,
        roc: u32,
    ) -> Result<Bytes> {
        let header_len = header.marshal_size();
        let mut writer = BytesMut::with_capacity(plaintext.len() + self.rtp_auth_tag_len());

        // Copy the header unencrypted, encrypt the payload in counter mode.
        writer.extend_from_slice(plaintext);
        let counter = generate_counter(
            header.sequence_number,
            roc,
            header.ssrc,
            &self.srtp_session_salt,
        );
        let mut stream = Aes128Ctr::new_from_slices(&self.srtp_session_key, &counter)
            .map_err(|e| Error::Other(e.to_string()))?;
        stream.apply_keystream(&mut writer[header_len..]);

        let tag = self.generate_srtp_auth_tag(&writer, roc);
        writer.put_slice(&tag);

        Ok(writer.freeze())
    }

    fn decrypt_rtp(
        &mut self,
        ciphertext: &[u8],
        header: &rtp::header::Header,
        roc: u32,
    ) -> Result<Bytes> {
        let tag_len = self.rtp_auth_tag_len();
        if ciphertext.len() < tag_len {
            return Err(Error::TooShortRtp);
        }
        let cipher_len = ciphertext.len() - tag_len;
        let header_len = header.marshal_size();
        if cipher_len < header_len {
            return Err(Error::TooShortRtp);
        }

        // Verify the tag before touching any state.
        let expected = self.generate_srtp_auth_tag(&ciphertext[..cipher_len], roc);
        let actual = &ciphertext[cipher_len..];
        if !bool::from(actual.ct_eq(&expected)) {
            return Err(Error::FailedToVerifyAuthTag);
        }

        let mut writer = BytesMut::with_capacity(cipher_len);
        writer.extend_from_slice(&ciphertext[..cipher_len]);
        let counter = generate_counter(
            header.sequence_number,
            roc,
            header.ssrc,
            &self.srtp_session_salt,
        );
        let mut stream = Aes128Ctr::new_from_slices(&self.srtp_session_key, &counter)
            .map_err(|e| Error::Other(e.to_string()))?;
        stream.apply_keystream(&mut writer[header_len..]);

        Ok(writer.freeze())
    }

    fn encrypt_rtcp(&mut self, plaintext: &[u8], srtcp_index: usize, ssrc: u32) -> Result<Bytes> {
        if plaintext.len() < 8 {
            return Err(Error::TooShortRtcp);
        }
        let mut writer =
            BytesMut::with_capacity(plaintext.len() + SRTCP_INDEX_SIZE + self.rtcp_auth_tag_len());
        writer.extend_from_slice(plaintext);

        let counter = generate_counter(
            (srtcp_index & 0xFFFF) as u16,
            (srtcp_index >> 16) as u32,
            ssrc,
            &self.srtcp_session_salt,
        );
        let mut stream = Aes128Ctr::new_from_slices(&self.srtcp_session_key, &counter)
            .map_err(|e| Error::Other(e.to_string()))?;
        stream.apply_keystream(&mut writer[8..]);

        // E-bit plus 31-bit index, then the tag over everything before it.
        writer.put_u32(0x8000_0000 | srtcp_index as u32);
        let tag = self.generate_srtcp_auth_tag(&writer);
        writer.put_slice(&tag);

        Ok(writer.freeze())
    }

    fn decrypt_rtcp(&mut self, ciphertext: &[u8], srtcp_index: usize, ssrc: u32) -> Result<Bytes> {
        let tag_len = self.rtcp_auth_tag_len();
        if ciphertext.len() < 8 + SRTCP_INDEX_SIZE + tag_len {
            return Err(Error::TooShortRtcp);
        }

        let tail_offset = ciphertext.len() - (tag_len + SRTCP_INDEX_SIZE);
        let expected = self.generate_srtcp_auth_tag(&ciphertext[..ciphertext.len() - tag_len]);
        let actual = &ciphertext[ciphertext.len() - tag_len..];
        if !bool::from(actual.ct_eq(&expected)) {
            return Err(Error::FailedToVerifyAuthTag);
        }

        let is_encrypted = ciphertext[tail_offset] >> 7 != 0;
        let mut writer = BytesMut::with_capacity(tail_offset);
        writer.extend_from_slice(&ciphertext[..tail_offset]);
        if is_encrypted {
            let counter = generate_counter(
                (srtcp_index & 0xFFFF) as u16,
                (srtcp_index >> 16) as u32,
                ssrc,
                &self.srtcp_session_salt,
            );
            let mut stream = Aes128Ctr::new_from_slices(&self.srtcp_session_key, &counter)
                .map_err(|e| Error::Other(e.to_string()))?;
            stream.apply_keystream(&mut writer[8..]);
        }

        Ok(writer.freeze())
    }

    fn get_rtcp_index(&self, input: &[u8]) -> usize {
        let tag_len = self.rtcp_auth_tag_len();
        let pos = input.len() - (tag_len + SRTCP_INDEX_SIZE);
        let val = u32::from_be_bytes([input[pos], input[pos + 1], input[pos + 2], input[pos + 3]]);
        (val & !0x8000_0000) as usize
    }
}
