pub mod cipher_aead_aes_gcm;
pub mod cipher_aes_cm_hmac_sha1;

use bytes::Bytes;

use crate::error::Result;

// Cipher is the pluggable packet protection: AES-CM with HMAC-SHA1 tags
// or AEAD AES-GCM. One instance lives per context and is reused for every
// packet; only the nonce changes.
pub(crate) trait Cipher {
    fn rtp_auth_tag_len(&self) -> usize;
    fn rtcp_auth_tag_len(&self) -> usize;
    fn aead_auth_tag_len(&self) -> usize;

    fn encrypt_rtp(
        &mut self,
        plaintext: &[u8],
        header: &rtp::header::Header,
        roc: u32,
    ) -> Result<Bytes>;

    fn decrypt_rtp(
        &mut self,
        ciphertext: &[u8],
        header: &rtp::header::Header,
        roc: u32,
    ) -> Result<Bytes>;

    fn encrypt_rtcp(&mut self, plaintext: &[u8], srtcp_index: usize, ssrc: u32) -> Result<Bytes>;

    fn decrypt_rtcp(&mut self, ciphertext: &[u8], srtcp_index: usize, ssrc: u32) -> Result<Bytes>;

    // get_rtcp_index reads the 31-bit SRTCP index from the packet tail.
    fn get_rtcp_index(&self, input: &[u8]) -> usize;
}
