use bytes::Bytes;
use util::marshal::Unmarshal;
use util::replay_detector::ReplayDetector;

use super::Context;
use crate::error::{Error, Result};

impl Context {
    // decrypt_rtp_with_header decrypts an SRTP packet whose header has
    // already been parsed. State (ROC, replay window) is committed only
    // after the authentication tag verifies.
    pub fn decrypt_rtp_with_header(
        &mut self,
        encrypted: &[u8],
        header: &rtp::header::Header,
    ) -> Result<Bytes> {
        let (guess_roc, diff) = {
            let state = self.get_srtp_ssrc_state(header.ssrc);
            let (guess_roc, diff) = state.next_rollover_count(header.sequence_number);
            if let Some(detector) = &mut state.replay_detector {
                if !detector.check(header.sequence_number as u64) {
                    return Err(Error::DuplicatedPacket);
                }
            }
            (guess_roc, diff)
        };

        let dst = self.cipher.decrypt_rtp(encrypted, header, guess_roc)?;

        let state = self.get_srtp_ssrc_state(header.ssrc);
        if let Some(detector) = &mut state.replay_detector {
            detector.accept();
        }
        state.update_rollover_count(header.sequence_number, diff);

        Ok(dst)
    }

    // decrypt_rtp parses and decrypts an inbound SRTP packet.
    pub fn decrypt_rtp(&mut self, encrypted: &[u8]) -> Result<Bytes> {
        let mut buf = encrypted;
        let header = rtp::header::Header::unmarshal(&mut buf)?;
        self.decrypt_rtp_with_header(encrypted, &header)
    }

    // encrypt_rtp_with_header protects an outbound packet. The packet
    // index increases strictly monotonically per SSRC.
    pub fn encrypt_rtp_with_header(
        &mut self,
        plaintext: &[u8],
        header: &rtp::header::Header,
    ) -> Result<Bytes> {
        let roc = {
            let state = self.get_srtp_ssrc_state(header.ssrc);
            let (roc, diff) = state.next_rollover_count(header.sequence_number);
            state.update_rollover_count(header.sequence_number, diff);
            roc
        };

        self.cipher.encrypt_rtp(plaintext, header, roc)
    }

    // encrypt_rtp parses the header out of plaintext and protects the
    // packet.
    pub fn encrypt_rtp(&mut self, plaintext: &[u8]) -> Result<Bytes> {
        let mut buf = plaintext;
        let header = rtp::header::Header::unmarshal(&mut buf)?;
        self.encrypt_rtp_with_header(plaintext, &header)
    }
}

impl Context {
    pub(crate) fn rtp_auth_tag_len(&self) -> usize {
        self.cipher.rtp_auth_tag_len()
    }

    pub(crate) fn rtp_aead_auth_tag_len(&self) -> usize {
        self.cipher.aead_auth_tag_len()
    }
}
