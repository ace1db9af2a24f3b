use bytes::Bytes;
use util::replay_detector::ReplayDetector;

use super::Context;
use crate::error::{Error, Result};
use crate::option::MAX_SRTCP_INDEX;

impl Context {
    // decrypt_rtcp authenticates and decrypts an inbound SRTCP packet.
    // The explicit 31-bit index at the packet tail drives the replay
    // window; state commits only after the tag verifies.
    pub fn decrypt_rtcp(&mut self, encrypted: &[u8]) -> Result<Bytes> {
        if encrypted.len() < 8 {
            return Err(Error::TooShortRtcp);
        }

        let index = self.cipher.get_rtcp_index(encrypted);
        let ssrc = u32::from_be_bytes([encrypted[4], encrypted[5], encrypted[6], encrypted[7]]);

        {
            let state = self.get_srtcp_ssrc_state(ssrc);
            if let Some(detector) = &mut state.replay_detector {
                if !detector.check(index as u64) {
                    return Err(Error::DuplicatedPacket);
                }
            }
        }

        let dst = self.cipher.decrypt_rtcp(encrypted, index, ssrc)?;

        let state = self.get_srtcp_ssrc_state(ssrc);
        if let Some(detector) = &mut state.replay_detector {
            detector.accept();
        }

        Ok(dst)
    }

    // encrypt_rtcp protects an outbound RTCP compound packet. The SRTCP
    // index increments strictly per sender SSRC.
    pub fn encrypt_rtcp(&mut self, plaintext: &[u8]) -> Result<Bytes> {
        if plaintext.len() < 8 {
            return Err(Error::TooShortRtcp);
        }

        let ssrc = u32::from_be_bytes([plaintext[4], plaintext[5], plaintext[6], plaintext[7]]);

        let index = {
            let state = self.get_srtcp_ssrc_state(ssrc);
            state.srtcp_index += 1;
            if state.srtcp_index > MAX_SRTCP_INDEX {
                state.srtcp_index = 0;
            }
            state.srtcp_index
        };

        self.cipher.encrypt_rtcp(plaintext, index, ssrc)
    }
}
