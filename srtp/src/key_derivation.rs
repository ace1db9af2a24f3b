#[cfg(test)]
mod key_derivation_test {
    use super::*;

    #[test]
    fn test_kdf_output_lengths() {
        let master_key = [0x0Du8; 16];
        let master_salt = [0x22u8; 14];
        let key = aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, &master_key, &master_salt, 0, 16)
            .unwrap();
        assert_eq!(key.len(), 16);
        let salt =
            aes_cm_key_derivation(LABEL_SRTP_SALT, &master_key, &master_salt, 0, 14).unwrap();
        assert_eq!(salt.len(), 14);
        let auth = aes_cm_key_derivation(
            LABEL_SRTP_AUTHENTICATION_TAG,
            &master_key,
            &master_salt,
            0,
            20,
        )
        .unwrap();
        assert_eq!(auth.len(), 20);
    }

    #[test]
    fn test_kdf_labels_diverge() {
        let master_key = [0x0Du8; 16];
        let master_salt = [0x22u8; 14];
        let enc = aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, &master_key, &master_salt, 0, 16)
            .unwrap();
        let srtcp =
            aes_cm_key_derivation(LABEL_SRTCP_ENCRYPTION, &master_key, &master_salt, 0, 16)
                .unwrap();
        assert_ne!(enc, srtcp);
    }

    #[test]
    fn test_kdf_deterministic() {
        let master_key = [0x5Au8; 16];
        let master_salt = [0xA5u8; 14];
        let a = aes_cm_key_derivation(LABEL_SRTP_SALT, &master_key, &master_salt, 0, 14).unwrap();
        let b = aes_cm_key_derivation(LABEL_SRTP_SALT, &master_key, &master_salt, 0, 14).unwrap();
        assert_eq!(a, b);
    }
}

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256};

use crate::error::{Error, Result};

pub const LABEL_SRTP_ENCRYPTION: u8 = 0x00;
pub const LABEL_SRTP_AUTHENTICATION_TAG: u8 = 0x01;
pub const LABEL_SRTP_SALT: u8 = 0x02;
pub const LABEL_SRTCP_ENCRYPTION: u8 = 0x03;
pub const LABEL_SRTCP_AUTHENTICATION_TAG: u8 = 0x04;
pub const LABEL_SRTCP_SALT: u8 = 0x05;

// aes_cm_key_derivation is the AES-CM PRF of RFC 3711 §4.3: the key id
// (label and index) is XOR-ed into the master salt and the result used as
// an AES counter-mode nonce over the master key.
pub(crate) fn aes_cm_key_derivation(
    label: u8,
    master_key: &[u8],
    master_salt: &[u8],
    index_over_kdr: u64,
    out_len: usize,
) -> Result<Vec<u8>> {
    if index_over_kdr != 0 {
        // The key derivation rate is assumed to be zero.
        return Err(Error::UnsupportedIndexOverKdr);
    }

    let mut nonce = [0u8; 16];
    nonce[..master_salt.len()].copy_from_slice(master_salt);
    nonce[7] ^= label;

    let n_blocks = (out_len + 15) / 16;
    let mut out = vec![0u8; n_blocks * 16];

    enum Kdf {
        Aes128(Box<Aes128>),
        Aes256(Box<Aes256>),
    }
    let kdf = match master_key.len() {
        16 => Kdf::Aes128(Box::new(Aes128::new_from_slice(master_key).map_err(
            |_| Error::SrtpMasterKeyLength(16, master_key.len()),
        )?)),
        32 => Kdf::Aes256(Box::new(Aes256::new_from_slice(master_key).map_err(
            |_| Error::SrtpMasterKeyLength(32, master_key.len()),
        )?)),
        other => return Err(Error::SrtpMasterKeyLength(16, other)),
    };

    for (i, chunk) in out.chunks_exact_mut(16).enumerate() {
        let mut block = nonce;
        block[14..16].copy_from_slice(&(i as u16).to_be_bytes());
        let ga = aes::cipher::generic_array::GenericArray::from_mut_slice(&mut block);
        match &kdf {
            Kdf::Aes128(c) => c.encrypt_block(ga),
            Kdf::Aes256(c) => c.encrypt_block(ga),
        }
        chunk.copy_from_slice(&block);
    }

    out.truncate(out_len);
    Ok(out)
}

// generate_counter builds the AES-CM packet IV: the session salt shifted
// left 16 bits, XOR-ed with the SSRC at bit 64 and the 48-bit packet
// index at bit 16 (RFC 3711 §4.1.1).
pub(crate) fn generate_counter(
    sequence_number: u16,
    rollover_counter: u32,
    ssrc: u32,
    session_salt: &[u8],
) -> [u8; 16] {
    let mut counter = [0u8; 16];
    counter[4..8].copy_from_slice(&ssrc.to_be_bytes());
    counter[8..12].copy_from_slice(&rollover_counter.to_be_bytes());
    counter[12..14].copy_from_slice(&sequence_number.to_be_bytes());

    for (i, s) in session_salt.iter().enumerate() {
        counter[i] ^= s;
    }
    counter
}
