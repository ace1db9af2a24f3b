#[cfg(test)]
mod prf_test {
    use super::*;

    #[test]
    fn test_p_hash_deterministic_and_length() {
        let secret = [0x0Bu8; 16];
        let seed = b"test seed";
        let a = p_hash(&secret, seed, 48).unwrap();
        let b = p_hash(&secret, seed, 48).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 48);
        // Prefix property: shorter output is a prefix of longer output.
        let c = p_hash(&secret, seed, 20).unwrap();
        assert_eq!(&a[..20], &c[..]);
    }

    #[test]
    fn test_master_secret_depends_on_all_inputs() {
        let pre = [1u8; 32];
        let cr = [2u8; 32];
        let sr = [3u8; 32];
        let a = prf_master_secret(&pre, &cr, &sr).unwrap();
        assert_eq!(a.len(), 48);
        let b = prf_master_secret(&pre, &sr, &cr).unwrap();
        assert_ne!(a, b, "random order matters");
    }

    #[test]
    fn test_key_expansion_lengths() {
        let master = [7u8; 48];
        let keys = prf_encryption_keys(&master, &[1u8; 32], &[2u8; 32], 16, 4).unwrap();
        assert_eq!(keys.client_write_key.len(), 16);
        assert_eq!(keys.server_write_key.len(), 16);
        assert_eq!(keys.client_write_iv.len(), 4);
        assert_eq!(keys.server_write_iv.len(), 4);
        assert_ne!(keys.client_write_key, keys.server_write_key);
    }

    #[test]
    fn test_verify_data_is_12_bytes() {
        let master = [9u8; 48];
        let transcript = b"handshake messages";
        let client = prf_verify_data_client(&master, transcript).unwrap();
        let server = prf_verify_data_server(&master, transcript).unwrap();
        assert_eq!(client.len(), VERIFY_DATA_LEN);
        assert_eq!(server.len(), VERIFY_DATA_LEN);
        assert_ne!(client, server, "labels separate the directions");
    }

    #[test]
    fn test_exporter_matches_both_sides() {
        // The exporter is deterministic in (master, label, randoms), so
        // both ends derive identical SRTP keys.
        let master = [5u8; 48];
        let cr = [1u8; 32];
        let sr = [2u8; 32];
        let a = prf_export_keying_material(&master, "EXTRACTOR-dtls_srtp", &cr, &sr, 60).unwrap();
        let b = prf_export_keying_material(&master, "EXTRACTOR-dtls_srtp", &cr, &sr, 60).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 60);
    }
}

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

pub(crate) const MASTER_SECRET_LABEL: &[u8] = b"master secret";
pub(crate) const EXTENDED_MASTER_SECRET_LABEL: &[u8] = b"extended master secret";
pub(crate) const KEY_EXPANSION_LABEL: &[u8] = b"key expansion";
pub(crate) const VERIFY_DATA_CLIENT_LABEL: &[u8] = b"client finished";
pub(crate) const VERIFY_DATA_SERVER_LABEL: &[u8] = b"server finished";

pub(crate) const MASTER_SECRET_LEN: usize = 48;
pub(crate) const VERIFY_DATA_LEN: usize = 12;

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| Error::Crypto(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

// p_hash is the TLS 1.2 P_SHA256 expansion (RFC 5246 §5).
pub(crate) fn p_hash(secret: &[u8], seed: &[u8], requested_length: usize) -> Result<Vec<u8>> {
    let mut last_round = seed.to_vec();
    let mut out = vec![];

    let iterations = (requested_length + 31) / 32;
    for _ in 0..iterations {
        last_round = hmac_sha256(secret, &last_round)?;
        let mut with_secret = last_round.clone();
        with_secret.extend_from_slice(seed);
        out.extend_from_slice(&hmac_sha256(secret, &with_secret)?);
    }

    out.truncate(requested_length);
    Ok(out)
}

// prf_master_secret computes the classic master secret.
pub(crate) fn prf_master_secret(
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<Vec<u8>> {
    let mut seed = MASTER_SECRET_LABEL.to_vec();
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    p_hash(pre_master_secret, &seed, MASTER_SECRET_LEN)
}

// prf_extended_master_secret binds the master secret to the session hash
// (RFC 7627).
pub(crate) fn prf_extended_master_secret(
    pre_master_secret: &[u8],
    session_hash: &[u8],
) -> Result<Vec<u8>> {
    let mut seed = EXTENDED_MASTER_SECRET_LABEL.to_vec();
    seed.extend_from_slice(session_hash);
    p_hash(pre_master_secret, &seed, MASTER_SECRET_LEN)
}

pub(crate) struct EncryptionKeys {
    pub(crate) client_write_key: Vec<u8>,
    pub(crate) server_write_key: Vec<u8>,
    pub(crate) client_write_iv: Vec<u8>,
    pub(crate) server_write_iv: Vec<u8>,
}

// prf_encryption_keys expands the key block; GCM suites have no MAC keys.
pub(crate) fn prf_encryption_keys(
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    key_len: usize,
    iv_len: usize,
) -> Result<EncryptionKeys> {
    let mut seed = KEY_EXPANSION_LABEL.to_vec();
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    let material = p_hash(master_secret, &seed, 2 * key_len + 2 * iv_len)?;
    let mut o = 0;
    let client_write_key = material[o..o + key_len].to_vec();
    o += key_len;
    let server_write_key = material[o..o + key_len].to_vec();
    o += key_len;
    let client_write_iv = material[o..o + iv_len].to_vec();
    o += iv_len;
    let server_write_iv = material[o..o + iv_len].to_vec();

    Ok(EncryptionKeys {
        client_write_key,
        server_write_key,
        client_write_iv,
        server_write_iv,
    })
}

fn prf_verify_data(label: &[u8], master_secret: &[u8], transcript: &[u8]) -> Result<Vec<u8>> {
    let mut hasher = Sha256::new();
    hasher.update(transcript);
    let transcript_hash = hasher.finalize();

    let mut seed = label.to_vec();
    seed.extend_from_slice(&transcript_hash);
    p_hash(master_secret, &seed, VERIFY_DATA_LEN)
}

pub(crate) fn prf_verify_data_client(master_secret: &[u8], transcript: &[u8]) -> Result<Vec<u8>> {
    prf_verify_data(VERIFY_DATA_CLIENT_LABEL, master_secret, transcript)
}

pub(crate) fn prf_verify_data_server(master_secret: &[u8], transcript: &[u8]) -> Result<Vec<u8>> {
    prf_verify_data(VERIFY_DATA_SERVER_LABEL, master_secret, transcript)
}

// prf_export_keying_material implements the RFC 5705 exporter without
// context, as used by DTLS-SRTP (RFC 5764 §4.2).
pub(crate) fn prf_export_keying_material(
    master_secret: &[u8],
    label: &str,
    client_random: &[u8],
    server_random: &[u8],
    length: usize,
) -> Result<Vec<u8>> {
    let mut seed = label.as_bytes().to_vec();
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    p_hash(master_secret, &seed, length)
}

// session_hash hashes the handshake transcript for EMS.
pub(crate) fn session_hash(transcript: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(transcript);
    hasher.finalize().to_vec()
}
