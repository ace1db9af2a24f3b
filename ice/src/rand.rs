use rand::Rng;

const RUNES_ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const RUNES_CANDIDATE_ID: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890+/";

fn random_string(runes: &[u8], n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| runes[rng.gen_range(0..runes.len())] as char)
        .collect()
}

// generate_ufrag returns a 16-character ice-ufrag (the RFC 8445 minimum
// is 4).
pub fn generate_ufrag() -> String {
    random_string(RUNES_ALPHA, 16)
}

// generate_pwd returns a 32-character ice-pwd (the minimum is 22).
pub fn generate_pwd() -> String {
    random_string(RUNES_ALPHA, 32)
}

pub fn generate_cand_id() -> String {
    format!("candidate:{}", random_string(RUNES_CANDIDATE_ID, 24))
}
