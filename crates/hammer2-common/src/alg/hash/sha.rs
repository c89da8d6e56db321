use sha2::{Digest, Sha256};

/// SHA-192 check code: SHA-256 of the input with the fourth 64-bit word
/// folded into the third, truncated to the first 24 bytes.
pub fn sha192(data: &[u8]) -> [u8; 24] {
    let digest = Sha256::digest(data);
    let mut words = [0u8; 32];
    words.copy_from_slice(&digest);

    let w2 = u64::from_ne_bytes(words[16..24].try_into().unwrap());
    let w3 = u64::from_ne_bytes(words[24..32].try_into().unwrap());
    words[16..24].copy_from_slice(&(w2 ^ w3).to_ne_bytes());

    let mut out = [0u8; 24];
    out.copy_from_slice(&words[..24]);
    out
}
