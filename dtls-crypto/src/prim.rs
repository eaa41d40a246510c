//! Bare cryptographic primitives: HMAC-SHA256 and the P_SHA256 expansion
//! built from it. Kept in their own module the way `rustyguard-crypto`
//! keeps its Blake2s/HKDF primitives under `mod prim` — callers go
//! through `lib.rs` for anything protocol-shaped.

use hmac::{Hmac, Mac as _};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const HASH_LEN: usize = 32;

/// `HMAC(key, message) -> 32 bytes`, spec.md §4.2.
pub fn hmac(key: &[u8], msg: &[u8]) -> [u8; HASH_LEN] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

fn hmac_multi(key: &[u8], parts: &[&[u8]]) -> [u8; HASH_LEN] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

/// `P_SHA256(secret, seed, out_len)` per spec.md §4.2:
/// `out = T(1) || T(2) || ...`, `T(i) = HMAC(secret, A(i) || seed)`,
/// `A(0) = seed`, `A(i) = HMAC(secret, A(i-1))`.
///
/// `seed` here is already `label || seed` as the PRF definition requires
/// the caller to concatenate; `prf` in `lib.rs` does that concatenation
/// so this function stays a direct transcription of P_hash.
pub fn p_sha256(secret: &[u8], seed: &[u8], out: &mut [u8]) {
    let mut a = hmac(secret, seed);
    let mut written = 0;
    while written < out.len() {
        let t = hmac_multi(secret, &[&a, seed]);
        let take = (out.len() - written).min(HASH_LEN);
        out[written..written + take].copy_from_slice(&t[..take]);
        written += take;
        a = hmac(secret, &a);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p_sha256_is_deterministic_and_length_exact() {
        let mut a = [0u8; 50];
        let mut b = [0u8; 50];
        p_sha256(b"secret", b"seed", &mut a);
        p_sha256(b"secret", b"seed", &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn p_sha256_changes_with_secret() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        p_sha256(b"secret1", b"seed", &mut a);
        p_sha256(b"secret2", b"seed", &mut b);
        assert_ne!(a, b);
    }
}
