#![no_std]

//! Crypto Kit (spec.md §4.2): HMAC/PRF key derivation, AES-128-CCM-8
//! record protection, and the cookie MAC used for DoS admission control.
//! Treated as a black box by the record layer and handshake engine — no
//! hidden state, no allocation beyond caller-supplied scratch, mirroring
//! `rustyguard-crypto`'s "pure functions over `StaticPeerConfig`-style
//! value structs" shape. The hash/PRF primitives differ from the
//! teacher's (HMAC-SHA256 instead of Blake2s, no Noise chaining key)
//! because the in-scope cipher suite is `TLS_PSK_WITH_AES_128_CCM_8`,
//! not a Noise construction — see SPEC_FULL.md §4.2 and DESIGN.md.

extern crate alloc;

mod prim;

use ccm::aead::{AeadInPlace, KeyInit};
use ccm::consts::{U12, U8};
use ccm::Ccm;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use dtls_types::{COOKIE_LENGTH, MASTER_SECRET_LENGTH, RANDOM_LENGTH, VERIFY_DATA_LENGTH};

pub const ENC_KEY_LEN: usize = 16;
pub const FIXED_IV_LEN: usize = 4;
pub const EXPLICIT_NONCE_LEN: usize = 8; // epoch(2) || sequence(6)
pub const NONCE_LEN: usize = FIXED_IV_LEN + EXPLICIT_NONCE_LEN;
pub const TAG_LEN: usize = 8;
pub const KEY_BLOCK_LEN: usize = 2 * (ENC_KEY_LEN + FIXED_IV_LEN);

type Aes128Ccm8 = Ccm<aes::Aes128, U8, U12>;

#[derive(Debug, PartialEq, Eq)]
pub enum CryptoError {
    /// AEAD open failed: bad MAC/tag, or CCM rejected the input shape.
    /// Deliberately carries no detail — spec.md §7 treats this as a
    /// silent-drop condition and a chatty error would be an oracle.
    DecryptionError,
    /// A Finished verify-data mismatch (constant-time compared).
    VerifyMismatch,
}

/// `hmac(key, message) -> 32 bytes` (spec.md §4.2).
pub fn hmac(key: &[u8], msg: &[u8]) -> [u8; 32] {
    prim::hmac(key, msg)
}

/// `prf(secret, label, seed, out)` implementing P_SHA256 expansion
/// (spec.md §4.2): `out = T(1) || T(2) || ...`.
pub fn prf(secret: &[u8], label: &[u8], seed: &[u8], out: &mut [u8]) {
    // P_hash's own seed is `label || seed`; build it on the caller's
    // behalf so every call site (master secret, key block, Finished)
    // reads as a direct transcription of the RFC formula.
    let mut labeled_seed = [0u8; 256];
    let total = label.len() + seed.len();
    assert!(total <= labeled_seed.len(), "label||seed exceeds scratch size");
    labeled_seed[..label.len()].copy_from_slice(label);
    labeled_seed[label.len()..total].copy_from_slice(seed);
    prim::p_sha256(secret, &labeled_seed[..total], out);
}

/// `master = PRF(pre_master, "master secret", client_random || server_random, 48)`.
pub fn master_secret(pre_master: &[u8], client_random: &[u8; 32], server_random: &[u8; 32]) -> [u8; MASTER_SECRET_LENGTH] {
    let mut seed = [0u8; 64];
    seed[..32].copy_from_slice(client_random);
    seed[32..].copy_from_slice(server_random);
    let mut out = [0u8; MASTER_SECRET_LENGTH];
    prf(pre_master, b"master secret", &seed, &mut out);
    out
}

/// The PSK-mode pre-master secret (RFC 4279 §2): `uint16(len(psk)) ||
/// zeros(len(psk)) || uint16(len(psk)) || psk`. There is no DH
/// contribution for a pure-PSK cipher suite.
pub fn psk_pre_master_secret(psk: &[u8], out: &mut alloc::vec::Vec<u8>) {
    let n = psk.len() as u16;
    out.extend_from_slice(&n.to_be_bytes());
    out.extend(core::iter::repeat(0u8).take(psk.len()));
    out.extend_from_slice(&n.to_be_bytes());
    out.extend_from_slice(psk);
}

/// Derived traffic keys, partitioned in the order spec.md §4.3 names:
/// `(client-key, server-key, client-IV, server-IV)`. The suite in scope
/// (`TLS_PSK_WITH_AES_128_CCM_8`) is an AEAD suite, so unlike the
/// generic "two MAC keys" language in spec.md §3's data model, this key
/// block carries no separate MAC keys — CCM folds authentication into
/// the cipher. See DESIGN.md for this Open Question's resolution.
#[derive(ZeroizeOnDrop)]
pub struct KeyBlock {
    bytes: [u8; KEY_BLOCK_LEN],
}

impl KeyBlock {
    pub fn derive(master: &[u8], client_random: &[u8; 32], server_random: &[u8; 32]) -> Self {
        let mut seed = [0u8; 64];
        seed[..32].copy_from_slice(server_random);
        seed[32..].copy_from_slice(client_random);
        let mut bytes = [0u8; KEY_BLOCK_LEN];
        prf(master, b"key expansion", &seed, &mut bytes);
        Self { bytes }
    }

    pub fn client_write_key(&self) -> &[u8; ENC_KEY_LEN] {
        self.bytes[0..ENC_KEY_LEN].try_into().unwrap()
    }
    pub fn server_write_key(&self) -> &[u8; ENC_KEY_LEN] {
        self.bytes[ENC_KEY_LEN..2 * ENC_KEY_LEN].try_into().unwrap()
    }
    pub fn client_write_iv(&self) -> &[u8; FIXED_IV_LEN] {
        self.bytes[2 * ENC_KEY_LEN..2 * ENC_KEY_LEN + FIXED_IV_LEN]
            .try_into()
            .unwrap()
    }
    pub fn server_write_iv(&self) -> &[u8; FIXED_IV_LEN] {
        self.bytes[2 * ENC_KEY_LEN + FIXED_IV_LEN..]
            .try_into()
            .unwrap()
    }
}

/// `PRF(master, "client finished" | "server finished", hash(transcript), 12)`.
pub fn finished_verify_data(master: &[u8], is_client: bool, transcript_hash: &[u8; 32]) -> [u8; VERIFY_DATA_LENGTH] {
    let label: &[u8] = if is_client { b"client finished" } else { b"server finished" };
    let mut out = [0u8; VERIFY_DATA_LENGTH];
    prf(master, label, transcript_hash, &mut out);
    out
}

/// Constant-time Finished verification (spec.md §4.3: "mismatch raises
/// decrypt-error alert").
pub fn verify_finished(expected: &[u8; VERIFY_DATA_LENGTH], received: &[u8]) -> Result<(), CryptoError> {
    if received.len() != VERIFY_DATA_LENGTH || expected.ct_eq(received).unwrap_u8() == 0 {
        return Err(CryptoError::VerifyMismatch);
    }
    Ok(())
}

fn build_nonce(fixed_iv: &[u8; FIXED_IV_LEN], epoch: u16, sequence: u64) -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    nonce[..FIXED_IV_LEN].copy_from_slice(fixed_iv);
    nonce[FIXED_IV_LEN..FIXED_IV_LEN + 2].copy_from_slice(&epoch.to_be_bytes());
    nonce[FIXED_IV_LEN + 2..].copy_from_slice(&sequence.to_be_bytes()[2..]);
    nonce
}

/// Seals `plaintext` (in place) for `TLS_PSK_WITH_AES_128_CCM_8`,
/// returning the 8-byte tag. `aad` is the record header's authenticated
/// fields (content type, version, epoch, sequence, length) per spec.md
/// §4.4.
pub fn seal(
    key: &[u8; ENC_KEY_LEN],
    fixed_iv: &[u8; FIXED_IV_LEN],
    epoch: u16,
    sequence: u64,
    aad: &[u8],
    plaintext: &mut [u8],
) -> [u8; TAG_LEN] {
    let nonce = build_nonce(fixed_iv, epoch, sequence);
    let cipher = Aes128Ccm8::new(key.into());
    let tag = cipher
        .encrypt_in_place_detached((&nonce).into(), aad, plaintext)
        .expect("plaintext fits within CCM's size limit");
    tag.into()
}

/// Opens `ciphertext` (in place), verifying `tag`. On any failure the
/// record must be dropped silently (spec.md §4.4, §7) — this returns a
/// bare [`CryptoError`] rather than anything that could leak why.
pub fn open(
    key: &[u8; ENC_KEY_LEN],
    fixed_iv: &[u8; FIXED_IV_LEN],
    epoch: u16,
    sequence: u64,
    aad: &[u8],
    ciphertext: &mut [u8],
    tag: &[u8; TAG_LEN],
) -> Result<(), CryptoError> {
    let nonce = build_nonce(fixed_iv, epoch, sequence);
    let cipher = Aes128Ccm8::new(key.into());
    cipher
        .decrypt_in_place_detached((&nonce).into(), aad, ciphertext, tag.into())
        .map_err(|_| CryptoError::DecryptionError)
}

/// `HMAC(cookie_secret, identity || client_random)` truncated to 16
/// bytes (spec.md §4.5). `identity` is the caller's already-serialized
/// Session Identity bytes.
#[derive(Default, Zeroize, ZeroizeOnDrop)]
pub struct CookieSecret {
    key: [u8; dtls_types::COOKIE_SECRET_LENGTH],
}

impl CookieSecret {
    pub fn generate(&mut self, rng: &mut (impl rand_core::CryptoRng + rand_core::RngCore)) {
        rng.fill_bytes(&mut self.key);
    }

    pub fn cookie(&self, identity: &[u8], client_random: &[u8]) -> [u8; COOKIE_LENGTH] {
        let digest = hmac(&self.key, &[identity, client_random].concat());
        digest[..COOKIE_LENGTH].try_into().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_secret_and_finished_are_deterministic() {
        let psk = b"secret";
        let mut pre_master = alloc::vec::Vec::new();
        psk_pre_master_secret(psk, &mut pre_master);

        let cr = [1u8; 32];
        let sr = [2u8; 32];
        let m1 = master_secret(&pre_master, &cr, &sr);
        let m2 = master_secret(&pre_master, &cr, &sr);
        assert_eq!(m1, m2);

        let hash = [9u8; 32];
        let v1 = finished_verify_data(&m1, true, &hash);
        let v2 = finished_verify_data(&m1, true, &hash);
        assert_eq!(v1, v2);
        assert!(verify_finished(&v1, &v2).is_ok());

        let server_side = finished_verify_data(&m1, false, &hash);
        assert_ne!(v1, server_side);
    }

    #[test]
    fn seal_open_round_trip_and_tamper_detection() {
        let key = [5u8; ENC_KEY_LEN];
        let iv = [6u8; FIXED_IV_LEN];
        let aad = b"record-header";
        let mut buf = *b"hello world, this is plaintext!";

        let tag = seal(&key, &iv, 1, 42, aad, &mut buf);
        let mut decrypted = buf;
        open(&key, &iv, 1, 42, aad, &mut decrypted, &tag).unwrap();
        assert_eq!(&decrypted, b"hello world, this is plaintext!");

        let mut tampered = buf;
        tampered[0] ^= 0x01;
        assert!(open(&key, &iv, 1, 42, aad, &mut tampered, &tag).is_err());
    }

    #[test]
    fn cookie_is_stable_and_keyed() {
        let mut secret_a = CookieSecret::default();
        let mut secret_b = CookieSecret::default();
        secret_a.key = [1; dtls_types::COOKIE_SECRET_LENGTH];
        secret_b.key = [2; dtls_types::COOKIE_SECRET_LENGTH];

        let identity = b"198.51.100.1:5555";
        let random = [3u8; 32];

        assert_eq!(secret_a.cookie(identity, &random), secret_a.cookie(identity, &random));
        assert_ne!(secret_a.cookie(identity, &random), secret_b.cookie(identity, &random));
    }
}
