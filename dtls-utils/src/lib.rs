//! Small, dependency-light pieces shared by the wire codec, crypto kit,
//! and peer table. Kept separate from `dtls-types` and `dtls-crypto` the
//! way `rustyguard-utils` is kept separate from `rustyguard-crypto`: none
//! of this needs to know about sessions, keys, or the wire format.

mod replay;
mod uint;

pub use replay::ReplayWindow;
pub use uint::{U24, U48};

use core::hash::{BuildHasher, Hasher};

use ahash::RandomState;
use rand_core::{CryptoRng, RngCore};

/// A [`BuildHasher`] seeded from context-local randomness rather than a
/// fixed or process-global key.
///
/// Mirrors `lu-zero-rustyguard`'s `SipHasher24` `BuildHasher`, keyed from
/// `Sessions::random_secret` so an attacker who can cause hash collisions
/// in the peer table cannot do so without first guessing that secret.
/// This crate swaps siphasher for `ahash`'s keyed state because
/// `dtls-utils` already depends on `ahash` for other map-adjacent needs
/// and pulling in a second hashing crate for the same purpose would be
/// redundant.
#[derive(Clone)]
pub struct KeyedHashState(RandomState);

impl KeyedHashState {
    pub fn new(rng: &mut (impl CryptoRng + RngCore)) -> Self {
        let keys: [u64; 4] = core::array::from_fn(|_| rng.next_u64());
        Self(RandomState::with_seeds(keys[0], keys[1], keys[2], keys[3]))
    }
}

impl BuildHasher for KeyedHashState {
    type Hasher = ahash::AHasher;

    fn build_hasher(&self) -> Self::Hasher {
        self.0.build_hasher()
    }
}

/// Trivial non-cryptographic fold, used only for test scaffolding where a
/// [`KeyedHashState`] would be overkill (e.g. ordering assertions).
pub fn fold_u64(bytes: &[u8]) -> u64 {
    let mut h = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    h.write(bytes);
    h.finish()
}
