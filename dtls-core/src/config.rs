use std::time::Duration;

use crate::error::DtlsError;

/// IANA-registered identifier for `TLS_PSK_WITH_AES_128_CCM_8` (RFC
/// 6655) — the sole cipher suite in scope (spec.md §6).
pub const CIPHER_SUITE_PSK_AES_128_CCM_8: u16 = 0xC0A8;

pub const NULL_COMPRESSION: u8 = 0x00;

/// A PSK identity/key pair, as handed back by [`PskStore::lookup`].
#[derive(Clone)]
pub struct Psk {
    pub identity: Vec<u8>,
    pub key: Vec<u8>,
}

/// The `get_key`/`lookup-key` callback of spec.md §6, generalized into a
/// trait object rather than a bare function pointer: `dtls_handler_t` in
/// the original is a struct of raw C function pointers, but spec.md's
/// contract ("when key-id is absent, return the local identity and key
/// to offer; when present, return the key matching that peer identity")
/// is naturally a small trait with two distinct call shapes, which reads
/// better in Rust than one function overloaded on an `Option`.
pub trait PskStore: Send + Sync {
    /// Called by a connecting client with no `identity`: return the
    /// local identity/key this context should offer.
    fn local_identity(&self) -> Psk;

    /// Called by a server (or a resuming client) with the peer-claimed
    /// PSK identity: return the matching key, or `None` if unknown.
    fn lookup(&self, identity: &[u8]) -> Option<Vec<u8>>;
}

/// An in-memory reference [`PskStore`] for tests and the bundled
/// example — spec.md §6 explicitly scopes the real PSK store out
/// ("Persisted state: none. The PSK store is a collaborator concern.").
pub struct StaticPskStore {
    local: Psk,
}

impl StaticPskStore {
    pub fn new(identity: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            local: Psk {
                identity: identity.into(),
                key: key.into(),
            },
        }
    }
}

impl PskStore for StaticPskStore {
    fn local_identity(&self) -> Psk {
        self.local.clone()
    }

    fn lookup(&self, identity: &[u8]) -> Option<Vec<u8>> {
        if identity == self.local.identity.as_slice() {
            Some(self.local.key.clone())
        } else {
            None
        }
    }
}

/// Context-wide configuration and timing policy. Spec.md names default
/// values for cookie rotation (§4.5, "default 5 minutes") and the
/// bad-record threshold (§4.4, "default 5"); both are overridable here
/// via [`ConfigBuilder`], following the explicit value-struct style of
/// `rustyguard-crypto::StaticPeerConfig`/`StaticInitiatorConfig` rather
/// than a global default baked into the state machine.
pub struct Config {
    pub psk_store: Box<dyn PskStore>,
    pub cookie_rotation_interval: Duration,
    pub bad_record_threshold: u32,
    pub protocol_version: u16,
}

impl Config {
    pub fn builder(psk_store: impl PskStore + 'static) -> ConfigBuilder {
        ConfigBuilder {
            psk_store: Box::new(psk_store),
            cookie_rotation_interval: Duration::from_secs(5 * 60),
            bad_record_threshold: 5,
            protocol_version: dtls_types::DTLS_1_2,
        }
    }
}

pub struct ConfigBuilder {
    psk_store: Box<dyn PskStore>,
    cookie_rotation_interval: Duration,
    bad_record_threshold: u32,
    protocol_version: u16,
}

impl ConfigBuilder {
    pub fn cookie_rotation_interval(mut self, d: Duration) -> Self {
        self.cookie_rotation_interval = d;
        self
    }

    pub fn bad_record_threshold(mut self, n: u32) -> Self {
        self.bad_record_threshold = n;
        self
    }

    pub fn protocol_version(mut self, v: u16) -> Self {
        self.protocol_version = v;
        self
    }

    pub fn build(self) -> Result<Config, DtlsError> {
        if self.protocol_version != dtls_types::DTLS_1_0 && self.protocol_version != dtls_types::DTLS_1_2 {
            return Err(DtlsError::UnsupportedVersion);
        }
        Ok(Config {
            psk_store: self.psk_store,
            cookie_rotation_interval: self.cookie_rotation_interval,
            bad_record_threshold: self.bad_record_threshold,
            protocol_version: self.protocol_version,
        })
    }
}
