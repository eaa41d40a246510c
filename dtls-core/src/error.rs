use thiserror::Error;

/// The nine error kinds named in spec.md §7. `dtls-crypto`'s bare
/// `CryptoError` wraps into this via `#[from]` so call sites keep
/// propagating with `?`, but note that `CryptoError`'s own `Display` is
/// intentionally terse (spec.md §7: "never acknowledged, never alerted —
/// giving no oracle"). Logging this error is fine; logging *why* a MAC
/// failed byte-for-byte would not be.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DtlsError {
    #[error("malformed record")]
    MalformedRecord,
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    #[error("unexpected message for current handshake phase")]
    UnexpectedMessage,
    #[error("MAC verification failed")]
    BadMac,
    #[error("replayed or out-of-window sequence number")]
    Replay,
    #[error("handshake failure")]
    HandshakeFailure,
    #[error("internal error")]
    InternalError,
    #[error("peer is closed")]
    Closed,
    #[error("no key found for the requested identity")]
    KeyNotFound,
}

impl From<dtls_crypto::CryptoError> for DtlsError {
    fn from(e: dtls_crypto::CryptoError) -> Self {
        match e {
            dtls_crypto::CryptoError::DecryptionError => DtlsError::BadMac,
            dtls_crypto::CryptoError::VerifyMismatch => DtlsError::HandshakeFailure,
        }
    }
}

impl From<dtls_types::body::DecodeError> for DtlsError {
    fn from(_: dtls_types::body::DecodeError) -> Self {
        DtlsError::MalformedRecord
    }
}
