//! Wire-format structs and enums for the DTLS-PSK record and handshake
//! layers. Split out of `dtls-core` the way `rustyguard-types` is split
//! out of `rustyguard-core`: the codec has no business knowing about
//! sessions, peers, or key material, so it lives in its own crate with
//! its own (tiny) dependency footprint.
//!
//! Fixed-size headers use `zerocopy` derives directly over the wire
//! bytes, following `rustyguard-crypto`'s `HandshakeInit`/`HandshakeResp`
//! pattern. Variable-length bodies (hello messages, key exchange) are
//! hand-decoded since zerocopy has no notion of length-prefixed fields.

#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod body;
mod header;

pub use body::{
    ClientHello, ClientKeyExchange, DecodeError, Finished, HelloVerifyRequest, ServerHello,
    ServerHelloDone,
};
pub use header::{HandshakeHeader, RecordHeader, HANDSHAKE_HEADER_LEN, RECORD_HEADER_LEN};

/// DTLS protocol version, wire-encoded as the one's complement of the
/// notional "1.x" version the way TLS/DTLS always has been.
pub const DTLS_1_0: u16 = 0xfeff;
pub const DTLS_1_2: u16 = 0xfefd;

pub const COOKIE_LENGTH: usize = 16;
pub const COOKIE_SECRET_LENGTH: usize = 12;
pub const RANDOM_LENGTH: usize = 32;
pub const MASTER_SECRET_LENGTH: usize = 48;
pub const VERIFY_DATA_LENGTH: usize = 12;

/// Record-layer content types (spec.md §4.1). Any other byte value is a
/// decode error the caller treats as "drop this record", not a protocol
/// violation worth alerting over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            20 => Self::ChangeCipherSpec,
            21 => Self::Alert,
            22 => Self::Handshake,
            23 => Self::ApplicationData,
            _ => return None,
        })
    }
}

/// Handshake message types. The PSK-only profile in scope here only ever
/// encodes/decodes the six variants named in spec.md §4.1; the rest of
/// the RFC's enumeration is kept so the decoder can recognize (and
/// reject as `UnexpectedMessage`) certificate-flow messages rather than
/// silently misparsing them as something else. Grounded in
/// `original_source/dtls.h`'s `DTLS_HT_*` constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    HelloVerifyRequest = 3,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
}

impl HandshakeType {
    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            0 => Self::HelloRequest,
            1 => Self::ClientHello,
            2 => Self::ServerHello,
            3 => Self::HelloVerifyRequest,
            11 => Self::Certificate,
            12 => Self::ServerKeyExchange,
            13 => Self::CertificateRequest,
            14 => Self::ServerHelloDone,
            15 => Self::CertificateVerify,
            16 => Self::ClientKeyExchange,
            20 => Self::Finished,
            _ => return None,
        })
    }
}

/// `level=0 code>=256` internal events vs `level>0 code<256` alerts, per
/// spec.md §6's `event` callback contract and `original_source/dtls.h`'s
/// `dtls_alert_level_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertLevel {
    Warning = 1,
    Fatal = 2,
}

/// The subset of TLS/DTLS alert descriptions this handshake flow can
/// raise. Supplements spec.md §4.1's unenumerated "six alert-descriptions
/// relevant to handshake flow" with the concrete set from
/// `original_source/dtls.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertDescription {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    HandshakeFailure = 40,
    DecryptError = 51,
    InternalError = 80,
}

/// `dtls_key_t`'s tag from the original source. Only `Psk` is implemented
/// by the handshake engine (certificate/raw-public-key auth is an
/// explicit Non-goal); kept as a two-armed enum so a `RawPublicKey`
/// lookup result surfaces as a clear `KeyNotFound` rather than vanishing
/// into an `Option` with no explanation. See DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Psk,
    RawPublicKey,
}

/// 256 internal "event" codes, distinguished from alert codes by level=0.
pub mod event {
    pub const CONNECTED: u16 = 256;
    pub const CLOSED: u16 = 257;
}
