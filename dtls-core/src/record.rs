//! Record Layer (spec.md §4.4): turns a cleartext fragment into a wire
//! record and back, given a set of [`SecurityParams`] and the peer's
//! current epoch/sequence counters. The anti-replay window itself lives
//! on [`crate::peer::Peer`] since it's per-read-epoch state, not a
//! property of the keys.

use dtls_crypto::KeyBlock;
use dtls_types::{RecordHeader, RECORD_HEADER_LEN};

use crate::error::DtlsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// One slot of "Security Parameters" (spec.md §3): the keys and randoms
/// negotiated for one epoch. A peer holds two of these — current and
/// pending — selected by a one-bit index, per the data model.
pub struct SecurityParams {
    pub cipher_suite: u16,
    pub compression: u8,
    pub master_secret: [u8; dtls_crypto::MASTER_SECRET_LENGTH],
    pub client_random: [u8; dtls_crypto::RANDOM_LENGTH],
    pub server_random: [u8; dtls_crypto::RANDOM_LENGTH],
    pub key_block: KeyBlock,
}

impl SecurityParams {
    pub fn derive(
        cipher_suite: u16,
        pre_master_secret: &[u8],
        client_random: [u8; dtls_crypto::RANDOM_LENGTH],
        server_random: [u8; dtls_crypto::RANDOM_LENGTH],
    ) -> Self {
        let master_secret = dtls_crypto::master_secret(pre_master_secret, &client_random, &server_random);
        let key_block = KeyBlock::derive(&master_secret, &client_random, &server_random);
        Self {
            cipher_suite,
            compression: crate::config::NULL_COMPRESSION,
            master_secret,
            client_random,
            server_random,
            key_block,
        }
    }

    fn write_key_iv(&self, role: Role) -> (&[u8; dtls_crypto::ENC_KEY_LEN], &[u8; dtls_crypto::FIXED_IV_LEN]) {
        match role {
            Role::Client => (self.key_block.client_write_key(), self.key_block.client_write_iv()),
            Role::Server => (self.key_block.server_write_key(), self.key_block.server_write_iv()),
        }
    }

    fn other(role: Role) -> Role {
        match role {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

/// Builds authenticated-additional-data the way RFC 6347/RFC 6655 define
/// it for a DTLS AEAD record: `epoch(2) || sequence(6) || content_type(1)
/// || version(2) || fragment_length(2)`, 13 bytes total. `fragment_len`
/// is the on-wire ciphertext length (plaintext length plus the 8-byte
/// CCM tag, since this suite has no block padding).
fn build_aad(content_type: u8, version: u16, epoch: u16, sequence: u64, fragment_len: u16) -> [u8; 13] {
    let mut aad = [0u8; 13];
    aad[0..2].copy_from_slice(&epoch.to_be_bytes());
    aad[2..8].copy_from_slice(&sequence.to_be_bytes()[2..]);
    aad[8] = content_type;
    aad[9..11].copy_from_slice(&version.to_be_bytes());
    aad[11..13].copy_from_slice(&fragment_len.to_be_bytes());
    aad
}

/// Protects `plaintext`, appending the wire record (header + ciphertext
/// + tag) to `out`. Caller owns epoch/sequence bookkeeping and overflow
/// checks (spec.md §4.4: "on sequence overflow the peer must be closed
/// with an internal error" is a `RecordLayer`/`Peer` concern, not this
/// function's).
pub fn protect(
    params: &SecurityParams,
    role: Role,
    content_type: u8,
    version: u16,
    epoch: u16,
    sequence: u64,
    plaintext: &[u8],
    out: &mut Vec<u8>,
) -> Result<(), DtlsError> {
    let (key, iv) = params.write_key_iv(role);
    let tag_len = dtls_crypto::TAG_LEN;
    let fragment_len = (plaintext.len() + tag_len) as u16;
    let aad = build_aad(content_type, version, epoch, sequence, fragment_len);

    let header = RecordHeader::new(content_type, version, epoch, sequence, fragment_len);
    out.extend_from_slice(zerocopy::AsBytes::as_bytes(&header));

    let mut body = plaintext.to_vec();
    let tag = dtls_crypto::seal(key, iv, epoch, sequence, &aad, &mut body);
    out.extend_from_slice(&body);
    out.extend_from_slice(&tag);
    Ok(())
}

/// Parses and decrypts one record from the front of `buf`, returning the
/// cleartext payload and the number of bytes consumed. Any malformed
/// header is a [`DtlsError::MalformedRecord`] the caller drops silently
/// per spec.md §7 — this function never panics on untrusted length
/// fields.
pub fn unprotect(
    params: &SecurityParams,
    role: Role,
    buf: &[u8],
) -> Result<(Vec<u8>, &RecordHeader, usize), DtlsError> {
    use zerocopy::FromBytes;

    if buf.len() < RECORD_HEADER_LEN {
        return Err(DtlsError::MalformedRecord);
    }
    let header = RecordHeader::ref_from_prefix(buf).ok_or(DtlsError::MalformedRecord)?;
    let fragment_len = header.length.get() as usize;
    let total_len = RECORD_HEADER_LEN + fragment_len;
    if buf.len() < total_len {
        return Err(DtlsError::MalformedRecord);
    }
    if fragment_len < dtls_crypto::TAG_LEN {
        return Err(DtlsError::MalformedRecord);
    }

    let sequence = header.sequence.get();
    let epoch = header.epoch.get();
    let content_type = header.content_type;
    let version = header.version.get();

    let aad = build_aad(content_type, version, epoch, sequence, fragment_len as u16);

    let ciphertext_len = fragment_len - dtls_crypto::TAG_LEN;
    let (key, iv) = params.write_key_iv(SecurityParams::other(role));

    let body = &buf[RECORD_HEADER_LEN..total_len];
    let mut plaintext = body[..ciphertext_len].to_vec();
    let tag: [u8; dtls_crypto::TAG_LEN] = body[ciphertext_len..]
        .try_into()
        .map_err(|_| DtlsError::MalformedRecord)?;

    dtls_crypto::open(key, iv, epoch, sequence, &aad, &mut plaintext, &tag)?;

    Ok((plaintext, header, total_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SecurityParams {
        SecurityParams::derive(
            crate::config::CIPHER_SUITE_PSK_AES_128_CCM_8,
            b"pre-master",
            [1u8; 32],
            [2u8; 32],
        )
    }

    #[test]
    fn protect_unprotect_round_trip() {
        let p = params();
        let mut wire = Vec::new();
        protect(&p, Role::Client, 23, 0xfefd, 1, 7, b"application data", &mut wire).unwrap();

        let (plaintext, header, consumed) = unprotect(&p, Role::Server, &wire).unwrap();
        assert_eq!(plaintext, b"application data");
        assert_eq!(header.epoch.get(), 1);
        assert_eq!(header.sequence.get(), 7);
        assert_eq!(consumed, wire.len());
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let p = params();
        let mut wire = Vec::new();
        protect(&p, Role::Client, 23, 0xfefd, 1, 7, b"application data", &mut wire).unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0xff;
        assert!(unprotect(&p, Role::Server, &wire).is_err());
    }

    #[test]
    fn truncated_length_field_is_rejected_not_panicking() {
        let p = params();
        let mut wire = Vec::new();
        protect(&p, Role::Client, 23, 0xfefd, 1, 7, b"hi", &mut wire).unwrap();
        let truncated = &wire[..wire.len() - 3];
        assert!(matches!(unprotect(&p, Role::Server, truncated), Err(DtlsError::MalformedRecord)));
    }
}
