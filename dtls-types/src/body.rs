//! Variable-length handshake body codecs. These can't be plain zerocopy
//! structs (session id, cookie, cipher suite list, and PSK identity are
//! all length-prefixed byte strings), so each type hand-rolls `decode`
//! (borrowing from the input buffer, no allocation) and `encode_into`
//! (writing into a caller buffer, returning bytes written) — the same
//! "no allocation, caller owns the buffer" contract spec.md §4.1 asks
//! for on the fixed-size headers, extended to the variable-size bodies.

use alloc::vec::Vec;

use crate::RANDOM_LENGTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    Truncated,
    TooLong,
}

fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8], DecodeError> {
    if buf.len() < n {
        return Err(DecodeError::Truncated);
    }
    let (head, rest) = buf.split_at(n);
    *buf = rest;
    Ok(head)
}

fn take_u8(buf: &mut &[u8]) -> Result<u8, DecodeError> {
    Ok(take(buf, 1)?[0])
}

fn take_u16(buf: &mut &[u8]) -> Result<u16, DecodeError> {
    let b = take(buf, 2)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

/// Reads a `u8`-length-prefixed byte string.
fn take_vec8<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = take_u8(buf)? as usize;
    take(buf, len)
}

/// Reads a `u16`-length-prefixed byte string.
fn take_vec16<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = take_u16(buf)? as usize;
    take(buf, len)
}

fn put_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}
fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}
fn put_vec8(out: &mut Vec<u8>, data: &[u8]) {
    out.push(data.len() as u8);
    out.extend_from_slice(data);
}
fn put_vec16(out: &mut Vec<u8>, data: &[u8]) {
    put_u16(out, data.len() as u16);
    out.extend_from_slice(data);
}

/// `ClientHello.random || session_id || cookie || cipher_suites ||
/// compression_methods`. No extensions: PSK identity travels in
/// `ClientKeyExchange`, not a `ClientHello` extension, per RFC 4279.
#[derive(Debug, Clone)]
pub struct ClientHello<'a> {
    pub client_version: u16,
    pub random: [u8; RANDOM_LENGTH],
    pub session_id: &'a [u8],
    pub cookie: &'a [u8],
    pub cipher_suites: &'a [u8],
    pub compression_methods: &'a [u8],
}

impl<'a> ClientHello<'a> {
    pub fn decode(mut buf: &'a [u8]) -> Result<Self, DecodeError> {
        let client_version = take_u16(&mut buf)?;
        let random = take(&mut buf, RANDOM_LENGTH)?
            .try_into()
            .map_err(|_| DecodeError::Truncated)?;
        let session_id = take_vec8(&mut buf)?;
        let cookie = take_vec8(&mut buf)?;
        let cipher_suites = take_vec16(&mut buf)?;
        let compression_methods = take_vec8(&mut buf)?;
        Ok(Self {
            client_version,
            random,
            session_id,
            cookie,
            cipher_suites,
            compression_methods,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        put_u16(out, self.client_version);
        out.extend_from_slice(&self.random);
        put_vec8(out, self.session_id);
        put_vec8(out, self.cookie);
        put_vec16(out, self.cipher_suites);
        put_vec8(out, self.compression_methods);
    }

    /// Iterates the two-byte cipher suite identifiers.
    pub fn cipher_suite_iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.cipher_suites
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
    }
}

#[derive(Debug, Clone)]
pub struct ServerHello<'a> {
    pub server_version: u16,
    pub random: [u8; RANDOM_LENGTH],
    pub session_id: &'a [u8],
    pub cipher_suite: u16,
    pub compression_method: u8,
}

impl<'a> ServerHello<'a> {
    pub fn decode(mut buf: &'a [u8]) -> Result<Self, DecodeError> {
        let server_version = take_u16(&mut buf)?;
        let random = take(&mut buf, RANDOM_LENGTH)?
            .try_into()
            .map_err(|_| DecodeError::Truncated)?;
        let session_id = take_vec8(&mut buf)?;
        let cipher_suite = take_u16(&mut buf)?;
        let compression_method = take_u8(&mut buf)?;
        Ok(Self {
            server_version,
            random,
            session_id,
            cipher_suite,
            compression_method,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        put_u16(out, self.server_version);
        out.extend_from_slice(&self.random);
        put_vec8(out, self.session_id);
        put_u16(out, self.cipher_suite);
        put_u8(out, self.compression_method);
    }
}

#[derive(Debug, Clone)]
pub struct HelloVerifyRequest<'a> {
    pub server_version: u16,
    pub cookie: &'a [u8],
}

impl<'a> HelloVerifyRequest<'a> {
    pub fn decode(mut buf: &'a [u8]) -> Result<Self, DecodeError> {
        let server_version = take_u16(&mut buf)?;
        let cookie = take_vec8(&mut buf)?;
        Ok(Self {
            server_version,
            cookie,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        put_u16(out, self.server_version);
        put_vec8(out, self.cookie);
    }
}

/// Empty handshake body.
#[derive(Debug, Clone, Copy)]
pub struct ServerHelloDone;

impl ServerHelloDone {
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if !buf.is_empty() {
            return Err(DecodeError::TooLong);
        }
        Ok(Self)
    }

    pub fn encode(&self, _out: &mut Vec<u8>) {}
}

/// RFC 4279 PSK key exchange: just the PSK identity hint the client
/// claims, with no DH public value (PSK-only cipher suite).
#[derive(Debug, Clone)]
pub struct ClientKeyExchange<'a> {
    pub psk_identity: &'a [u8],
}

impl<'a> ClientKeyExchange<'a> {
    pub fn decode(mut buf: &'a [u8]) -> Result<Self, DecodeError> {
        let psk_identity = take_vec16(&mut buf)?;
        Ok(Self { psk_identity })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        put_vec16(out, self.psk_identity);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Finished {
    pub verify_data: [u8; crate::VERIFY_DATA_LENGTH],
}

impl Finished {
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let verify_data = buf.try_into().map_err(|_| DecodeError::Truncated)?;
        Ok(Self { verify_data })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.verify_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_hello_round_trip() {
        let ch = ClientHello {
            client_version: 0xfefd,
            random: [7; RANDOM_LENGTH],
            session_id: &[],
            cookie: &[1, 2, 3],
            cipher_suites: &[0xc0, 0xa8],
            compression_methods: &[0],
        };
        let mut buf = Vec::new();
        ch.encode(&mut buf);
        let parsed = ClientHello::decode(&buf).unwrap();
        assert_eq!(parsed.client_version, 0xfefd);
        assert_eq!(parsed.cookie, &[1, 2, 3]);
        assert_eq!(parsed.cipher_suite_iter().collect::<Vec<_>>(), vec![0xc0a8]);
    }

    #[test]
    fn truncated_client_hello_errors() {
        let buf = [0u8; 4];
        assert_eq!(ClientHello::decode(&buf), Err(DecodeError::Truncated));
    }

    #[test]
    fn server_hello_done_rejects_trailing_bytes() {
        assert_eq!(ServerHelloDone::decode(&[1]), Err(DecodeError::TooLong));
        assert!(ServerHelloDone::decode(&[]).is_ok());
    }
}
