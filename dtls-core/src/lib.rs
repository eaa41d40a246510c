//! Peer Table & Dispatch (spec.md §4.5) plus the public context API
//! (spec.md §6). `Context` owns everything a single-threaded event loop
//! needs: the peer table, the cookie secrets, and the collaborator's
//! callbacks — mirroring `rustyguard-core`'s `Sessions` struct, which
//! bundles the peer map, RNG, and config behind one owner the same way.

pub mod config;
pub mod cookie;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod peer;
pub mod record;

use std::collections::HashMap;
use std::sync::Once;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_core::RngCore;

use dtls_types::{AlertDescription, ContentType, RecordHeader, RECORD_HEADER_LEN};
use zerocopy::FromBytes;

pub use config::{Config, ConfigBuilder, Psk, PskStore, StaticPskStore};
pub use error::DtlsError;
pub use identity::SessionId;
pub use peer::{Peer, Phase};

static INIT: Once = Once::new();

/// Idempotent process-wide bootstrap (spec.md §6, §9: "once-semantics
/// are the caller's responsibility"). Nothing here is actually
/// version-gated today; it exists as the stable entry point the
/// original's `dtls_init()` occupies, and a natural place to hook a
/// process-wide crypto backend self-test in the future.
pub fn init() {
    INIT.call_once(|| {
        tracing::debug!("dtls-core initialized");
    });
}

/// The four callbacks of spec.md §6, gathered into one trait object
/// rather than a struct of function pointers (`dtls_handler_t` in the
/// original) — Rust's trait objects are the natural fit for "a capability
/// set supplied at context creation" (spec.md §9).
pub trait Handlers {
    /// Returns the number of bytes accepted, or an error on failure.
    /// The core never retries; failure propagates to the caller of the
    /// operation that triggered the send.
    fn transmit(&mut self, identity: SessionId, bytes: &[u8]) -> Result<usize, DtlsError>;

    /// Called once per successfully decrypted application-data record,
    /// in receive order.
    fn deliver(&mut self, identity: SessionId, cleartext: &[u8]);

    /// `level=0, code>=256` for internal events; `level>0, code<256` for
    /// protocol alerts.
    fn event(&mut self, identity: SessionId, level: u8, code: u16);
}

/// Session/Peer Table & Dispatch context (spec.md §3, §4.5, §6). Owns
/// every peer exclusively — a peer never holds a shared mutable handle
/// back to its context (spec.md §9's "cyclic references are ownership
/// relations").
pub struct Context {
    config: Config,
    handlers: Box<dyn Handlers>,
    peers: HashMap<SessionId, Peer, dtls_utils::KeyedHashState>,
    cookie_secrets: cookie::CookieSecrets,
    rng: StdRng,
}

impl Context {
    pub fn new(config: Config, handlers: Box<dyn Handlers>) -> Self {
        init();
        let mut rng = StdRng::from_entropy();
        let hash_state = dtls_utils::KeyedHashState::new(&mut rng);
        let cookie_secrets = cookie::CookieSecrets::new(&mut rng, config.cookie_rotation_interval);
        Self {
            config,
            handlers,
            peers: HashMap::with_hasher(hash_state),
            cookie_secrets,
            rng,
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// `connect(identity)` (spec.md §6): client side, begins a new
    /// handshake toward `identity`.
    pub fn connect(&mut self, identity: SessionId) -> Result<(), DtlsError> {
        if self.peers.contains_key(&identity) {
            return Err(DtlsError::HandshakeFailure);
        }
        let mut peer = Peer::new(identity, record::Role::Client);
        let outcome = handshake::client_connect(&mut peer, &self.config, &mut self.rng)?;
        self.peers.insert(identity, peer);
        self.apply_outcome(identity, outcome)
    }

    /// `write(identity, bytes)` (spec.md §6): sends application data
    /// over an established peer.
    pub fn write(&mut self, identity: SessionId, bytes: &[u8]) -> Result<(), DtlsError> {
        let peer = self.peers.get_mut(&identity).ok_or(DtlsError::Closed)?;
        if peer.phase != Phase::Connected {
            return Err(DtlsError::Closed);
        }
        let params = peer.current_params().ok_or(DtlsError::InternalError)?;
        let (epoch, sequence) = peer.next_outbound_sequence().ok_or(DtlsError::InternalError)?;
        let mut wire = Vec::new();
        record::protect(
            params,
            peer.role,
            ContentType::ApplicationData as u8,
            self.config.protocol_version,
            epoch,
            sequence,
            bytes,
            &mut wire,
        )?;
        self.handlers.transmit(identity, &wire)?;
        Ok(())
    }

    /// `close(identity)` (spec.md §6, §5): begins the closing handshake.
    /// `reset` semantics (forcible teardown with no close-notify) are
    /// just dropping the peer from the table, which this also does once
    /// the close-notify alert has been sent.
    pub fn close(&mut self, identity: SessionId) -> Result<(), DtlsError> {
        let peer = self.peers.get_mut(&identity).ok_or(DtlsError::Closed)?;
        if matches!(peer.phase, Phase::Closed | Phase::Closing) {
            return Ok(());
        }
        peer.phase = Phase::Closing;
        if let Some(params) = peer.current_params() {
            let (epoch, sequence) = peer.next_outbound_sequence().ok_or(DtlsError::InternalError)?;
            let body = [AlertDescription::CloseNotify as u8];
            let mut wire = Vec::new();
            record::protect(
                params,
                peer.role,
                ContentType::Alert as u8,
                self.config.protocol_version,
                epoch,
                sequence,
                &body,
                &mut wire,
            )?;
            self.handlers.transmit(identity, &wire)?;
        }
        self.peers.remove(&identity);
        self.handlers.event(identity, 0, dtls_types::event::CLOSED);
        Ok(())
    }

    /// Forcibly destroys peer state with no protocol exchange
    /// (spec.md §5's `reset()`).
    pub fn reset(&mut self, identity: SessionId) {
        self.peers.remove(&identity);
    }

    pub fn needs_retransmit(&self, identity: SessionId, now: Instant) -> bool {
        self.peers
            .get(&identity)
            .is_some_and(|p| p.needs_retransmit(now))
    }

    pub fn flight_retransmit(&mut self, identity: SessionId) -> Result<(), DtlsError> {
        let datagrams = self
            .peers
            .get(&identity)
            .map(|p| p.flight_current().to_vec())
            .unwrap_or_default();
        for d in &datagrams {
            self.handlers.transmit(identity, d)?;
        }
        Ok(())
    }

    /// `handle_message(identity, bytes)` (spec.md §4.5, §6): the
    /// top-level dispatch entry point. Loops over one or more
    /// back-to-back records in the datagram; a fatal error on one
    /// record stops processing the rest.
    pub fn handle_message(&mut self, identity: SessionId, mut bytes: &[u8]) -> Result<(), DtlsError> {
        self.cookie_secrets.maybe_rotate(Instant::now(), &mut self.rng);

        while !bytes.is_empty() {
            let consumed = match self.handle_one_record(identity, bytes) {
                Ok(n) => n,
                Err(DtlsError::MalformedRecord) => return Ok(()),
                Err(e) => return Err(e),
            };
            if consumed == 0 || consumed > bytes.len() {
                break;
            }
            bytes = &bytes[consumed..];
        }
        Ok(())
    }

    fn handle_one_record(&mut self, identity: SessionId, buf: &[u8]) -> Result<usize, DtlsError> {
        if buf.len() < RECORD_HEADER_LEN {
            return Err(DtlsError::MalformedRecord);
        }
        let header = RecordHeader::ref_from_prefix(buf).ok_or(DtlsError::MalformedRecord)?;
        let fragment_len = header.length.get() as usize;
        let total_len = RECORD_HEADER_LEN + fragment_len;
        if buf.len() < total_len {
            return Err(DtlsError::MalformedRecord);
        }
        if header.version.get() != self.config.protocol_version {
            // Version mismatch is silently dropped, not alerted (spec.md §4.4).
            return Ok(total_len);
        }
        let content_type = match ContentType::from_u8(header.content_type) {
            Some(c) => c,
            None => return Ok(total_len),
        };
        let epoch = header.epoch.get();
        let record_bytes = &buf[..total_len];

        if !self.peers.contains_key(&identity) {
            self.admit(identity, content_type, epoch, record_bytes)?;
            return Ok(total_len);
        }

        // Remove the peer for the duration of processing to sidestep a
        // simultaneous mutable borrow of `self` (for config/rng/handlers)
        // and of the peer stored inside `self.peers`.
        let mut peer = self.peers.remove(&identity).unwrap();
        let result = self.process_for_peer(&mut peer, content_type, epoch, record_bytes);
        match result {
            Ok(outcome) => {
                if !matches!(peer.phase, Phase::Closed) {
                    self.peers.insert(identity, peer);
                }
                self.apply_outcome(identity, outcome)?;
            }
            Err(DtlsError::BadMac) | Err(DtlsError::Replay) | Err(DtlsError::MalformedRecord) => {
                peer.bad_record_count += 1;
                let exceeded = peer.bad_record_count > self.config.bad_record_threshold;
                if !exceeded {
                    self.peers.insert(identity, peer);
                } else {
                    tracing::warn!(?identity, "peer exceeded bad-record threshold, torn down");
                }
            }
            Err(e) => {
                tracing::warn!(?identity, error = %e, "fatal handshake error, peer torn down");
            }
        }
        Ok(total_len)
    }

    /// Admission for a not-yet-known identity (spec.md §4.5): only a
    /// client-hello with a valid cookie allocates peer state.
    fn admit(
        &mut self,
        identity: SessionId,
        content_type: ContentType,
        epoch: u64,
        record_bytes: &[u8],
    ) -> Result<(), DtlsError> {
        if content_type != ContentType::Handshake || epoch != 0 {
            return Ok(());
        }
        let body = &record_bytes[RECORD_HEADER_LEN..];
        if body.len() < dtls_types::HANDSHAKE_HEADER_LEN {
            return Ok(());
        }
        let (header_bytes, handshake_body) = body.split_at(dtls_types::HANDSHAKE_HEADER_LEN);
        let header = dtls_types::HandshakeHeader::read_from(header_bytes).ok_or(DtlsError::MalformedRecord)?;
        if header.msg_type != dtls_types::HandshakeType::ClientHello as u8 {
            return Ok(());
        }
        let ch = match dtls_types::ClientHello::decode(handshake_body) {
            Ok(ch) => ch,
            Err(_) => return Ok(()),
        };

        let mut identity_bytes = Vec::new();
        identity.to_cookie_bytes(&mut identity_bytes);

        if !self
            .cookie_secrets
            .verify(&identity_bytes, &ch.random, ch.cookie)
        {
            let cookie = self.cookie_secrets.mint(&identity_bytes, &ch.random);
            let hvr = dtls_types::HelloVerifyRequest {
                server_version: self.config.protocol_version,
                cookie: &cookie,
            };
            let mut hvr_body = Vec::new();
            hvr.encode(&mut hvr_body);
            let hs_header = dtls_types::HandshakeHeader::whole_message(
                dtls_types::HandshakeType::HelloVerifyRequest as u8,
                hvr_body.len() as u32,
                0,
            );
            let mut handshake_bytes = zerocopy::AsBytes::as_bytes(&hs_header).to_vec();
            handshake_bytes.extend_from_slice(&hvr_body);

            let record_header = dtls_types::RecordHeader::new(
                ContentType::Handshake as u8,
                self.config.protocol_version,
                0,
                0,
                handshake_bytes.len() as u16,
            );
            let mut wire = Vec::new();
            wire.extend_from_slice(zerocopy::AsBytes::as_bytes(&record_header));
            wire.extend_from_slice(&handshake_bytes);
            self.handlers.transmit(identity, &wire)?;
            return Ok(());
        }

        let mut peer = Peer::new(identity, record::Role::Server);
        let outcome = handshake::server_receive_client_hello(
            &mut peer,
            &self.config,
            &mut self.rng,
            header_bytes,
            handshake_body,
        )?;
        self.peers.insert(identity, peer);
        self.apply_outcome(identity, outcome)
    }

    fn process_for_peer(
        &mut self,
        peer: &mut Peer,
        content_type: ContentType,
        epoch: u64,
        record_bytes: &[u8],
    ) -> Result<handshake::Outcome, DtlsError> {
        match content_type {
            ContentType::Handshake => self.process_handshake_record(peer, epoch, record_bytes),
            ContentType::ChangeCipherSpec => match peer.role {
                record::Role::Client => handshake::client_receive_change_cipher_spec(peer),
                record::Role::Server => handshake::server_receive_change_cipher_spec(peer),
            },
            ContentType::Alert => {
                peer.phase = Phase::Closed;
                Ok(handshake::Outcome {
                    closed: true,
                    ..Default::default()
                })
            }
            ContentType::ApplicationData => self.process_application_data(peer, epoch, record_bytes),
        }
    }

    /// Decrypts one non-plaintext record against `peer`'s current
    /// parameters, enforcing the read-epoch and anti-replay checks
    /// common to both application-data and post-handshake records
    /// (spec.md §4.4).
    fn open_record(peer: &mut Peer, epoch: u64, record_bytes: &[u8]) -> Result<Vec<u8>, DtlsError> {
        if epoch as u16 != peer.read_epoch {
            return Err(DtlsError::MalformedRecord);
        }
        let header = RecordHeader::ref_from_prefix(record_bytes).ok_or(DtlsError::MalformedRecord)?;
        let sequence = header.sequence.get();
        if !peer.replay_window.would_accept(sequence) {
            return Err(DtlsError::Replay);
        }
        let params = peer.current_params().ok_or(DtlsError::InternalError)?;
        let (plaintext, _, _) = record::unprotect(params, peer.role, record_bytes)?;
        peer.replay_window.accept(sequence);
        Ok(plaintext)
    }

    fn process_application_data(
        &mut self,
        peer: &mut Peer,
        epoch: u64,
        record_bytes: &[u8],
    ) -> Result<handshake::Outcome, DtlsError> {
        let plaintext = Self::open_record(peer, epoch, record_bytes)?;
        self.handlers.deliver(peer.identity, &plaintext);
        Ok(handshake::Outcome::default())
    }

    fn process_handshake_record(
        &mut self,
        peer: &mut Peer,
        epoch: u64,
        record_bytes: &[u8],
    ) -> Result<handshake::Outcome, DtlsError> {
        let plaintext;
        let handshake_bytes: &[u8] = if epoch == 0 {
            &record_bytes[RECORD_HEADER_LEN..]
        } else {
            plaintext = Self::open_record(peer, epoch, record_bytes)?;
            &plaintext
        };

        if handshake_bytes.len() < dtls_types::HANDSHAKE_HEADER_LEN {
            return Err(DtlsError::MalformedRecord);
        }
        let (header_bytes, msg_body) = handshake_bytes.split_at(dtls_types::HANDSHAKE_HEADER_LEN);
        let header = dtls_types::HandshakeHeader::read_from(header_bytes).ok_or(DtlsError::MalformedRecord)?;
        let msg_type = dtls_types::HandshakeType::from_u8(header.msg_type).ok_or(DtlsError::UnexpectedMessage)?;
        let message_seq = header.message_seq.get();

        if let Some(retransmit) = handshake::check_retransmit(peer, message_seq) {
            return Ok(handshake::Outcome {
                datagrams: retransmit,
                ..Default::default()
            });
        }
        peer.peer_message_seq = message_seq.wrapping_add(1);

        use dtls_types::HandshakeType::*;
        match (peer.role, msg_type) {
            (record::Role::Client, HelloVerifyRequest) => {
                handshake::client_receive_hello_verify(peer, &self.config, msg_body)
            }
            (record::Role::Client, ServerHello) => {
                handshake::client_receive_server_hello(peer, header_bytes, msg_body)
            }
            (record::Role::Client, ServerHelloDone) => {
                handshake::client_receive_server_hello_done(peer, &self.config, header_bytes, msg_body)
            }
            (record::Role::Client, Finished) => handshake::client_receive_finished(peer, msg_body),
            (record::Role::Server, ClientHello) => {
                // The only client-hello a server ever sees after admission is
                // a retransmission of the one that got it admitted in the
                // first place (spec.md §4.3 "Retransmission") — replay the
                // flight rather than reprocessing it as a new handshake.
                Ok(handshake::Outcome {
                    datagrams: peer.last_flight.datagrams.clone(),
                    ..Default::default()
                })
            }
            (record::Role::Server, ClientKeyExchange) => {
                handshake::server_receive_client_key_exchange(peer, &self.config, header_bytes, msg_body)
            }
            (record::Role::Server, Finished) => handshake::server_receive_finished(peer, &self.config, msg_body),
            _ => Err(DtlsError::UnexpectedMessage),
        }
    }

    fn apply_outcome(&mut self, identity: SessionId, outcome: handshake::Outcome) -> Result<(), DtlsError> {
        for datagram in &outcome.datagrams {
            self.handlers.transmit(identity, datagram)?;
        }
        if outcome.connected {
            self.handlers.event(identity, 0, dtls_types::event::CONNECTED);
        }
        if let Some(alert) = outcome.alert {
            tracing::debug!(?identity, ?alert, "fatal alert");
            self.handlers.event(identity, dtls_types::AlertLevel::Fatal as u8, alert as u16);
        }
        if outcome.closed {
            self.peers.remove(&identity);
            self.handlers.event(identity, 0, dtls_types::event::CLOSED);
        }
        Ok(())
    }
}
