//! Handshake Engine (spec.md §4.3): the per-peer finite state machine.
//! Functions here are free functions over `&mut Peer` rather than an
//! `impl Peer` block, mirroring `rustyguard-crypto`'s
//! `encrypt_handshake_init`/`decrypt_handshake_resp` shape — the engine
//! has no state of its own beyond the peer it's handed.
//!
//! Epoch 0 carries no cipher: handshake messages before the first
//! change-cipher-spec are sent and received as plaintext records. This
//! mirrors the RFC directly and isn't a simplification; what *is* a
//! deliberate simplification (recorded in DESIGN.md) is that a
//! change-cipher-spec record always carries `epoch=0, sequence=0` on the
//! wire rather than a running counter, since this one-shot PSK handshake
//! only ever sends exactly one per direction.

use rand::rngs::StdRng;
use rand_core::RngCore;

use dtls_types::{
    AlertDescription, ClientHello, ClientKeyExchange, ContentType, Finished, HandshakeHeader,
    HandshakeType, HelloVerifyRequest, ServerHello, ServerHelloDone,
};

use crate::config::{Config, CIPHER_SUITE_PSK_AES_128_CCM_8, NULL_COMPRESSION};
use crate::error::DtlsError;
use crate::peer::{Flight, Peer, Phase};
use crate::record::SecurityParams;

/// What processing one inbound message produced: zero or more outbound
/// datagrams, and/or a terminal state change. Several can apply at once
/// (e.g. the server's last flight both sends bytes and reaches
/// `connected`).
#[derive(Default)]
pub struct Outcome {
    pub datagrams: Vec<Vec<u8>>,
    pub connected: bool,
    pub closed: bool,
    pub alert: Option<AlertDescription>,
}

impl Outcome {
    fn datagrams(datagrams: Vec<Vec<u8>>) -> Self {
        Self {
            datagrams,
            ..Self::default()
        }
    }

    fn fatal(alert: AlertDescription) -> Self {
        Self {
            alert: Some(alert),
            closed: true,
            ..Self::default()
        }
    }
}

fn random_with_timestamp(rng: &mut StdRng) -> [u8; dtls_crypto::RANDOM_LENGTH] {
    let mut random = [0u8; dtls_crypto::RANDOM_LENGTH];
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);
    random[..4].copy_from_slice(&now.to_be_bytes());
    rng.fill_bytes(&mut random[4..]);
    random
}

/// Encodes one handshake message as a standalone wire datagram, feeding
/// it into the transcript and advancing the peer's message-sequence
/// counter. Uses the peer's current security parameters if the current
/// epoch is non-zero (post change-cipher-spec), plaintext otherwise.
fn encode_handshake(peer: &mut Peer, msg_type: HandshakeType, body: &[u8], version: u16) -> Result<Vec<u8>, DtlsError> {
    let message_seq = peer.next_message_seq;
    peer.next_message_seq = peer.next_message_seq.wrapping_add(1);

    let header = HandshakeHeader::whole_message(msg_type as u8, body.len() as u32, message_seq);
    let header_bytes = zerocopy::AsBytes::as_bytes(&header).to_vec();
    peer.handshake.feed(&header_bytes, body);

    let mut handshake_bytes = header_bytes;
    handshake_bytes.extend_from_slice(body);

    let (epoch, sequence) = peer
        .next_outbound_sequence()
        .ok_or(DtlsError::InternalError)?;

    let mut wire = Vec::new();
    match peer.current_params() {
        Some(params) if epoch > 0 => {
            crate::record::protect(
                params,
                peer.role,
                dtls_types::ContentType::Handshake as u8,
                version,
                epoch,
                sequence,
                &handshake_bytes,
                &mut wire,
            )?;
        }
        _ => {
            let header = dtls_types::RecordHeader::new(
                dtls_types::ContentType::Handshake as u8,
                version,
                epoch,
                sequence,
                handshake_bytes.len() as u16,
            );
            wire.extend_from_slice(zerocopy::AsBytes::as_bytes(&header));
            wire.extend_from_slice(&handshake_bytes);
        }
    }
    Ok(wire)
}

/// A change-cipher-spec record is always sent plaintext at
/// `epoch=0, sequence=0` — see the module doc comment.
fn encode_change_cipher_spec(version: u16) -> Vec<u8> {
    let body = [1u8];
    let header = dtls_types::RecordHeader::new(ContentType::ChangeCipherSpec as u8, version, 0, 0, 1);
    let mut wire = Vec::new();
    wire.extend_from_slice(zerocopy::AsBytes::as_bytes(&header));
    wire.extend_from_slice(&body);
    wire
}

/// If `incoming_seq` is a message the peer has already advanced past,
/// the right response is to replay the last flight verbatim rather than
/// reprocess (spec.md §4.3 "Retransmission").
pub fn check_retransmit(peer: &Peer, incoming_seq: u16) -> Option<Vec<Vec<u8>>> {
    if incoming_seq < peer.peer_message_seq && !peer.last_flight.datagrams.is_empty() {
        Some(peer.last_flight.datagrams.clone())
    } else {
        None
    }
}

fn record_flight(peer: &mut Peer, datagrams: Vec<Vec<u8>>) {
    peer.last_flight = Flight {
        datagrams: datagrams.clone(),
    };
    peer.last_flight_sent = Some(std::time::Instant::now());
}

/// `connect(identity)` (spec.md §6): client side of the handshake.
pub fn client_connect(peer: &mut Peer, cfg: &Config, rng: &mut StdRng) -> Result<Outcome, DtlsError> {
    if peer.phase != Phase::Init {
        return Err(DtlsError::UnexpectedMessage);
    }
    let psk = cfg.psk_store.local_identity();
    let client_random = random_with_timestamp(rng);
    peer.handshake.client_random = Some(client_random);
    peer.handshake.psk_identity = psk.identity.clone();
    peer.handshake.psk = psk.key.clone();

    let wire = build_and_send_client_hello(peer, cfg, client_random, &[])?;
    peer.phase = Phase::ClientHelloSent;
    peer.peer_message_seq = 0;
    record_flight(peer, vec![wire.clone()]);
    Ok(Outcome::datagrams(vec![wire]))
}

fn build_and_send_client_hello(
    peer: &mut Peer,
    cfg: &Config,
    client_random: [u8; dtls_crypto::RANDOM_LENGTH],
    cookie: &[u8],
) -> Result<Vec<u8>, DtlsError> {
    let suite = CIPHER_SUITE_PSK_AES_128_CCM_8.to_be_bytes();
    let ch = ClientHello {
        client_version: cfg.protocol_version,
        random: client_random,
        session_id: &[],
        cookie,
        cipher_suites: &suite,
        compression_methods: &[NULL_COMPRESSION],
    };
    let mut body = Vec::new();
    ch.encode(&mut body);
    encode_handshake(peer, HandshakeType::ClientHello, &body, cfg.protocol_version)
}

/// Client side: hello-verify-request received while `client-hello-sent`.
/// Re-sends client-hello with the cookie echoed; this is the point the
/// transcript hash begins (spec.md §4.3).
pub fn client_receive_hello_verify(
    peer: &mut Peer,
    cfg: &Config,
    body: &[u8],
) -> Result<Outcome, DtlsError> {
    if peer.phase != Phase::ClientHelloSent {
        return Err(DtlsError::UnexpectedMessage);
    }
    let hvr = HelloVerifyRequest::decode(body)?;
    let client_random = peer.handshake.client_random.ok_or(DtlsError::UnexpectedMessage)?;

    peer.handshake.transcript_started = true;
    let wire = build_and_send_client_hello(peer, cfg, client_random, hvr.cookie)?;
    record_flight(peer, vec![wire.clone()]);
    Ok(Outcome::datagrams(vec![wire]))
}

/// Client side: server-hello received while `client-hello-sent` (after
/// the cookie round-trip). Moves to `wait-server-hello-done`.
pub fn client_receive_server_hello(peer: &mut Peer, header_bytes: &[u8], body: &[u8]) -> Result<Outcome, DtlsError> {
    if peer.phase != Phase::ClientHelloSent {
        return Err(DtlsError::UnexpectedMessage);
    }
    let sh = ServerHello::decode(body)?;
    if sh.cipher_suite != CIPHER_SUITE_PSK_AES_128_CCM_8 || sh.compression_method != NULL_COMPRESSION {
        return Ok(Outcome::fatal(AlertDescription::HandshakeFailure));
    }
    peer.handshake.feed(header_bytes, body);
    peer.handshake.server_random = Some(sh.random);
    peer.phase = Phase::WaitServerHelloDone;
    Ok(Outcome::default())
}

/// Client side: server-hello-done received. Sends client-key-exchange,
/// change-cipher-spec, and finished in one flight, then waits for the
/// server's finished.
pub fn client_receive_server_hello_done(
    peer: &mut Peer,
    cfg: &Config,
    header_bytes: &[u8],
    body: &[u8],
) -> Result<Outcome, DtlsError> {
    if peer.phase != Phase::WaitServerHelloDone {
        return Err(DtlsError::UnexpectedMessage);
    }
    ServerHelloDone::decode(body)?;
    peer.handshake.feed(header_bytes, body);

    let client_random = peer.handshake.client_random.ok_or(DtlsError::UnexpectedMessage)?;
    let server_random = peer.handshake.server_random.ok_or(DtlsError::UnexpectedMessage)?;

    let mut pre_master = Vec::new();
    dtls_crypto::psk_pre_master_secret(&peer.handshake.psk, &mut pre_master);
    let params = SecurityParams::derive(
        CIPHER_SUITE_PSK_AES_128_CCM_8,
        &pre_master,
        client_random,
        server_random,
    );
    let master_secret = params.master_secret;

    let cke = ClientKeyExchange {
        psk_identity: &peer.handshake.psk_identity,
    };
    let mut cke_body = Vec::new();
    cke.encode(&mut cke_body);
    let cke_wire = encode_handshake(peer, HandshakeType::ClientKeyExchange, &cke_body, cfg.protocol_version)?;

    let ccs_wire = encode_change_cipher_spec(cfg.protocol_version);
    peer.activate_pending(params);

    let hash = peer.handshake.hash();
    let verify_data = dtls_crypto::finished_verify_data(&master_secret, true, &hash);
    let finished = Finished { verify_data };
    let mut finished_body = Vec::new();
    finished.encode(&mut finished_body);
    let finished_wire = encode_handshake(peer, HandshakeType::Finished, &finished_body, cfg.protocol_version)?;

    peer.phase = Phase::WaitServerFinished;
    let flight = vec![cke_wire, ccs_wire, finished_wire];
    record_flight(peer, flight.clone());
    Ok(Outcome::datagrams(flight))
}

/// Client side: the server's own change-cipher-spec. The client already
/// activated its pending parameters when it sent its own flight, so this
/// is only a phase sanity check.
pub fn client_receive_change_cipher_spec(peer: &Peer) -> Result<Outcome, DtlsError> {
    if peer.phase != Phase::WaitServerFinished {
        return Err(DtlsError::UnexpectedMessage);
    }
    Ok(Outcome::default())
}

/// Client side: server's finished. Verifying this connects the peer.
pub fn client_receive_finished(peer: &mut Peer, body: &[u8]) -> Result<Outcome, DtlsError> {
    if peer.phase != Phase::WaitServerFinished {
        return Err(DtlsError::UnexpectedMessage);
    }
    let finished = Finished::decode(body)?;
    let master_secret = peer
        .current_params()
        .ok_or(DtlsError::InternalError)?
        .master_secret;
    let hash = peer.handshake.hash();
    let expected = dtls_crypto::finished_verify_data(&master_secret, false, &hash);

    if dtls_crypto::verify_finished(&expected, &finished.verify_data).is_err() {
        peer.phase = Phase::Closed;
        return Ok(Outcome::fatal(AlertDescription::DecryptError));
    }

    let header = HandshakeHeader::whole_message(
        HandshakeType::Finished as u8,
        body.len() as u32,
        peer.peer_message_seq,
    );
    peer.handshake
        .feed(zerocopy::AsBytes::as_bytes(&header), body);

    peer.phase = Phase::Connected;
    Ok(Outcome {
        connected: true,
        ..Outcome::default()
    })
}

/// Server side: a cookie-verified client-hello. The caller (dispatch)
/// has already allocated the peer and verified the cookie; this
/// function does the protocol work and is where the transcript hash
/// begins (spec.md §4.3).
pub fn server_receive_client_hello(
    peer: &mut Peer,
    cfg: &Config,
    rng: &mut StdRng,
    header_bytes: &[u8],
    body: &[u8],
) -> Result<Outcome, DtlsError> {
    if peer.phase != Phase::Init {
        return Err(DtlsError::UnexpectedMessage);
    }
    let ch = ClientHello::decode(body)?;
    if !ch
        .cipher_suite_iter()
        .any(|s| s == CIPHER_SUITE_PSK_AES_128_CCM_8)
    {
        return Ok(Outcome::fatal(AlertDescription::HandshakeFailure));
    }

    peer.handshake.transcript_started = true;
    peer.handshake.feed(header_bytes, body);
    peer.handshake.client_random = Some(ch.random);
    peer.handshake.chosen_cipher_suite = CIPHER_SUITE_PSK_AES_128_CCM_8;
    peer.peer_message_seq = 1;

    let server_random = random_with_timestamp(rng);
    peer.handshake.server_random = Some(server_random);

    let sh = ServerHello {
        server_version: cfg.protocol_version,
        random: server_random,
        session_id: &[],
        cipher_suite: CIPHER_SUITE_PSK_AES_128_CCM_8,
        compression_method: NULL_COMPRESSION,
    };
    let mut sh_body = Vec::new();
    sh.encode(&mut sh_body);
    let sh_wire = encode_handshake(peer, HandshakeType::ServerHello, &sh_body, cfg.protocol_version)?;

    let shd = ServerHelloDone;
    let mut shd_body = Vec::new();
    shd.encode(&mut shd_body);
    let shd_wire = encode_handshake(peer, HandshakeType::ServerHelloDone, &shd_body, cfg.protocol_version)?;

    peer.phase = Phase::ServerHelloSent;
    let flight = vec![sh_wire, shd_wire];
    record_flight(peer, flight.clone());
    Ok(Outcome::datagrams(flight))
}

/// Server side: client-key-exchange. Derives (but does not yet
/// activate) the security parameters into the pending slot — they
/// become current only once the matching change-cipher-spec arrives.
pub fn server_receive_client_key_exchange(
    peer: &mut Peer,
    cfg: &Config,
    header_bytes: &[u8],
    body: &[u8],
) -> Result<Outcome, DtlsError> {
    if peer.phase != Phase::ServerHelloSent {
        return Err(DtlsError::UnexpectedMessage);
    }
    let cke = ClientKeyExchange::decode(body)?;
    peer.handshake.feed(header_bytes, body);

    let key = cfg
        .psk_store
        .lookup(cke.psk_identity)
        .ok_or(DtlsError::KeyNotFound)?;

    let client_random = peer.handshake.client_random.ok_or(DtlsError::UnexpectedMessage)?;
    let server_random = peer.handshake.server_random.ok_or(DtlsError::UnexpectedMessage)?;

    let mut pre_master = Vec::new();
    dtls_crypto::psk_pre_master_secret(&key, &mut pre_master);
    let params = SecurityParams::derive(
        peer.handshake.chosen_cipher_suite,
        &pre_master,
        client_random,
        server_random,
    );
    let slot = peer.pending_slot();
    peer.params[slot] = Some(params);
    peer.phase = Phase::KeyExchangeReceived;
    Ok(Outcome::default())
}

/// Server side: the client's change-cipher-spec. Activates the pending
/// parameters derived in [`server_receive_client_key_exchange`].
pub fn server_receive_change_cipher_spec(peer: &mut Peer) -> Result<Outcome, DtlsError> {
    if peer.phase != Phase::KeyExchangeReceived {
        return Err(DtlsError::UnexpectedMessage);
    }
    let slot = peer.pending_slot();
    let params = peer.params[slot].take().ok_or(DtlsError::UnexpectedMessage)?;
    peer.activate_pending(params);
    Ok(Outcome::default())
}

/// Server side: the client's finished. Verifies it, then sends the
/// server's own change-cipher-spec + finished, completing the
/// handshake.
pub fn server_receive_finished(peer: &mut Peer, cfg: &Config, body: &[u8]) -> Result<Outcome, DtlsError> {
    if peer.phase != Phase::KeyExchangeReceived {
        return Err(DtlsError::UnexpectedMessage);
    }
    let finished = Finished::decode(body)?;
    let master_secret = peer
        .current_params()
        .ok_or(DtlsError::InternalError)?
        .master_secret;
    let hash_before_client_finished = peer.handshake.hash();
    let expected = dtls_crypto::finished_verify_data(&master_secret, true, &hash_before_client_finished);

    if dtls_crypto::verify_finished(&expected, &finished.verify_data).is_err() {
        peer.phase = Phase::Closed;
        return Ok(Outcome::fatal(AlertDescription::DecryptError));
    }

    let header = HandshakeHeader::whole_message(
        HandshakeType::Finished as u8,
        body.len() as u32,
        peer.peer_message_seq,
    );
    peer.handshake
        .feed(zerocopy::AsBytes::as_bytes(&header), body);

    let ccs_wire = encode_change_cipher_spec(cfg.protocol_version);

    let server_hash = peer.handshake.hash();
    let server_verify_data = dtls_crypto::finished_verify_data(&master_secret, false, &server_hash);
    let own_finished = Finished {
        verify_data: server_verify_data,
    };
    let mut own_body = Vec::new();
    own_finished.encode(&mut own_body);
    let finished_wire = encode_handshake(peer, HandshakeType::Finished, &own_body, cfg.protocol_version)?;

    peer.phase = Phase::Connected;
    let flight = vec![ccs_wire, finished_wire];
    record_flight(peer, flight.clone());
    Ok(Outcome {
        datagrams: flight,
        connected: true,
        ..Outcome::default()
    })
}

