use sha2::{Digest, Sha256};

use dtls_types::{COOKIE_LENGTH, RANDOM_LENGTH};

use crate::identity::SessionId;
use crate::record::{Role, SecurityParams};
use dtls_utils::ReplayWindow;

/// The handshake phase table of spec.md §4.3, column-for-column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    ClientHelloSent,
    WaitServerHelloDone,
    WaitServerFinished,
    ServerHelloSent,
    KeyExchangeReceived,
    Connected,
    Closing,
    Closed,
}

/// Per-peer handshake bookkeeping that only exists before `Connected`:
/// randoms, the chosen PSK, the cookie a client must echo back, and the
/// running transcript hash. Dropped (zeroized for the secret-shaped
/// parts) once the peer is torn down or superseded by `SecurityParams`.
pub struct HandshakeScratch {
    pub client_random: Option<[u8; RANDOM_LENGTH]>,
    pub server_random: Option<[u8; RANDOM_LENGTH]>,
    pub cookie: Option<[u8; COOKIE_LENGTH]>,
    pub psk_identity: Vec<u8>,
    pub psk: Vec<u8>,
    pub chosen_cipher_suite: u16,
    pub transcript: Sha256,
    /// Set once the handshake transcript starts being fed (spec.md §4.3:
    /// excludes the cookie-less first ClientHello and HelloVerifyRequest).
    pub transcript_started: bool,
}

impl Default for HandshakeScratch {
    fn default() -> Self {
        Self {
            client_random: None,
            server_random: None,
            cookie: None,
            psk_identity: Vec::new(),
            psk: Vec::new(),
            chosen_cipher_suite: 0,
            transcript: Sha256::new(),
            transcript_started: false,
        }
    }
}

impl HandshakeScratch {
    /// Feeds one handshake message (header + body, the "whole message"
    /// framing per spec.md §4.3's fragmentation note) into the running
    /// transcript, if transcript accumulation has started.
    pub fn feed(&mut self, header_bytes: &[u8], body: &[u8]) {
        if !self.transcript_started {
            return;
        }
        self.transcript.update(header_bytes);
        self.transcript.update(body);
    }

    pub fn hash(&self) -> [u8; 32] {
        self.transcript.clone().finalize().into()
    }
}

/// One outbound handshake flight: the complete wire-ready datagrams a
/// side owes the peer before awaiting a reply (spec.md §4.3 glossary:
/// "a maximal run of handshake messages one side emits before awaiting a
/// peer response"). Retransmission replays these verbatim.
#[derive(Default, Clone)]
pub struct Flight {
    pub datagrams: Vec<Vec<u8>>,
}

/// Peer State (spec.md §3).
pub struct Peer {
    pub identity: SessionId,
    pub role: Role,
    pub phase: Phase,

    pub send_epoch: u16,
    pub next_sequence: u64,

    /// Epoch the read path currently trusts; spec.md §4.4: "checks epoch
    /// equals current read epoch or is exactly one greater and buffered."
    pub read_epoch: u16,
    pub replay_window: ReplayWindow,

    /// `[current, pending]`, selected by `current_slot`. Only the
    /// current slot's key block is expected to be non-empty once
    /// `Connected` (spec.md §3 invariant).
    pub params: [Option<SecurityParams>; 2],
    pub current_slot: usize,

    pub next_message_seq: u16,
    pub peer_message_seq: u16,

    pub handshake: HandshakeScratch,
    pub last_flight: Flight,
    pub last_flight_sent: Option<std::time::Instant>,

    pub bad_record_count: u32,
}

/// No timer backoff policy is baked in (spec.md §9: left to the
/// collaborator); this is just the threshold `needs_retransmit` uses.
pub const RETRANSMIT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

impl Peer {
    pub fn new(identity: SessionId, role: Role) -> Self {
        Self {
            identity,
            role,
            phase: Phase::Init,
            send_epoch: 0,
            next_sequence: 0,
            read_epoch: 0,
            replay_window: ReplayWindow::new(),
            params: [None, None],
            current_slot: 0,
            next_message_seq: 0,
            peer_message_seq: 0,
            handshake: HandshakeScratch::default(),
            last_flight: Flight::default(),
            last_flight_sent: None,
            bad_record_count: 0,
        }
    }

    /// Whether a collaborator-driven timer should call `flight_retransmit`
    /// now (spec.md §5: "the collaborator polls `needs_retransmit`").
    pub fn needs_retransmit(&self, now: std::time::Instant) -> bool {
        !matches!(self.phase, Phase::Connected | Phase::Closed)
            && self
                .last_flight_sent
                .is_some_and(|sent| now.duration_since(sent) > RETRANSMIT_TIMEOUT)
    }

    pub fn flight_current(&self) -> &[Vec<u8>] {
        &self.last_flight.datagrams
    }

    pub fn current_params(&self) -> Option<&SecurityParams> {
        self.params[self.current_slot].as_ref()
    }

    pub fn pending_slot(&self) -> usize {
        1 - self.current_slot
    }

    /// Installs newly derived parameters into the pending slot and bumps
    /// the sending epoch — the handshake engine calls this when sending
    /// or receiving a change-cipher-spec signal (spec.md §3 invariant:
    /// "the pending-parameters slot is only consulted after the
    /// corresponding side has sent or received a cipher-change signal").
    pub fn activate_pending(&mut self, params: SecurityParams) {
        let slot = self.pending_slot();
        self.params[slot] = params.into();
        self.current_slot = slot;
        self.send_epoch = self.send_epoch.wrapping_add(1);
        self.read_epoch = self.send_epoch;
        self.next_sequence = 0;
        self.replay_window = ReplayWindow::new();
    }

    /// Allocates the next outbound (epoch, sequence) pair and advances
    /// the counter. Returns `None` on sequence overflow (spec.md §4.4:
    /// "the peer must be closed with an internal error").
    pub fn next_outbound_sequence(&mut self) -> Option<(u16, u64)> {
        if self.next_sequence > dtls_utils::U48::MAX {
            return None;
        }
        let seq = self.next_sequence;
        self.next_sequence += 1;
        Some((self.send_epoch, seq))
    }
}
