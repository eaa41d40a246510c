//! End-to-end scenarios from spec.md §8, driving two in-process
//! `Context`s against each other through an in-memory transmit queue —
//! no real sockets, following the teacher's preference for testing
//! protocol logic directly over the wire-format boundary.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use dtls_core::{Config, Context, DtlsError, Handlers, SessionId, StaticPskStore};

#[derive(Default)]
struct Recorder {
    events: Vec<(u8, u16)>,
    delivered: Vec<Vec<u8>>,
}

/// Routes `transmit` into the peer's inbound queue instead of a socket.
struct LoopbackHandlers {
    outbox: Rc<RefCell<VecDeque<Vec<u8>>>>,
    recorder: Rc<RefCell<Recorder>>,
}

impl Handlers for LoopbackHandlers {
    fn transmit(&mut self, _identity: SessionId, bytes: &[u8]) -> Result<usize, DtlsError> {
        self.outbox.borrow_mut().push_back(bytes.to_vec());
        Ok(bytes.len())
    }

    fn deliver(&mut self, _identity: SessionId, cleartext: &[u8]) {
        self.recorder.borrow_mut().delivered.push(cleartext.to_vec());
    }

    fn event(&mut self, _identity: SessionId, level: u8, code: u16) {
        self.recorder.borrow_mut().events.push((level, code));
    }
}

fn addr(port: u16) -> SessionId {
    SessionId::new(format!("127.0.0.1:{port}").parse().unwrap(), 0)
}

struct Harness {
    client: Context,
    server: Context,
    client_outbox: Rc<RefCell<VecDeque<Vec<u8>>>>,
    server_outbox: Rc<RefCell<VecDeque<Vec<u8>>>>,
    client_recorder: Rc<RefCell<Recorder>>,
    server_recorder: Rc<RefCell<Recorder>>,
    client_id: SessionId,
    server_id: SessionId,
}

fn build_harness(client_psk: &str, server_psk: &str) -> Harness {
    let client_outbox = Rc::new(RefCell::new(VecDeque::new()));
    let server_outbox = Rc::new(RefCell::new(VecDeque::new()));
    let client_recorder = Rc::new(RefCell::new(Recorder::default()));
    let server_recorder = Rc::new(RefCell::new(Recorder::default()));

    let client_cfg = Config::builder(StaticPskStore::new("id", client_psk)).build().unwrap();
    let server_cfg = Config::builder(StaticPskStore::new("id", server_psk)).build().unwrap();

    let client = Context::new(
        client_cfg,
        Box::new(LoopbackHandlers {
            outbox: client_outbox.clone(),
            recorder: client_recorder.clone(),
        }),
    );
    let server = Context::new(
        server_cfg,
        Box::new(LoopbackHandlers {
            outbox: server_outbox.clone(),
            recorder: server_recorder.clone(),
        }),
    );

    Harness {
        client,
        server,
        client_outbox,
        server_outbox,
        client_recorder,
        server_recorder,
        client_id: addr(4000),
        server_id: addr(5000),
    }
}

impl Harness {
    /// Drains both outboxes into the opposite context until neither side
    /// has anything left to say — enough to carry a lossless handshake
    /// or data exchange to completion.
    fn pump(&mut self) {
        loop {
            let mut progressed = false;
            while let Some(datagram) = self.client_outbox.borrow_mut().pop_front() {
                self.server.handle_message(self.client_id, &datagram).unwrap();
                progressed = true;
            }
            while let Some(datagram) = self.server_outbox.borrow_mut().pop_front() {
                self.client.handle_message(self.server_id, &datagram).unwrap();
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
    }
}

#[test]
fn clean_psk_handshake_and_application_data() {
    let mut h = build_harness("secret", "secret");
    h.client.connect(h.server_id).unwrap();
    h.pump();

    assert!(h.client_recorder.borrow().events.contains(&(0, dtls_types::event::CONNECTED)));
    assert!(h.server_recorder.borrow().events.contains(&(0, dtls_types::event::CONNECTED)));

    h.client.write(h.server_id, b"hello").unwrap();
    h.pump();

    assert_eq!(h.server_recorder.borrow().delivered, vec![b"hello".to_vec()]);
}

#[test]
fn cookie_challenge_allocates_no_peer_state() {
    let mut h = build_harness("secret", "secret");
    h.client.connect(h.server_id).unwrap();

    // First pump: only the cookie-less client-hello reaches the server,
    // which must answer with exactly one hello-verify-request and no
    // peer allocation.
    let first = h.client_outbox.borrow_mut().pop_front().unwrap();
    assert_eq!(h.server.peer_count(), 0);
    h.server.handle_message(h.client_id, &first).unwrap();
    assert_eq!(h.server.peer_count(), 0, "no peer state before a valid cookie is presented");
    assert_eq!(h.server_outbox.borrow().len(), 1, "exactly one hello-verify-request");
}

#[test]
fn replayed_application_data_is_delivered_once() {
    let mut h = build_harness("secret", "secret");
    h.client.connect(h.server_id).unwrap();
    h.pump();

    h.client.write(h.server_id, b"once").unwrap();
    let datagram = h.client_outbox.borrow_mut().pop_front().unwrap();

    h.server.handle_message(h.client_id, &datagram).unwrap();
    h.server.handle_message(h.client_id, &datagram).unwrap();

    assert_eq!(h.server_recorder.borrow().delivered, vec![b"once".to_vec()]);
}

#[test]
fn bad_mac_is_dropped_silently_and_peer_survives() {
    let mut h = build_harness("secret", "secret");
    h.client.connect(h.server_id).unwrap();
    h.pump();

    h.client.write(h.server_id, b"intact").unwrap();
    let mut datagram = h.client_outbox.borrow_mut().pop_front().unwrap();
    *datagram.last_mut().unwrap() ^= 0xff;

    h.server.handle_message(h.client_id, &datagram).unwrap();
    assert!(h.server_recorder.borrow().delivered.is_empty());
    assert_eq!(h.server.peer_count(), 1, "peer remains connected after one bad record");
}

#[test]
fn mismatched_psk_fails_finished_verification() {
    let mut h = build_harness("wrong", "right");
    h.client.connect(h.server_id).unwrap();
    h.pump();

    assert!(!h.server_recorder.borrow().events.contains(&(0, dtls_types::event::CONNECTED)));
    assert!(h
        .server_recorder
        .borrow()
        .events
        .iter()
        .any(|&(level, _)| level == dtls_types::AlertLevel::Fatal as u8));
    assert_eq!(h.server.peer_count(), 0, "peer torn down after fatal alert");
}
