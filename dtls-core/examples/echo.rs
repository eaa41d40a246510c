//! Minimal demonstration of wiring the four callbacks to a real
//! `UdpSocket`. Explicitly out of the core's scope (spec.md §1) — this
//! is a manual smoke-test harness, not a library entry point, the same
//! role the teacher's `examples/tun.rs` plays for `rustyguard-core`.

use std::net::UdpSocket;

use dtls_core::{Config, Context, Handlers, SessionId, StaticPskStore};

struct UdpHandlers {
    socket: UdpSocket,
}

impl Handlers for UdpHandlers {
    fn transmit(&mut self, identity: SessionId, bytes: &[u8]) -> Result<usize, dtls_core::DtlsError> {
        self.socket
            .send_to(bytes, identity.addr)
            .map_err(|_| dtls_core::DtlsError::InternalError)
    }

    fn deliver(&mut self, identity: SessionId, cleartext: &[u8]) {
        println!("deliver from {:?}: {} bytes", identity.addr, cleartext.len());
    }

    fn event(&mut self, identity: SessionId, level: u8, code: u16) {
        println!("event from {:?}: level={level} code={code}", identity.addr);
    }
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    let psk_store = StaticPskStore::new("demo-identity", "demo-secret");
    let config = Config::builder(psk_store).build().expect("default config is valid");
    let handlers = UdpHandlers {
        socket: socket.try_clone()?,
    };
    let mut ctx = Context::new(config, Box::new(handlers));

    let mut buf = [0u8; 2048];
    loop {
        let (n, from) = socket.recv_from(&mut buf)?;
        let identity = SessionId::new(from, 0);
        if let Err(e) = ctx.handle_message(identity, &buf[..n]) {
            eprintln!("handle_message error: {e}");
        }
    }
}
