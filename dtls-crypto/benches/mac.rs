//! Throughput of the raw HMAC-SHA256 primitive — this is what bounds how
//! fast the peer table can reject malformed handshake MACs (spec.md
//! §4.5: admission control must be cheap before the server commits to
//! allocating peer state).

fn main() {
    divan::main();
}

#[divan::bench]
fn hmac_sha256(bencher: divan::Bencher) {
    let key = [0x11u8; 32];
    let msg = [0x22u8; 64];
    bencher.bench(|| dtls_crypto::hmac(divan::black_box(&key), divan::black_box(&msg)));
}
