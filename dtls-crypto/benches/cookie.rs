//! Cookie-mint throughput. Admission control (spec.md §4.5) runs this
//! path on every unverified client-hello, so it has to stay cheap enough
//! to survive a flood of spoofed senders.

use rand::SeedableRng;

fn main() {
    divan::main();
}

#[divan::bench]
fn mint_cookie(bencher: divan::Bencher) {
    let mut secret = dtls_crypto::CookieSecret::default();
    let mut rng = rand::rngs::StdRng::from_entropy();
    secret.generate(&mut rng);

    let identity = b"198.51.100.23:56789";
    let client_random = [0x33u8; 32];

    bencher.bench(|| secret.cookie(divan::black_box(identity), divan::black_box(&client_random)));
}
