//! End-to-end cost of the key schedule: master secret derivation, key
//! block expansion, and both Finished verify-data computations. This is
//! the per-connection one-time cost, as opposed to `mac.rs`'s
//! per-packet cost.

extern crate alloc;

fn main() {
    divan::main();
}

#[divan::bench]
fn full_key_schedule(bencher: divan::Bencher) {
    let psk = b"correct horse battery staple";
    let client_random = [0xaau8; 32];
    let server_random = [0xbbu8; 32];
    let transcript_hash = [0xccu8; 32];

    bencher.bench(|| {
        let mut pre_master = alloc::vec::Vec::new();
        dtls_crypto::psk_pre_master_secret(divan::black_box(psk), &mut pre_master);
        let master = dtls_crypto::master_secret(&pre_master, &client_random, &server_random);
        let _key_block = dtls_crypto::KeyBlock::derive(&master, &client_random, &server_random);
        let _client_finished = dtls_crypto::finished_verify_data(&master, true, &transcript_hash);
        dtls_crypto::finished_verify_data(&master, false, &transcript_hash)
    });
}
