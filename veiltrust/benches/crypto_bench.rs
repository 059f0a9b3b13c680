// VeilTrust cryptographic benchmarks using criterion.
//
// Measures:
//   - ChaCha20-Poly1305 seal / open per provider at various payload sizes
//   - Noise HKDF
//   - Full XX and IK handshakes

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use veiltrust::crypto::{CryptoProvider, RustCrypto};
use veiltrust::{default_provider, Handshake, HandshakeConfig, IdentityKeyPair, Role};

fn providers() -> Vec<(&'static str, Arc<dyn CryptoProvider>)> {
    #[allow(unused_mut)]
    let mut all: Vec<(&'static str, Arc<dyn CryptoProvider>)> =
        vec![("rustcrypto", Arc::new(RustCrypto))];
    #[cfg(feature = "ring")]
    all.push(("ring", Arc::new(veiltrust::RingCrypto)));
    all
}

// ---------------------------------------------------------------------------
// ChaCha20-Poly1305 seal / open
// ---------------------------------------------------------------------------

fn bench_aead(c: &mut Criterion) {
    let key = [0x42u8; 32];
    let sizes: &[usize] = &[64, 1024, 16 * 1024, 65519];

    for (name, crypto) in providers() {
        let mut group = c.benchmark_group(format!("chacha20_poly1305_{name}"));
        for &size in sizes {
            let plaintext = vec![0xABu8; size];
            let sealed = crypto
                .chacha20_poly1305_encrypt(&plaintext, 0, b"", &key)
                .unwrap();
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(
                BenchmarkId::new("seal", format!("{size}B")),
                &plaintext,
                |b, pt| {
                    b.iter(|| {
                        black_box(
                            crypto
                                .chacha20_poly1305_encrypt(black_box(pt), 0, b"", &key)
                                .unwrap(),
                        );
                    });
                },
            );
            group.bench_with_input(
                BenchmarkId::new("open", format!("{size}B")),
                &sealed,
                |b, ct| {
                    b.iter(|| {
                        black_box(
                            crypto
                                .chacha20_poly1305_decrypt(black_box(ct), 0, b"", &key)
                                .unwrap(),
                        );
                    });
                },
            );
        }
        group.finish();
    }
}

// ---------------------------------------------------------------------------
// HKDF
// ---------------------------------------------------------------------------

fn bench_hkdf(c: &mut Criterion) {
    let ck = [0x5Au8; 32];
    let ikm = [0x11u8; 32];
    for (name, crypto) in providers() {
        c.bench_function(&format!("noise_hkdf_{name}"), |b| {
            b.iter(|| black_box(crypto.hkdf(black_box(&ck), black_box(&ikm)).unwrap()));
        });
    }
}

// ---------------------------------------------------------------------------
// Full handshakes
// ---------------------------------------------------------------------------

fn bench_handshakes(c: &mut Criterion) {
    let crypto = default_provider();
    let (ia, ib) = (IdentityKeyPair::generate(), IdentityKeyPair::generate());
    let ca = HandshakeConfig::new(crypto.generate_x25519_keypair(), crypto.clone());
    let cb = HandshakeConfig::new(crypto.generate_x25519_keypair(), crypto.clone());
    let responder_static = *cb.static_keypair.public_key();

    c.bench_function("xx_handshake", |b| {
        b.iter(|| {
            let mut init = Handshake::xx(Role::Initiator, &ia, ca.clone()).unwrap();
            let mut resp = Handshake::xx(Role::Responder, &ib, cb.clone()).unwrap();
            resp.read_next(&init.write_next().unwrap()).unwrap();
            init.read_next(&resp.write_next().unwrap()).unwrap();
            resp.read_next(&init.write_next().unwrap()).unwrap();
            black_box((init.into_session().unwrap(), resp.into_session().unwrap()));
        });
    });

    c.bench_function("ik_handshake", |b| {
        b.iter(|| {
            let mut init =
                Handshake::ik(Role::Initiator, &ia, ca.clone(), Some(responder_static)).unwrap();
            let mut resp = Handshake::ik(Role::Responder, &ib, cb.clone(), None).unwrap();
            resp.read_next(&init.write_next().unwrap()).unwrap();
            init.read_next(&resp.write_next().unwrap()).unwrap();
            black_box((init.into_session().unwrap(), resp.into_session().unwrap()));
        });
    });
}

criterion_group!(benches, bench_aead, bench_hkdf, bench_handshakes);
criterion_main!(benches);
