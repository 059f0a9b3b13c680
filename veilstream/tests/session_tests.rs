use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use veilstream::{
    IdentityKeyPair, MemoryKeyCache, Noise, NoiseConfig, NoiseMetrics, PatternKind,
    SecuredConnection, StaticKeyCache, VeilStreamError,
};
use veiltrust::VeilTrustError;

type Conn = SecuredConnection<DuplexStream>;

async fn connect(
    client: &Noise,
    server: &Noise,
    pin: Option<veilstream::PeerId>,
) -> (veilstream::Result<Conn>, veilstream::Result<Conn>) {
    let (a, b) = duplex(256 * 1024);
    tokio::join!(client.secure_outbound(a, pin), server.secure_inbound(b, None))
}

async fn exchange(client: &mut Conn, server: &mut Conn, payload: &[u8]) {
    let writer = async {
        client.stream.write_all(payload).await.unwrap();
        client.stream.flush().await.unwrap();
    };
    let reader = async {
        let mut got = vec![0u8; payload.len()];
        server.stream.read_exact(&mut got).await.unwrap();
        got
    };
    let ((), got) = tokio::join!(writer, reader);
    assert_eq!(got, payload);
}

#[tokio::test]
async fn test_xx_without_pipes() {
    let client = Noise::new(IdentityKeyPair::generate(), NoiseConfig::default());
    let server = Noise::new(IdentityKeyPair::generate(), NoiseConfig::default());

    let (c, s) = connect(&client, &server, Some(server.peer_id().clone())).await;
    let (mut c, mut s) = (c.unwrap(), s.unwrap());

    assert_eq!(c.pattern, PatternKind::Xx);
    assert_eq!(s.pattern, PatternKind::Xx);
    assert_eq!(&c.remote_peer, server.peer_id());
    assert_eq!(&s.remote_peer, client.peer_id());
    assert_eq!(c.handshake_hash, s.handshake_hash);
    assert_eq!(c.remote_static_key, server.static_public_key());
    assert_eq!(s.remote_static_key, client.static_public_key());

    exchange(&mut c, &mut s, b"test").await;
    exchange(&mut s, &mut c, b"test").await;

    let mut large = vec![0u8; 60_000];
    rand::thread_rng().fill_bytes(&mut large);
    exchange(&mut c, &mut s, &large).await;
}

#[tokio::test]
async fn test_extension_data_is_delivered() {
    let client = Noise::new(
        IdentityKeyPair::generate(),
        NoiseConfig::default().with_extension_data(b"client-ext".to_vec()),
    );
    let server = Noise::new(
        IdentityKeyPair::generate(),
        NoiseConfig::default().with_extension_data(b"server-ext".to_vec()),
    );
    let (c, s) = connect(&client, &server, None).await;
    assert_eq!(c.unwrap().remote_extension_data, b"server-ext");
    assert_eq!(s.unwrap().remote_extension_data, b"client-ext");
}

#[tokio::test]
async fn test_pinned_peer_mismatch_fails() {
    let client = Noise::new(IdentityKeyPair::generate(), NoiseConfig::default());
    let server = Noise::new(IdentityKeyPair::generate(), NoiseConfig::default());
    let stranger = IdentityKeyPair::generate().peer_id().clone();

    let (c, _s) = connect(&client, &server, Some(stranger)).await;
    match c.unwrap_err() {
        VeilStreamError::Handshake {
            pattern, stage, source, ..
        } => {
            assert_eq!(pattern, PatternKind::Xx);
            assert_eq!(stage, 1);
            assert!(matches!(source, VeilTrustError::IdentityMismatch { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_prologue_mismatch_fails() {
    let client = Noise::new(
        IdentityKeyPair::generate(),
        NoiseConfig::default().with_prologue(b"v1".to_vec()),
    );
    let server = Noise::new(
        IdentityKeyPair::generate(),
        NoiseConfig::default().with_prologue(b"v2".to_vec()),
    );
    let (c, _s) = connect(&client, &server, None).await;
    let err = c.unwrap_err();
    assert!(matches!(
        err.noise_error(),
        Some(VeilTrustError::Decryption)
    ));
}

#[tokio::test]
async fn test_ik_after_key_is_cached() {
    let cache = Arc::new(MemoryKeyCache::new());
    let metrics = Arc::new(NoiseMetrics::new());
    let client = Noise::new(
        IdentityKeyPair::generate(),
        NoiseConfig::default()
            .with_noise_pipes(true)
            .with_key_cache(cache.clone())
            .with_metrics(metrics.clone()),
    );
    let server = Noise::new(
        IdentityKeyPair::generate(),
        NoiseConfig::default().with_noise_pipes(true),
    );
    let pin = Some(server.peer_id().clone());

    // Nothing cached: plain XX on both sides.
    let (c, s) = connect(&client, &server, pin.clone()).await;
    assert_eq!(c.unwrap().pattern, PatternKind::Xx);
    assert_eq!(s.unwrap().pattern, PatternKind::Xx);
    assert_eq!(cache.load(server.peer_id()), Some(server.static_public_key()));

    let (c, s) = connect(&client, &server, pin).await;
    let (mut c, mut s) = (c.unwrap(), s.unwrap());
    assert_eq!(c.pattern, PatternKind::Ik);
    assert_eq!(s.pattern, PatternKind::Ik);
    assert_eq!(c.handshake_hash, s.handshake_hash);
    exchange(&mut c, &mut s, b"over ik").await;

    let snap = metrics.snapshot();
    assert_eq!(snap.xx_success, 1);
    assert_eq!(snap.ik_success, 1);
    assert_eq!(snap.ik_error, 0);
}

#[tokio::test]
async fn test_stale_cached_key_falls_back() {
    let cache = Arc::new(MemoryKeyCache::new());
    let metrics = Arc::new(NoiseMetrics::new());
    let client = Noise::new(
        IdentityKeyPair::generate(),
        NoiseConfig::default()
            .with_noise_pipes(true)
            .with_key_cache(cache.clone())
            .with_metrics(metrics.clone()),
    );
    let server = Noise::new(
        IdentityKeyPair::generate(),
        NoiseConfig::default().with_noise_pipes(true),
    );
    cache.store(server.peer_id(), [7u8; 32]);

    let (c, s) = connect(&client, &server, Some(server.peer_id().clone())).await;
    let (mut c, mut s) = (c.unwrap(), s.unwrap());
    assert_eq!(c.pattern, PatternKind::XxFallback);
    assert_eq!(s.pattern, PatternKind::XxFallback);
    assert_eq!(c.handshake_hash, s.handshake_hash);
    assert_eq!(cache.load(server.peer_id()), Some(server.static_public_key()));

    exchange(&mut c, &mut s, b"after fallback").await;

    let snap = metrics.snapshot();
    assert_eq!(snap.ik_error, 1);
    assert_eq!(snap.xx_fallback_success, 1);
}

#[tokio::test]
async fn test_pipes_responder_accepts_plain_xx() {
    let metrics = Arc::new(NoiseMetrics::new());
    let client = Noise::new(IdentityKeyPair::generate(), NoiseConfig::default());
    let server = Noise::new(
        IdentityKeyPair::generate(),
        NoiseConfig::default()
            .with_noise_pipes(true)
            .with_metrics(metrics.clone()),
    );
    let (c, s) = connect(&client, &server, None).await;
    let (mut c, mut s) = (c.unwrap(), s.unwrap());
    assert_eq!(c.pattern, PatternKind::Xx);
    assert_eq!(s.pattern, PatternKind::Xx);
    assert_eq!(c.handshake_hash, s.handshake_hash);
    exchange(&mut s, &mut c, b"test").await;

    // A plain XX opener is neither an IK failure nor a fallback.
    let snap = metrics.snapshot();
    assert_eq!(snap.xx_success, 1);
    assert_eq!(snap.xx_fallback_success, 0);
    assert_eq!(snap.ik_error, 0);
}

#[tokio::test]
async fn test_handshake_timeout() {
    let client = Noise::new(
        IdentityKeyPair::generate(),
        NoiseConfig::default().with_handshake_timeout(Duration::from_millis(50)),
    );
    // Keep the other end open but silent.
    let (a, _b) = duplex(1024);
    let err = client.secure_outbound(a, None).await.unwrap_err();
    assert!(matches!(err, VeilStreamError::HandshakeTimeout(_)));
}

#[tokio::test]
async fn test_peer_hangup_reports_eof() {
    let client = Noise::new(IdentityKeyPair::generate(), NoiseConfig::default());
    let (a, b) = duplex(1024);
    drop(b);
    let err = client.secure_outbound(a, None).await.unwrap_err();
    assert!(matches!(
        err,
        VeilStreamError::Io(_) | VeilStreamError::UnexpectedEof { .. }
    ));
}
