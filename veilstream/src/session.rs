//! Session orchestrator: runs a Noise handshake over any async byte stream
//! and hands back a [`SecureStream`].
//!
//! Handshake messages and transport frames share one
//! `Framed<T, LengthDelimitedCodec>` with a 2-byte big-endian length
//! prefix, so bytes the peer sends right after its last handshake message
//! are already buffered for the secured stream.
//!
//! Pattern selection:
//!
//! | pipes | side      | behaviour                                              |
//! |-------|-----------|--------------------------------------------------------|
//! | off   | both      | XX                                                     |
//! | on    | initiator | IK if the pinned peer has a cached static key, else XX |
//! | on    | responder | IK, falling back to XX when message A is rejected      |
//!
//! A pipes-enabled responder that receives a bare 32-byte ephemeral key
//! runs plain XX, since the peer never attempted IK.
//!
//! An IK initiator whose reply does not validate also falls back to XX,
//! reusing the ephemeral key it already sent.

use std::future::Future;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use veiltrust::crypto::Hex;
use veiltrust::noise::PUBKEY_SIZE;
use veiltrust::{
    Handshake, HandshakeConfig, IdentityKeyPair, KeyPair, NoiseSession, PatternKind, PeerId,
    PublicKey, Role, VeilTrustError, MAX_MESSAGE_SIZE,
};

use crate::config::NoiseConfig;
use crate::error::{Result, VeilStreamError};
use crate::stream::SecureStream;

/// Protocol identifier used during connection upgrade negotiation.
pub const PROTOCOL_ID: &str = "/noise";

/// The result of a successful handshake.
#[derive(Debug)]
pub struct SecuredConnection<T> {
    pub stream: SecureStream<T>,
    /// Verified peer id of the remote.
    pub remote_peer: PeerId,
    pub remote_public_key: PublicKey,
    /// Extension data the remote sent in its identity payload.
    pub remote_extension_data: Vec<u8>,
    /// The remote's Noise static key.
    pub remote_static_key: [u8; 32],
    pub handshake_hash: [u8; 32],
    /// The handshake variant this side completed.
    pub pattern: PatternKind,
}

/// Secures connections with a fixed identity and configuration.
#[derive(Debug)]
pub struct Noise {
    identity: IdentityKeyPair,
    static_keypair: KeyPair,
    config: NoiseConfig,
}

fn framed<T: AsyncRead + AsyncWrite>(io: T) -> Framed<T, LengthDelimitedCodec> {
    let codec = LengthDelimitedCodec::builder()
        .length_field_length(2)
        .max_frame_length(MAX_MESSAGE_SIZE)
        .new_codec();
    Framed::new(io, codec)
}

fn engine_error(pattern: PatternKind, stage: usize) -> impl FnOnce(VeilTrustError) -> VeilStreamError {
    move |source| VeilStreamError::Handshake {
        pattern,
        stage,
        source,
    }
}

async fn recv_frame<T>(
    io: &mut Framed<T, LengthDelimitedCodec>,
    pattern: PatternKind,
    stage: usize,
) -> Result<BytesMut>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    match io.next().await {
        Some(frame) => Ok(frame?),
        None => Err(VeilStreamError::UnexpectedEof { pattern, stage }),
    }
}

async fn write_step<T>(io: &mut Framed<T, LengthDelimitedCodec>, hs: &mut Handshake) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let stage = hs.stage();
    let message = hs.write_next().map_err(engine_error(hs.kind(), stage))?;
    tracing::trace!(pattern = %hs.kind(), stage, len = message.len(), "handshake message out");
    io.send(Bytes::from(message)).await?;
    Ok(())
}

async fn read_step<T>(io: &mut Framed<T, LengthDelimitedCodec>, hs: &mut Handshake) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let stage = hs.stage();
    let message = recv_frame(io, hs.kind(), stage).await?;
    tracing::trace!(pattern = %hs.kind(), stage, len = message.len(), "handshake message in");
    hs.read_next(&message).map_err(engine_error(hs.kind(), stage))
}

impl Noise {
    /// Build from an identity and configuration. A Noise static keypair is
    /// generated when the configuration does not carry one.
    pub fn new(identity: IdentityKeyPair, mut config: NoiseConfig) -> Self {
        let static_keypair = config
            .static_keypair
            .take()
            .unwrap_or_else(|| config.crypto.generate_x25519_keypair());
        Self {
            identity,
            static_keypair,
            config,
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        self.identity.peer_id()
    }

    /// Our Noise static public key, as peers will cache it.
    pub fn static_public_key(&self) -> [u8; 32] {
        *self.static_keypair.public_key()
    }

    pub fn config(&self) -> &NoiseConfig {
        &self.config
    }

    /// Run the initiator side. When `remote_peer` is set, the verified
    /// remote identity must match it.
    pub async fn secure_outbound<T>(
        &self,
        io: T,
        remote_peer: Option<PeerId>,
    ) -> Result<SecuredConnection<T>>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let result = self.with_deadline(self.run_outbound(framed(io), remote_peer)).await;
        self.record_failure(&result);
        result
    }

    /// Run the responder side.
    pub async fn secure_inbound<T>(
        &self,
        io: T,
        remote_peer: Option<PeerId>,
    ) -> Result<SecuredConnection<T>>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let result = self.with_deadline(self.run_inbound(framed(io), remote_peer)).await;
        self.record_failure(&result);
        result
    }

    async fn with_deadline<F, R>(&self, fut: F) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        match self.config.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| VeilStreamError::HandshakeTimeout(limit))?,
            None => fut.await,
        }
    }

    fn record_failure<R>(&self, result: &Result<R>) {
        if let Err(e) = result {
            tracing::debug!(error = %e, "noise handshake failed");
            if let (Some(m), Some(pattern)) = (&self.config.metrics, e.pattern()) {
                m.record_handshake(pattern, false);
            }
        }
    }

    fn handshake_config(&self, expected_peer: Option<PeerId>) -> HandshakeConfig {
        HandshakeConfig::new(self.static_keypair.clone(), self.config.crypto.clone())
            .with_prologue(self.config.prologue.clone())
            .with_extension_data(self.config.extension_data.clone())
            .expect_peer(expected_peer)
    }

    fn cached_static_key(&self, peer: &PeerId) -> Option<[u8; 32]> {
        let cache = self.config.key_cache.as_ref()?;
        let hit = cache.load(peer);
        tracing::debug!(peer = %peer, hit = hit.is_some(), "static key cache lookup");
        hit
    }

    async fn run_outbound<T>(
        &self,
        mut io: Framed<T, LengthDelimitedCodec>,
        remote_peer: Option<PeerId>,
    ) -> Result<SecuredConnection<T>>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let cached = match &remote_peer {
            Some(peer) if self.config.use_noise_pipes => self.cached_static_key(peer),
            _ => None,
        };

        let Some(remote_static) = cached else {
            let mut hs = Handshake::xx(
                Role::Initiator,
                &self.identity,
                self.handshake_config(remote_peer),
            )
            .map_err(engine_error(PatternKind::Xx, 0))?;
            tracing::debug!(pattern = %hs.kind(), role = %Role::Initiator, "starting noise handshake");
            write_step(&mut io, &mut hs).await?;
            read_step(&mut io, &mut hs).await?;
            write_step(&mut io, &mut hs).await?;
            return self.finish(io, hs);
        };

        let mut hs = Handshake::ik(
            Role::Initiator,
            &self.identity,
            self.handshake_config(remote_peer.clone()),
            Some(remote_static),
        )
        .map_err(engine_error(PatternKind::Ik, 0))?;
        tracing::debug!(pattern = %hs.kind(), role = %Role::Initiator, "starting noise handshake");
        write_step(&mut io, &mut hs).await?;

        let reply = recv_frame(&mut io, PatternKind::Ik, 1).await?;
        match hs.read_next(&reply) {
            Ok(()) => self.finish(io, hs),
            Err(e) if e.permits_fallback() => {
                tracing::debug!(error = %e, "IK reply rejected, falling back to XX");
                if let Some(m) = &self.config.metrics {
                    m.record_handshake(PatternKind::Ik, false);
                }
                if let (Some(cache), Some(peer)) = (&self.config.key_cache, &remote_peer) {
                    cache.remove(peer);
                }
                let ephemeral = hs
                    .take_local_ephemeral()
                    .ok_or(VeilTrustError::MissingKey("local ephemeral"))
                    .map_err(engine_error(PatternKind::Ik, 1))?;
                let mut fallback = Handshake::xx_fallback(
                    Role::Initiator,
                    &self.identity,
                    self.handshake_config(remote_peer),
                    &reply,
                    Some(ephemeral),
                )
                .map_err(engine_error(PatternKind::XxFallback, 1))?;
                write_step(&mut io, &mut fallback).await?;
                self.finish(io, fallback)
            }
            Err(e) => Err(engine_error(PatternKind::Ik, 1)(e)),
        }
    }

    async fn run_inbound<T>(
        &self,
        mut io: Framed<T, LengthDelimitedCodec>,
        remote_peer: Option<PeerId>,
    ) -> Result<SecuredConnection<T>>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        if !self.config.use_noise_pipes {
            let mut hs = Handshake::xx(
                Role::Responder,
                &self.identity,
                self.handshake_config(remote_peer),
            )
            .map_err(engine_error(PatternKind::Xx, 0))?;
            tracing::debug!(pattern = %hs.kind(), role = %Role::Responder, "starting noise handshake");
            read_step(&mut io, &mut hs).await?;
            write_step(&mut io, &mut hs).await?;
            read_step(&mut io, &mut hs).await?;
            return self.finish(io, hs);
        }

        let mut hs = Handshake::ik(
            Role::Responder,
            &self.identity,
            self.handshake_config(remote_peer.clone()),
            None,
        )
        .map_err(engine_error(PatternKind::Ik, 0))?;
        tracing::debug!(pattern = %hs.kind(), role = %Role::Responder, "starting noise handshake");

        let first = recv_frame(&mut io, PatternKind::Ik, 0).await?;
        match hs.read_next(&first) {
            Ok(()) => {
                write_step(&mut io, &mut hs).await?;
                self.finish(io, hs)
            }
            Err(_) if first.len() == PUBKEY_SIZE => {
                // A bare ephemeral key is a plain XX opener, not a failed IK attempt.
                tracing::trace!("peer opened with XX");
                let mut xx = Handshake::xx(
                    Role::Responder,
                    &self.identity,
                    self.handshake_config(remote_peer),
                )
                .map_err(engine_error(PatternKind::Xx, 0))?;
                xx.read_next(&first).map_err(engine_error(PatternKind::Xx, 0))?;
                write_step(&mut io, &mut xx).await?;
                read_step(&mut io, &mut xx).await?;
                self.finish(io, xx)
            }
            Err(e) if e.permits_fallback() => {
                tracing::debug!(error = %e, "IK message rejected, falling back to XX");
                if let Some(m) = &self.config.metrics {
                    m.record_handshake(PatternKind::Ik, false);
                }
                let mut fallback = Handshake::xx_fallback(
                    Role::Responder,
                    &self.identity,
                    self.handshake_config(remote_peer),
                    &first,
                    None,
                )
                .map_err(engine_error(PatternKind::XxFallback, 0))?;
                write_step(&mut io, &mut fallback).await?;
                read_step(&mut io, &mut fallback).await?;
                self.finish(io, fallback)
            }
            Err(e) => Err(engine_error(PatternKind::Ik, 0)(e)),
        }
    }

    fn finish<T>(
        &self,
        io: Framed<T, LengthDelimitedCodec>,
        hs: Handshake,
    ) -> Result<SecuredConnection<T>> {
        let (pattern, stage) = (hs.kind(), hs.stage());
        let (session, remote) = hs.into_session().map_err(engine_error(pattern, stage))?;
        let remote_static_key = *session.remote_static();
        let handshake_hash = *session.handshake_hash();

        if let Some(cache) = &self.config.key_cache {
            cache.store(&remote.peer_id, remote_static_key);
        }
        if self.config.dump_session_keys {
            dump_keys(&session);
        }
        if let Some(m) = &self.config.metrics {
            m.record_handshake(pattern, true);
        }
        tracing::debug!(
            pattern = %pattern,
            role = %session.role(),
            peer = %remote.peer_id,
            "noise handshake complete"
        );

        let (encryptor, decryptor) = session.into_transport();
        Ok(SecuredConnection {
            stream: SecureStream::new(io, encryptor, decryptor, self.config.metrics.clone()),
            remote_peer: remote.peer_id,
            remote_public_key: remote.public_key,
            remote_extension_data: remote.data,
            remote_static_key,
            handshake_hash,
            pattern,
        })
    }
}

fn dump_keys(session: &NoiseSession) {
    let cs1 = session.cs1().key().map(|k| Hex(k).to_string()).unwrap_or_default();
    let cs2 = session.cs2().key().map(|k| Hex(k).to_string()).unwrap_or_default();
    tracing::debug!(
        role = %session.role(),
        handshake_hash = %Hex(session.handshake_hash()),
        cs1 = %cs1,
        cs2 = %cs2,
        "noise session keys"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_static_key_is_kept() {
        let crypto = veiltrust::default_provider();
        let kp = crypto.generate_x25519_keypair();
        let public = *kp.public_key();
        let noise = Noise::new(
            IdentityKeyPair::generate(),
            NoiseConfig::default().with_static_keypair(kp),
        );
        assert_eq!(noise.static_public_key(), public);
        assert!(noise.config().static_keypair.is_none());
    }

    #[test]
    fn missing_static_key_is_generated() {
        let a = Noise::new(IdentityKeyPair::generate(), NoiseConfig::default());
        let b = Noise::new(IdentityKeyPair::generate(), NoiseConfig::default());
        assert_ne!(a.static_public_key(), b.static_public_key());
    }

    #[test]
    fn engine_error_carries_stage() {
        let err = engine_error(PatternKind::Ik, 1)(VeilTrustError::Decryption);
        assert_eq!(err.pattern(), Some(PatternKind::Ik));
        assert!(matches!(err, VeilStreamError::Handshake { stage: 1, .. }));
        assert!(err.to_string().contains("IK"));
    }
}
