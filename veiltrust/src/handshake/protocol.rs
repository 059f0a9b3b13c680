// Handshake executors with identity binding.
//
//   XX                                 IK
//   Initiator            Responder     Initiator            Responder
//     |--- e ---------------->|          |--- e,es,s,ss,P --->|
//     |<-- e,ee,s,es,P -------|          |<-- e,ee,se,P ------|
//     |--- s,se,P ----------->|          |==== transport =====|
//     |==== transport ========|
//
// P is the signed identity payload. XX-fallback starts from a failed IK
// message A: the responder keeps only its ephemeral key, the initiator
// replays XX message A with the same ephemeral key and then reads the
// responder's reply as XX message B.

use std::sync::Arc;

use crate::crypto::keys::{IdentityKeyPair, PeerId};
use crate::crypto::{CryptoProvider, KeyPair};
use crate::error::{Result, VeilTrustError};
use crate::handshake::state::PatternKind;
use crate::noise::{HandshakeState, NoiseSession, Role, PUBKEY_SIZE};
use crate::payload::builder::PayloadBuilder;
use crate::payload::validator::{verify_payload, RemoteIdentity};
use crate::payload::NoiseHandshakePayload;

/// Local parameters shared by every handshake variant.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Our Noise static keypair.
    pub static_keypair: KeyPair,
    /// Bytes mixed into the transcript before the first message.
    pub prologue: Vec<u8>,
    /// Extension data sent inside our identity payload.
    pub extension_data: Vec<u8>,
    /// The peer we expect; a different verified identity aborts.
    pub expected_peer: Option<PeerId>,
    pub crypto: Arc<dyn CryptoProvider>,
}

impl HandshakeConfig {
    pub fn new(static_keypair: KeyPair, crypto: Arc<dyn CryptoProvider>) -> Self {
        Self {
            static_keypair,
            prologue: Vec::new(),
            extension_data: Vec::new(),
            expected_peer: None,
            crypto,
        }
    }

    pub fn with_prologue(mut self, prologue: impl Into<Vec<u8>>) -> Self {
        self.prologue = prologue.into();
        self
    }

    pub fn with_extension_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.extension_data = data.into();
        self
    }

    pub fn expect_peer(mut self, peer: Option<PeerId>) -> Self {
        self.expected_peer = peer;
        self
    }
}

/// Drives one handshake variant for one role, creating our identity
/// payload and verifying the peer's.
#[derive(Debug)]
pub struct Handshake {
    kind: PatternKind,
    role: Role,
    state: Option<HandshakeState>,
    payload: Vec<u8>,
    expected_peer: Option<PeerId>,
    remote: Option<RemoteIdentity>,
}

impl Handshake {
    fn start(
        kind: PatternKind,
        role: Role,
        identity: &IdentityKeyPair,
        config: HandshakeConfig,
        remote_static: Option<[u8; PUBKEY_SIZE]>,
        ephemeral: Option<KeyPair>,
    ) -> Result<Self> {
        let payload = PayloadBuilder::new(identity)
            .static_key(*config.static_keypair.public_key())
            .data(config.extension_data)
            .build()?
            .to_bytes();

        let mut state = HandshakeState::new(
            kind.pattern(),
            role,
            &config.prologue,
            config.static_keypair,
            remote_static,
            config.crypto,
        )?;
        if let Some(e) = ephemeral {
            state = state.with_ephemeral(e);
        }

        Ok(Self {
            kind,
            role,
            state: Some(state),
            payload,
            expected_peer: config.expected_peer,
            remote: None,
        })
    }

    /// XX: no prior knowledge of the peer's static key.
    pub fn xx(role: Role, identity: &IdentityKeyPair, config: HandshakeConfig) -> Result<Self> {
        Self::start(PatternKind::Xx, role, identity, config, None, None)
    }

    /// IK: the initiator must supply the responder's static key.
    pub fn ik(
        role: Role,
        identity: &IdentityKeyPair,
        config: HandshakeConfig,
        remote_static: Option<[u8; PUBKEY_SIZE]>,
    ) -> Result<Self> {
        Self::start(PatternKind::Ik, role, identity, config, remote_static, None)
    }

    /// XX-fallback from a failed IK attempt.
    ///
    /// `seed` is the message that failed: IK message A on the responder,
    /// the responder's reply on the initiator. The initiator must pass the
    /// ephemeral keypair its IK attempt already sent; the responder never
    /// generated one and passes `None`.
    ///
    /// On return the responder is ready to write XX message B and the
    /// initiator, having verified the responder's identity, is ready to
    /// write XX message C.
    pub fn xx_fallback(
        role: Role,
        identity: &IdentityKeyPair,
        config: HandshakeConfig,
        seed: &[u8],
        ephemeral: Option<KeyPair>,
    ) -> Result<Self> {
        match role {
            Role::Initiator => {
                let e = ephemeral.ok_or(VeilTrustError::MissingKey("local ephemeral"))?;
                let mut hs =
                    Self::start(PatternKind::XxFallback, role, identity, config, None, Some(e))?;
                // Replay of XX message A: the peer already holds these bytes.
                hs.write_next()?;
                hs.read_next(seed)?;
                Ok(hs)
            }
            Role::Responder => {
                if seed.len() < PUBKEY_SIZE {
                    return Err(VeilTrustError::MessageTooShort {
                        expected: PUBKEY_SIZE,
                        actual: seed.len(),
                    });
                }
                let mut hs =
                    Self::start(PatternKind::XxFallback, role, identity, config, None, None)?;
                hs.read_next(&seed[..PUBKEY_SIZE])?;
                Ok(hs)
            }
        }
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Index of the next message of the pattern.
    pub fn stage(&self) -> usize {
        self.state
            .as_ref()
            .map_or(self.kind.pattern().len(), HandshakeState::message_index)
    }

    pub fn is_my_turn(&self) -> bool {
        self.state.as_ref().is_some_and(HandshakeState::is_my_turn)
    }

    pub fn is_complete(&self) -> bool {
        self.state.as_ref().map_or(true, HandshakeState::is_complete)
    }

    /// The verified remote identity, once its payload has been read.
    pub fn remote_identity(&self) -> Option<&RemoteIdentity> {
        self.remote.as_ref()
    }

    /// Current handshake hash; `None` after the split.
    pub fn handshake_hash(&self) -> Option<[u8; 32]> {
        self.state.as_ref().map(HandshakeState::handshake_hash)
    }

    /// Take the ephemeral keypair sent so far, for [`Handshake::xx_fallback`].
    pub fn take_local_ephemeral(&mut self) -> Option<KeyPair> {
        self.state.as_mut().and_then(HandshakeState::take_local_ephemeral)
    }

    fn carries_identity(state: &HandshakeState) -> bool {
        state
            .pattern()
            .message(state.message_index())
            .is_some_and(|m| m.carries_identity)
    }

    /// Produce the next outgoing handshake message.
    pub fn write_next(&mut self) -> Result<Vec<u8>> {
        let state = self.state.as_mut().ok_or(VeilTrustError::AlreadySplit)?;
        if Self::carries_identity(state) {
            state.write_message(&self.payload)
        } else {
            state.write_message(&[])
        }
    }

    /// Consume the next incoming handshake message, verifying the peer's
    /// identity payload when the message carries one.
    pub fn read_next(&mut self, message: &[u8]) -> Result<()> {
        let state = self.state.as_mut().ok_or(VeilTrustError::AlreadySplit)?;
        let carries_identity = Self::carries_identity(state);
        let payload = state.read_message(message)?;
        if !carries_identity {
            return Ok(());
        }

        let verified = state
            .remote_static()
            .ok_or(VeilTrustError::MissingKey("remote static"))
            .and_then(|remote_static| {
                let decoded = NoiseHandshakePayload::from_bytes(&payload)?;
                verify_payload(&decoded, &remote_static, self.expected_peer.as_ref())
            });
        match verified {
            Ok(identity) => {
                self.remote = Some(identity);
                Ok(())
            }
            Err(e) => {
                state.abort();
                Err(e)
            }
        }
    }

    /// Split into transport ciphers. A second call returns `AlreadySplit`.
    pub fn split(&mut self) -> Result<(NoiseSession, RemoteIdentity)> {
        match &self.state {
            None => return Err(VeilTrustError::AlreadySplit),
            Some(state) if state.is_failed() || !state.is_complete() => {
                return Err(VeilTrustError::HandshakeNotComplete)
            }
            Some(_) => {}
        }
        let remote = self.remote.clone().ok_or(VeilTrustError::HandshakeNotComplete)?;
        let state = self.state.take().ok_or(VeilTrustError::AlreadySplit)?;
        Ok((state.into_session()?, remote))
    }

    /// Consume the executor and split.
    pub fn into_session(mut self) -> Result<(NoiseSession, RemoteIdentity)> {
        self.split()
    }
}
