use std::fmt;
use std::sync::Arc;

use zeroize::Zeroize;

use super::pattern::{MessagePattern, Pattern, Token};
use super::{NoiseSession, Role, SymmetricState, PUBKEY_SIZE};
use crate::crypto::{CryptoProvider, KeyPair};
use crate::error::{Result, VeilTrustError};
use crate::handshake::messages::{MessageBuffer, MessageLayout};

/// Executes one handshake pattern token by token.
///
/// Messages alternate between the roles starting with the initiator. Each
/// call to [`write_message`](Self::write_message) or
/// [`read_message`](Self::read_message) consumes one message of the
/// pattern; calling out of turn fails with `InvalidStateTransition`. Any
/// failure poisons the state.
pub struct HandshakeState {
    pattern: &'static Pattern,
    role: Role,
    symmetric: SymmetricState,
    crypto: Arc<dyn CryptoProvider>,
    s: KeyPair,
    e: Option<KeyPair>,
    rs: Option<[u8; PUBKEY_SIZE]>,
    re: Option<[u8; PUBKEY_SIZE]>,
    message_index: usize,
    failed: bool,
}

impl HandshakeState {
    /// Initialize a handshake, mix the prologue and process pre-messages.
    ///
    /// `remote_static` is required for the initiator of a pattern with a
    /// responder static pre-message (IK) and ignored otherwise.
    pub fn new(
        pattern: &'static Pattern,
        role: Role,
        prologue: &[u8],
        local_static: KeyPair,
        remote_static: Option<[u8; PUBKEY_SIZE]>,
        crypto: Arc<dyn CryptoProvider>,
    ) -> Result<Self> {
        let mut symmetric = SymmetricState::initialize(pattern.protocol_name, crypto.clone());
        symmetric.mix_hash(prologue);

        let mut rs = None;
        if pattern.responder_static_premessage {
            match role {
                Role::Initiator => {
                    let key = remote_static.ok_or(VeilTrustError::MissingKey("remote static"))?;
                    symmetric.mix_hash(&key);
                    rs = Some(key);
                }
                Role::Responder => symmetric.mix_hash(local_static.public_key()),
            }
        }

        Ok(Self {
            pattern,
            role,
            symmetric,
            crypto,
            s: local_static,
            e: None,
            rs,
            re: None,
            message_index: 0,
            failed: false,
        })
    }

    /// Use `ephemeral` instead of generating one at the `e` token.
    pub fn with_ephemeral(mut self, ephemeral: KeyPair) -> Self {
        self.e = Some(ephemeral);
        self
    }

    pub fn pattern(&self) -> &'static Pattern {
        self.pattern
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Index of the next message to be written or read.
    pub fn message_index(&self) -> usize {
        self.message_index
    }

    pub fn is_complete(&self) -> bool {
        self.message_index >= self.pattern.len()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Whether the next message is ours to write.
    pub fn is_my_turn(&self) -> bool {
        !self.is_complete() && (self.message_index % 2 == 0) == self.role.is_initiator()
    }

    pub fn local_static_public(&self) -> [u8; PUBKEY_SIZE] {
        *self.s.public_key()
    }

    pub fn local_ephemeral_public(&self) -> Option<[u8; PUBKEY_SIZE]> {
        self.e.as_ref().map(|e| *e.public_key())
    }

    /// Hand the local ephemeral keypair to another handshake (XX-fallback).
    pub fn take_local_ephemeral(&mut self) -> Option<KeyPair> {
        self.e.take()
    }

    pub fn remote_static(&self) -> Option<[u8; PUBKEY_SIZE]> {
        self.rs
    }

    pub fn remote_ephemeral(&self) -> Option<[u8; PUBKEY_SIZE]> {
        self.re
    }

    pub fn handshake_hash(&self) -> [u8; 32] {
        self.symmetric.handshake_hash()
    }

    fn stage_label(&self) -> String {
        if self.failed {
            "failed".into()
        } else if self.is_complete() {
            "complete".into()
        } else {
            format!("{} message {}", self.pattern.name, self.message_index)
        }
    }

    fn next_message(&self, writing: bool) -> Result<&'static MessagePattern> {
        let to = if writing { "write" } else { "read" };
        if self.failed || self.is_complete() || self.is_my_turn() != writing {
            return Err(VeilTrustError::InvalidStateTransition {
                from: self.stage_label(),
                to: format!("{} {to}", self.role),
            });
        }
        self.pattern
            .message(self.message_index)
            .ok_or(VeilTrustError::HandshakeNotComplete)
    }

    /// Layout of message `message` as it will appear on the wire given the
    /// current key state.
    fn layout(&self, message: &MessagePattern) -> MessageLayout {
        let mut keyed = self.symmetric.has_key();
        let mut has_static = false;
        for token in message.tokens {
            match token {
                Token::S => {
                    has_static = true;
                    break;
                }
                t if t.is_dh() => keyed = true,
                _ => {}
            }
        }
        MessageLayout::new(message.has_ephemeral(), has_static, keyed)
    }

    fn dh(&self, token: Token) -> Result<[u8; 32]> {
        let local_e = || self.e.as_ref().ok_or(VeilTrustError::MissingKey("local ephemeral"));
        let remote_e = || self.re.as_ref().ok_or(VeilTrustError::MissingKey("remote ephemeral"));
        let remote_s = || self.rs.as_ref().ok_or(VeilTrustError::MissingKey("remote static"));
        let initiator = self.role.is_initiator();

        let (private, public) = match token {
            Token::EE => (local_e()?.private_key(), remote_e()?),
            Token::ES if initiator => (local_e()?.private_key(), remote_s()?),
            Token::ES => (self.s.private_key(), remote_e()?),
            Token::SE if initiator => (self.s.private_key(), remote_e()?),
            Token::SE => (local_e()?.private_key(), remote_s()?),
            Token::SS => (self.s.private_key(), remote_s()?),
            Token::E | Token::S => {
                return Err(VeilTrustError::InvalidStateTransition {
                    from: self.stage_label(),
                    to: format!("dh on token {token}"),
                })
            }
        };
        self.crypto.x25519_dh(private, public)
    }

    /// Write the next message carrying `payload`.
    pub fn write_message(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let message = self.next_message(true)?;
        let result = self.write_tokens(message, payload);
        self.finish_step(result)
    }

    fn write_tokens(&mut self, message: &MessagePattern, payload: &[u8]) -> Result<Vec<u8>> {
        let layout = self.layout(message);
        let mut buffer = MessageBuffer::default();

        for token in message.tokens {
            match token {
                Token::E => {
                    if self.e.is_none() {
                        self.e = Some(self.crypto.generate_x25519_keypair());
                    }
                    let public = self
                        .local_ephemeral_public()
                        .ok_or(VeilTrustError::MissingKey("local ephemeral"))?;
                    buffer.ne = public;
                    self.symmetric.mix_hash(&public);
                }
                Token::S => {
                    buffer.ns = self.symmetric.encrypt_and_hash(self.s.public_key())?;
                }
                dh => {
                    let mut shared = self.dh(*dh)?;
                    let mixed = self.symmetric.mix_key(&shared);
                    shared.zeroize();
                    mixed?;
                }
            }
        }

        buffer.ciphertext = self.symmetric.encrypt_and_hash(payload)?;
        buffer.encode(layout)
    }

    /// Read the next message, returning its decrypted payload.
    pub fn read_message(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let message = self.next_message(false)?;
        let result = self.read_tokens(message, data);
        self.finish_step(result)
    }

    fn read_tokens(&mut self, message: &MessagePattern, data: &[u8]) -> Result<Vec<u8>> {
        let buffer = MessageBuffer::decode(data, self.layout(message))?;

        for token in message.tokens {
            match token {
                Token::E => {
                    self.re = Some(buffer.ne);
                    self.symmetric.mix_hash(&buffer.ne);
                }
                Token::S => {
                    let key = self.symmetric.decrypt_and_hash(&buffer.ns)?;
                    let key: [u8; PUBKEY_SIZE] = key.as_slice().try_into().map_err(|_| {
                        VeilTrustError::InvalidKey(format!("remote static is {} bytes", key.len()))
                    })?;
                    self.rs = Some(key);
                }
                dh => {
                    let mut shared = self.dh(*dh)?;
                    let mixed = self.symmetric.mix_key(&shared);
                    shared.zeroize();
                    mixed?;
                }
            }
        }

        self.symmetric.decrypt_and_hash(&buffer.ciphertext)
    }

    /// Mark the handshake failed after a check outside the token engine.
    pub(crate) fn abort(&mut self) {
        self.failed = true;
    }

    fn finish_step<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(v) => {
                self.message_index += 1;
                Ok(v)
            }
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Split into transport ciphers. The initiator sends with `cs1` and
    /// receives with `cs2`; the responder mirrors that.
    pub fn into_session(self) -> Result<NoiseSession> {
        if self.failed || !self.is_complete() {
            return Err(VeilTrustError::HandshakeNotComplete);
        }
        let remote_static = self.rs.ok_or(VeilTrustError::MissingKey("remote static"))?;
        let handshake_hash = self.symmetric.handshake_hash();
        let (cs1, cs2) = self.symmetric.split()?;
        Ok(NoiseSession::new(self.role, cs1, cs2, handshake_hash, remote_static))
    }
}

impl fmt::Debug for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeState")
            .field("pattern", &self.pattern.name)
            .field("role", &self.role)
            .field("message_index", &self.message_index)
            .field("failed", &self.failed)
            .field("has_ephemeral", &self.e.is_some())
            .field("has_remote_static", &self.rs.is_some())
            .field("has_remote_ephemeral", &self.re.is_some())
            .finish()
    }
}
