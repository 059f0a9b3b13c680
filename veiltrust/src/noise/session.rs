use std::fmt;

use super::{CipherState, Role, PUBKEY_SIZE};
use crate::error::Result;
use crate::transport::{ChunkDecryptor, ChunkEncryptor};

/// The transport phase of a completed handshake: one cipher per direction.
pub struct NoiseSession {
    role: Role,
    /// Sends with cs1 as initiator, cs2 as responder.
    send: CipherState,
    recv: CipherState,
    handshake_hash: [u8; 32],
    remote_static: [u8; PUBKEY_SIZE],
}

impl NoiseSession {
    pub(crate) fn new(
        role: Role,
        cs1: CipherState,
        cs2: CipherState,
        handshake_hash: [u8; 32],
        remote_static: [u8; PUBKEY_SIZE],
    ) -> Self {
        let (send, recv) = match role {
            Role::Initiator => (cs1, cs2),
            Role::Responder => (cs2, cs1),
        };
        Self {
            role,
            send,
            recv,
            handshake_hash,
            remote_static,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Final handshake hash, usable for channel binding.
    pub fn handshake_hash(&self) -> &[u8; 32] {
        &self.handshake_hash
    }

    /// The peer's Noise static public key.
    pub fn remote_static(&self) -> &[u8; PUBKEY_SIZE] {
        &self.remote_static
    }

    /// The first split cipher (initiator to responder).
    pub fn cs1(&self) -> &CipherState {
        match self.role {
            Role::Initiator => &self.send,
            Role::Responder => &self.recv,
        }
    }

    /// The second split cipher (responder to initiator).
    pub fn cs2(&self) -> &CipherState {
        match self.role {
            Role::Initiator => &self.recv,
            Role::Responder => &self.send,
        }
    }

    pub fn send_nonce(&self) -> u64 {
        self.send.nonce()
    }

    pub fn recv_nonce(&self) -> u64 {
        self.recv.nonce()
    }

    /// Encrypt one transport message.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.send.encrypt_with_ad(&[], plaintext)
    }

    /// Decrypt one transport message.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.recv.decrypt_with_ad(&[], ciphertext)
    }

    /// Hand the ciphers to the chunking transport.
    pub fn into_transport(self) -> (ChunkEncryptor, ChunkDecryptor) {
        (ChunkEncryptor::new(self.send), ChunkDecryptor::new(self.recv))
    }
}

impl fmt::Debug for NoiseSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoiseSession")
            .field("role", &self.role)
            .field("send_nonce", &self.send.nonce())
            .field("recv_nonce", &self.recv.nonce())
            .field("handshake_hash", &crate::crypto::Hex(&self.handshake_hash))
            .finish()
    }
}
