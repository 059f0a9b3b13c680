//! Noise protocol engine for `Noise_{XX,IK}_25519_ChaChaPoly_SHA256`.
//!
//! The engine is split the way the Noise framework itself is layered:
//!
//! - [`CipherState`]: a key and a 64-bit nonce counter.
//! - [`SymmetricState`]: chaining key, handshake hash and the handshake
//!   cipher; mixes keys and transcript data.
//! - [`HandshakeState`]: executes a [`Pattern`] token by token.
//! - [`NoiseSession`]: the two transport ciphers produced by `split`.
//!
//! Nothing here performs I/O. Callers move handshake messages between
//! peers and drive the state machines in lockstep.

mod pattern;
mod session;
mod state;
mod symmetric;

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroize;

use crate::crypto::CryptoProvider;
use crate::error::{Result, VeilTrustError};

pub use pattern::{MessagePattern, Pattern, Token, IK, XX};
pub use session::NoiseSession;
pub use state::HandshakeState;
pub use symmetric::SymmetricState;

/// Protocol name for the XX pattern (also used by XX-fallback).
pub const PROTOCOL_NAME_XX: &str = "Noise_XX_25519_ChaChaPoly_SHA256";

/// Protocol name for the IK pattern.
pub const PROTOCOL_NAME_IK: &str = "Noise_IK_25519_ChaChaPoly_SHA256";

/// Maximum size of any Noise message, handshake or transport.
pub const MAX_MESSAGE_SIZE: usize = 65535;

/// Size of the AEAD tag.
pub const TAG_SIZE: usize = 16;

/// Largest plaintext that still fits a single transport message.
pub const MAX_PLAINTEXT_SIZE: usize = MAX_MESSAGE_SIZE - TAG_SIZE;

/// Size of an X25519 public key on the wire.
pub const PUBKEY_SIZE: usize = 32;

/// Nonce value reserved by the framework; reaching it exhausts the cipher.
const NONCE_CEILING: u64 = u64::MAX;

/// Role in the handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// We opened the connection.
    Initiator,
    /// They opened the connection.
    Responder,
}

impl Role {
    pub fn is_initiator(self) -> bool {
        matches!(self, Role::Initiator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => write!(f, "initiator"),
            Role::Responder => write!(f, "responder"),
        }
    }
}

/// A ChaCha20-Poly1305 key with its nonce counter.
///
/// The nonce increases by one after every successful operation and is
/// never reused. Once it reaches `2^64 - 1` the state refuses further use
/// with [`VeilTrustError::NonceExhausted`].
pub struct CipherState {
    key: [u8; 32],
    nonce: u64,
    has_key: bool,
    crypto: Arc<dyn CryptoProvider>,
}

impl CipherState {
    /// A keyed cipher state starting at nonce 0.
    pub fn new(key: [u8; 32], crypto: Arc<dyn CryptoProvider>) -> Self {
        Self {
            key,
            nonce: 0,
            has_key: true,
            crypto,
        }
    }

    /// A cipher state with no key. Encryption passes data through.
    pub(crate) fn empty(crypto: Arc<dyn CryptoProvider>) -> Self {
        Self {
            key: [0u8; 32],
            nonce: 0,
            has_key: false,
            crypto,
        }
    }

    pub(crate) fn initialize_key(&mut self, key: [u8; 32]) {
        self.key.zeroize();
        self.key = key;
        self.nonce = 0;
        self.has_key = true;
    }

    /// Whether a key has been installed.
    pub fn has_key(&self) -> bool {
        self.has_key
    }

    /// The next nonce to be used.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Skip the counter forward, e.g. past nonces a peer has already
    /// consumed. Moving it backwards would reuse a nonce under the same key
    /// and fails with `NonceRewind`.
    pub fn set_nonce(&mut self, nonce: u64) -> Result<()> {
        if nonce < self.nonce {
            return Err(VeilTrustError::NonceRewind {
                current: self.nonce,
                requested: nonce,
            });
        }
        self.nonce = nonce;
        Ok(())
    }

    /// The raw key, for channel binding and opt-in key logging.
    pub fn key(&self) -> Option<&[u8; 32]> {
        self.has_key.then_some(&self.key)
    }

    fn check_nonce(&self) -> Result<()> {
        if self.nonce == NONCE_CEILING {
            return Err(VeilTrustError::NonceExhausted);
        }
        Ok(())
    }

    /// Seal `plaintext` with associated data `ad`. Without a key the
    /// plaintext is returned unchanged.
    pub fn encrypt_with_ad(&mut self, ad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        if !self.has_key {
            return Ok(plaintext.to_vec());
        }
        if plaintext.len() > MAX_PLAINTEXT_SIZE {
            return Err(VeilTrustError::MessageTooLarge {
                size: plaintext.len(),
                max: MAX_PLAINTEXT_SIZE,
            });
        }
        self.check_nonce()?;

        let ciphertext =
            self.crypto
                .chacha20_poly1305_encrypt(plaintext, self.nonce, ad, &self.key)?;
        self.nonce += 1;
        Ok(ciphertext)
    }

    /// Open `ciphertext` (with appended tag). On authentication failure the
    /// nonce is not advanced.
    pub fn decrypt_with_ad(&mut self, ad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if !self.has_key {
            return Ok(ciphertext.to_vec());
        }
        if ciphertext.len() < TAG_SIZE {
            return Err(VeilTrustError::MessageTooShort {
                expected: TAG_SIZE,
                actual: ciphertext.len(),
            });
        }
        self.check_nonce()?;

        let plaintext =
            self.crypto
                .chacha20_poly1305_decrypt(ciphertext, self.nonce, ad, &self.key)?;
        self.nonce += 1;
        Ok(plaintext)
    }

    /// Replace the key with `ENCRYPT(k, 2^64 - 1, "", zeros)`. The nonce
    /// counter is left unchanged.
    pub fn rekey(&mut self) -> Result<()> {
        if !self.has_key {
            return Err(VeilTrustError::MissingKey("cipher"));
        }
        let mut sealed =
            self.crypto
                .chacha20_poly1305_encrypt(&[0u8; 32], NONCE_CEILING, &[], &self.key)?;
        self.key.copy_from_slice(&sealed[..32]);
        sealed.zeroize();
        Ok(())
    }
}

impl Drop for CipherState {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for CipherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherState")
            .field("nonce", &self.nonce)
            .field("has_key", &self.has_key)
            .field("key", &"[redacted]")
            .finish()
    }
}
