// X25519 key pairs and Diffie-Hellman for Noise static and ephemeral keys.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, VeilTrustError};

/// Size of an X25519 public or private key.
pub const DH_LEN: usize = 32;

/// An X25519 key pair. The private half is wiped when the pair is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    public_key: [u8; DH_LEN],
    private_key: [u8; DH_LEN],
}

impl KeyPair {
    /// Generate a new random key pair from the OS RNG.
    pub fn generate() -> Self {
        let mut seed = [0u8; DH_LEN];
        OsRng.fill_bytes(&mut seed);
        let kp = Self::from_seed(seed);
        seed.zeroize();
        kp
    }

    /// Derive a key pair from 32 secret bytes (clamped by X25519 on use).
    pub fn from_seed(seed: [u8; DH_LEN]) -> Self {
        let secret = StaticSecret::from(seed);
        let public = PublicKey::from(&secret);
        Self {
            public_key: *public.as_bytes(),
            private_key: secret.to_bytes(),
        }
    }

    /// The 32-byte public key.
    pub fn public_key(&self) -> &[u8; DH_LEN] {
        &self.public_key
    }

    /// The 32-byte private key.
    pub fn private_key(&self) -> &[u8; DH_LEN] {
        &self.private_key
    }

    /// Perform Diffie-Hellman with a peer's public key.
    pub fn diffie_hellman(&self, peer_public: &[u8; DH_LEN]) -> Result<[u8; DH_LEN]> {
        diffie_hellman(&self.private_key, peer_public)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &super::to_hex(&self.public_key))
            .field("private_key", &"[redacted]")
            .finish()
    }
}

/// X25519 scalar multiplication. Rejects low-order peer keys, which would
/// otherwise produce an all-zero shared secret.
pub fn diffie_hellman(private_key: &[u8; DH_LEN], peer_public: &[u8; DH_LEN]) -> Result<[u8; DH_LEN]> {
    let secret = StaticSecret::from(*private_key);
    let shared = secret.diffie_hellman(&PublicKey::from(*peer_public));
    if !shared.was_contributory() {
        return Err(VeilTrustError::InvalidKey(
            "x25519 public key has low order".into(),
        ));
    }
    Ok(*shared.as_bytes())
}
