// Crypto module: the pluggable primitive set used by the Noise engine.
//
// Every provider must be byte-for-byte interoperable with every other:
// a ciphertext sealed by one opens under any other given the same key,
// nonce and associated data.

pub mod hash;
pub mod keys;
#[cfg(feature = "ring")]
pub mod ring_crypto;
pub mod rustcrypto;
pub mod x25519;

use std::fmt::{self, Debug, Write as _};
use std::sync::Arc;

use crate::error::Result;

pub use hash::HASH_LEN;
#[cfg(feature = "ring")]
pub use ring_crypto::RingCrypto;
pub use rustcrypto::RustCrypto;
pub use x25519::{KeyPair, DH_LEN};

/// Size of the ChaCha20-Poly1305 nonce on the wire.
pub const NONCE_LEN: usize = 12;

/// Size of the Poly1305 tag appended to every sealed message.
pub const TAG_LEN: usize = 16;

/// The primitive set a Noise session is built from: SHA-256, HKDF,
/// X25519 and ChaCha20-Poly1305.
///
/// The provider is chosen once, at session construction, and shared by
/// every cipher state the session creates.
pub trait CryptoProvider: Send + Sync + Debug {
    /// SHA-256 of `data`.
    fn hash_sha256(&self, data: &[u8]) -> [u8; HASH_LEN];

    /// Noise HKDF producing three 32-byte outputs.
    fn hkdf(
        &self,
        chaining_key: &[u8; HASH_LEN],
        input_key_material: &[u8],
    ) -> Result<([u8; HASH_LEN], [u8; HASH_LEN], [u8; HASH_LEN])>;

    /// Fresh random X25519 key pair.
    fn generate_x25519_keypair(&self) -> KeyPair;

    /// X25519 key pair from a 32-byte seed.
    fn x25519_keypair_from_seed(&self, seed: [u8; DH_LEN]) -> KeyPair;

    /// X25519 Diffie-Hellman.
    fn x25519_dh(&self, private_key: &[u8; DH_LEN], public_key: &[u8; DH_LEN])
        -> Result<[u8; DH_LEN]>;

    /// Seal `plaintext`, returning ciphertext || 16-byte tag.
    fn chacha20_poly1305_encrypt(
        &self,
        plaintext: &[u8],
        nonce: u64,
        ad: &[u8],
        key: &[u8; 32],
    ) -> Result<Vec<u8>>;

    /// Open ciphertext || tag. Returns `VeilTrustError::Decryption` when the
    /// tag does not authenticate.
    fn chacha20_poly1305_decrypt(
        &self,
        ciphertext: &[u8],
        nonce: u64,
        ad: &[u8],
        key: &[u8; 32],
    ) -> Result<Vec<u8>>;
}

/// The provider used when the caller does not inject one.
pub fn default_provider() -> Arc<dyn CryptoProvider> {
    Arc::new(RustCrypto)
}

/// Encode a Noise nonce counter as the 12-byte ChaCha20-Poly1305 nonce:
/// four zero bytes followed by the counter in little-endian order.
pub fn nonce_bytes(counter: u64) -> [u8; NONCE_LEN] {
    let mut n = [0u8; NONCE_LEN];
    n[4..].copy_from_slice(&counter.to_le_bytes());
    n
}

/// Lowercase hex rendering used for peer ids, logs and key dumps.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Wrapper that renders bytes as hex in `Display` and `Debug` contexts.
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
