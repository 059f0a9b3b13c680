// VeilTrust: Noise XX / IK / XX-fallback handshakes bound to Ed25519 peer
// identities, plus the post-handshake chunk cipher.
//
// Crate root: module declarations and public re-exports. Nothing in this
// crate performs I/O.

pub mod crypto;
pub mod error;
pub mod handshake;
pub mod noise;
pub mod payload;
pub mod transport;

// Re-export key types at crate root for convenience.
pub use crypto::keys::{IdentityKeyPair, PeerId, PublicKey};
pub use crypto::{default_provider, CryptoProvider, KeyPair, RustCrypto};
#[cfg(feature = "ring")]
pub use crypto::RingCrypto;
pub use error::{Result, VeilTrustError};
pub use handshake::{Handshake, HandshakeConfig, PatternKind};
pub use noise::{
    CipherState, NoiseSession, Role, MAX_MESSAGE_SIZE, MAX_PLAINTEXT_SIZE, TAG_SIZE,
};
pub use payload::validator::RemoteIdentity;
pub use transport::{ChunkDecryptor, ChunkEncryptor};
