// Identity payload carried inside the Noise handshake: binds the sender's
// Noise static key to its long-term identity key.

pub mod builder;
pub mod serializer;
pub mod validator;

/// Domain prefix of the signed static-key binding.
pub const STATIC_KEY_DOMAIN: &[u8] = b"noise-libp2p-static-key:";

/// The identity payload exchanged in the encrypted part of a handshake
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoiseHandshakePayload {
    /// Protobuf-encoded long-term public key.
    pub identity_key: Vec<u8>,
    /// Signature over `STATIC_KEY_DOMAIN || noise_static_public_key`.
    pub identity_sig: Vec<u8>,
    /// Early / extension data; empty when absent.
    pub data: Vec<u8>,
}

impl NoiseHandshakePayload {
    /// The bytes the identity key signs for a given Noise static key.
    pub fn signable_bytes(noise_static_key: &[u8; 32]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(STATIC_KEY_DOMAIN.len() + noise_static_key.len());
        buf.extend_from_slice(STATIC_KEY_DOMAIN);
        buf.extend_from_slice(noise_static_key);
        buf
    }

    /// Protobuf encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        serializer::serialize(self)
    }

    /// Decode from protobuf.
    pub fn from_bytes(data: &[u8]) -> crate::error::Result<Self> {
        serializer::deserialize(data)
    }
}
