// Payload builder: fluent API for signing the static-key binding.

use crate::crypto::keys::IdentityKeyPair;
use crate::error::{Result, VeilTrustError};
use crate::payload::NoiseHandshakePayload;

/// Builder for a signed [`NoiseHandshakePayload`].
///
/// # Example
/// ```ignore
/// let payload = PayloadBuilder::new(&identity)
///     .static_key(*noise_keypair.public_key())
///     .data(b"extensions".to_vec())
///     .build()?;
/// ```
pub struct PayloadBuilder<'a> {
    identity: &'a IdentityKeyPair,
    static_key: Option<[u8; 32]>,
    data: Vec<u8>,
}

impl<'a> PayloadBuilder<'a> {
    /// Start building a payload that will be signed by `identity`.
    pub fn new(identity: &'a IdentityKeyPair) -> Self {
        Self {
            identity,
            static_key: None,
            data: Vec::new(),
        }
    }

    /// The Noise static public key being vouched for.
    pub fn static_key(mut self, key: [u8; 32]) -> Self {
        self.static_key = Some(key);
        self
    }

    /// Early / extension data carried alongside the signature.
    pub fn data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// Consume the builder and produce a signed payload.
    pub fn build(self) -> Result<NoiseHandshakePayload> {
        let static_key = self
            .static_key
            .ok_or(VeilTrustError::MissingKey("noise static"))?;
        let signable = NoiseHandshakePayload::signable_bytes(&static_key);
        Ok(NoiseHandshakePayload {
            identity_key: self.identity.public().to_protobuf_encoding(),
            identity_sig: self.identity.sign(&signable).to_vec(),
            data: self.data,
        })
    }
}
