// Ed25519 identity keys, their libp2p protobuf encoding, and Peer IDs.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::crypto::to_hex;
use crate::error::{Result, VeilTrustError};
use crate::payload::serializer::{put_bytes_field, put_varint_field, FieldReader, WireValue};

/// Protobuf `KeyType` value for Ed25519.
const KEY_TYPE_ED25519: u64 = 1;

/// Multihash code for the identity hash (digest is the input itself).
const MULTIHASH_IDENTITY: u8 = 0x00;

/// Multihash code for SHA2-256.
const MULTIHASH_SHA2_256: u8 = 0x12;

/// Encoded keys up to this length are inlined into the Peer ID.
const MAX_INLINE_KEY_LEN: usize = 42;

/// An Ed25519 identity keypair: the long-term key a peer signs its Noise
/// static key with.
#[derive(Debug)]
pub struct IdentityKeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    peer_id: PeerId,
}

impl IdentityKeyPair {
    /// Generate a fresh random Ed25519 keypair.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Reconstruct from a 32-byte secret seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        let peer_id = PeerId::from_public_key(&PublicKey::Ed25519(verifying_key));
        Self {
            signing_key,
            verifying_key,
            peer_id,
        }
    }

    /// The Peer ID derived from the public key.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// The public half as a [`PublicKey`].
    pub fn public(&self) -> PublicKey {
        PublicKey::Ed25519(self.verifying_key)
    }

    /// The 32-byte Ed25519 public key.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// The 32-byte secret key seed.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign arbitrary data.
    pub fn sign(&self, data: &[u8]) -> [u8; 64] {
        let sig: Signature = self.signing_key.sign(data);
        sig.to_bytes()
    }

    /// Verify a signature against the public key.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        self.public().verify(data, signature)
    }
}

/// A peer's long-term public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ed25519(VerifyingKey),
}

impl PublicKey {
    /// Verify `signature` over `data`.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        match self {
            PublicKey::Ed25519(vk) => {
                let sig = Signature::from_slice(signature)
                    .map_err(|_| VeilTrustError::SignatureVerification)?;
                vk.verify(data, &sig)
                    .map_err(|_| VeilTrustError::SignatureVerification)
            }
        }
    }

    /// Protobuf encoding:
    ///
    /// ```text
    /// message PublicKey {
    ///   required KeyType Type = 1;
    ///   required bytes Data = 2;
    /// }
    /// ```
    pub fn to_protobuf_encoding(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(36);
        match self {
            PublicKey::Ed25519(vk) => {
                put_varint_field(&mut buf, 1, KEY_TYPE_ED25519);
                put_bytes_field(&mut buf, 2, vk.as_bytes());
            }
        }
        buf
    }

    /// Decode the protobuf encoding produced by [`Self::to_protobuf_encoding`].
    pub fn from_protobuf_encoding(data: &[u8]) -> Result<Self> {
        let mut key_type = None;
        let mut key_data = None;
        for field in FieldReader::new(data) {
            let (number, value) = field?;
            match (number, value) {
                (1, WireValue::Varint(v)) => key_type = Some(v),
                (2, WireValue::Bytes(b)) => key_data = Some(b),
                _ => {}
            }
        }
        let key_type = key_type.ok_or(VeilTrustError::PayloadMissingField("PublicKey.Type"))?;
        let key_data = key_data.ok_or(VeilTrustError::PayloadMissingField("PublicKey.Data"))?;

        if key_type != KEY_TYPE_ED25519 {
            return Err(VeilTrustError::UnsupportedKeyType(key_type));
        }
        let bytes: [u8; 32] = key_data.try_into().map_err(|_| {
            VeilTrustError::InvalidKey(format!("ed25519 key must be 32 bytes, got {}", key_data.len()))
        })?;
        let vk = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| VeilTrustError::InvalidKey(format!("{e}")))?;
        Ok(PublicKey::Ed25519(vk))
    }
}

/// A peer's identity: a multihash of its protobuf-encoded public key.
///
/// Keys whose encoding fits in 42 bytes (all Ed25519 keys) are inlined with
/// the identity multihash, so the public key can be recovered from the id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId {
    multihash: Vec<u8>,
}

impl PeerId {
    /// Derive the Peer ID of a public key.
    pub fn from_public_key(key: &PublicKey) -> Self {
        let encoded = key.to_protobuf_encoding();
        let mut multihash = Vec::with_capacity(2 + encoded.len());
        if encoded.len() <= MAX_INLINE_KEY_LEN {
            multihash.push(MULTIHASH_IDENTITY);
            multihash.push(encoded.len() as u8);
            multihash.extend_from_slice(&encoded);
        } else {
            multihash.push(MULTIHASH_SHA2_256);
            multihash.push(32);
            multihash.extend_from_slice(&crate::crypto::hash::hash_sha256(&encoded));
        }
        Self { multihash }
    }

    /// Parse a Peer ID from its multihash bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(VeilTrustError::InvalidPeerId("truncated multihash".into()));
        }
        let (code, len) = (bytes[0], bytes[1] as usize);
        match code {
            MULTIHASH_IDENTITY if len <= MAX_INLINE_KEY_LEN => {}
            MULTIHASH_SHA2_256 if len == 32 => {}
            _ => {
                return Err(VeilTrustError::InvalidPeerId(format!(
                    "unsupported multihash code 0x{code:02x} with length {len}"
                )))
            }
        }
        if bytes.len() != 2 + len {
            return Err(VeilTrustError::InvalidPeerId(format!(
                "multihash length {len} does not match {} digest bytes",
                bytes.len() - 2
            )));
        }
        Ok(Self {
            multihash: bytes.to_vec(),
        })
    }

    /// The multihash bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.multihash.clone()
    }

    /// Borrow the multihash bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.multihash
    }

    /// Recover the public key from an inlined (identity multihash) Peer ID.
    pub fn public_key(&self) -> Option<PublicKey> {
        if self.multihash[0] != MULTIHASH_IDENTITY {
            return None;
        }
        PublicKey::from_protobuf_encoding(&self.multihash[2..]).ok()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex(&self.multihash))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({self})")
    }
}
