// VeilTrust error types

use thiserror::Error;

/// Top-level error type for the VeilTrust crate.
#[derive(Debug, Error)]
pub enum VeilTrustError {
    // ── Crypto errors ───────────────────────────────────────────────────
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("signature verification failed")]
    SignatureVerification,

    #[error("AEAD encryption failed: {0}")]
    Encryption(String),

    /// AEAD tag mismatch. This is the "invalid" result of every decrypt
    /// boundary, handshake and transport alike.
    #[error("AEAD decryption failed: authentication tag mismatch")]
    Decryption,

    #[error("nonce exhausted: cipher state must be replaced by a new handshake")]
    NonceExhausted,

    #[error("nonce may only move forward: {current} -> {requested}")]
    NonceRewind { current: u64, requested: u64 },

    // ── Identity errors ─────────────────────────────────────────────────
    #[error("unsupported identity key type: {0}")]
    UnsupportedKeyType(u64),

    #[error("invalid peer id: {0}")]
    InvalidPeerId(String),

    #[error("identity mismatch: expected peer {expected}, payload carries {actual}")]
    IdentityMismatch { expected: String, actual: String },

    #[error("static key signature from peer {peer} does not cover the noise static key")]
    StaticKeySignature { peer: String },

    // ── Codec errors ────────────────────────────────────────────────────
    #[error("message too short: expected at least {expected} bytes, got {actual}")]
    MessageTooShort { expected: usize, actual: usize },

    #[error("message too large: {size} bytes exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("handshake payload decode error: {0}")]
    PayloadDecode(String),

    #[error("handshake payload missing required field: {0}")]
    PayloadMissingField(&'static str),

    // ── Handshake state errors ──────────────────────────────────────────
    #[error("invalid handshake state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("handshake not complete")]
    HandshakeNotComplete,

    #[error("handshake already split into transport ciphers")]
    AlreadySplit,

    #[error("missing {0} key")]
    MissingKey(&'static str),

    // ── Transport errors ────────────────────────────────────────────────
    #[error("transport stream corrupted by an earlier authentication failure")]
    StreamCorrupted,
}

impl VeilTrustError {
    /// True for failures that come from the peer's bytes (AEAD, codec,
    /// identity) rather than from misuse of the local state machine.
    pub fn is_peer_fault(&self) -> bool {
        !matches!(
            self,
            VeilTrustError::InvalidStateTransition { .. }
                | VeilTrustError::HandshakeNotComplete
                | VeilTrustError::AlreadySplit
                | VeilTrustError::NonceExhausted
                | VeilTrustError::NonceRewind { .. }
                | VeilTrustError::Encryption(_)
        )
    }

    /// True when a failed IK message may be retried as XX-fallback: the
    /// bytes did not fit the IK transcript, as opposed to a transcript that
    /// decrypted but named the wrong identity.
    pub fn permits_fallback(&self) -> bool {
        matches!(
            self,
            VeilTrustError::Decryption
                | VeilTrustError::MessageTooShort { .. }
                | VeilTrustError::InvalidKey(_)
        )
    }
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, VeilTrustError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_misuse_is_not_peer_fault() {
        assert!(!VeilTrustError::AlreadySplit.is_peer_fault());
        assert!(!VeilTrustError::NonceExhausted.is_peer_fault());
        assert!(!VeilTrustError::NonceRewind {
            current: 2,
            requested: 1
        }
        .is_peer_fault());
        assert!(VeilTrustError::Decryption.is_peer_fault());
    }

    #[test]
    fn identity_failures_do_not_fall_back() {
        assert!(VeilTrustError::Decryption.permits_fallback());
        assert!(!VeilTrustError::StaticKeySignature { peer: "p".into() }.permits_fallback());
        assert!(!VeilTrustError::IdentityMismatch {
            expected: "a".into(),
            actual: "b".into()
        }
        .permits_fallback());
    }

    #[test]
    fn errors_do_not_leak_key_material() {
        let msg = VeilTrustError::IdentityMismatch {
            expected: "00240801".into(),
            actual: "00240802".into(),
        }
        .to_string();
        assert_eq!(
            msg,
            "identity mismatch: expected peer 00240801, payload carries 00240802"
        );
    }
}
