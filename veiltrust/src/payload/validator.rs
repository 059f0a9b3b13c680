// Payload validator: recover the remote identity, check it against any
// pinned peer, then check the static-key signature.

use crate::crypto::keys::{PeerId, PublicKey};
use crate::error::{Result, VeilTrustError};
use crate::payload::NoiseHandshakePayload;

/// The outcome of a successful payload verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIdentity {
    pub peer_id: PeerId,
    pub public_key: PublicKey,
    /// Extension data the remote sent with its identity; empty if none.
    pub data: Vec<u8>,
}

/// Verify a decrypted identity payload against the Noise static key the
/// remote actually used in the handshake.
///
/// When `expected_peer` is set, the peer id derived from the embedded key
/// must equal it exactly.
pub fn verify_payload(
    payload: &NoiseHandshakePayload,
    remote_static: &[u8; 32],
    expected_peer: Option<&PeerId>,
) -> Result<RemoteIdentity> {
    let public_key = PublicKey::from_protobuf_encoding(&payload.identity_key)?;
    let peer_id = PeerId::from_public_key(&public_key);

    if let Some(expected) = expected_peer {
        if *expected != peer_id {
            return Err(VeilTrustError::IdentityMismatch {
                expected: expected.to_string(),
                actual: peer_id.to_string(),
            });
        }
    }

    let signable = NoiseHandshakePayload::signable_bytes(remote_static);
    public_key
        .verify(&signable, &payload.identity_sig)
        .map_err(|_| VeilTrustError::StaticKeySignature {
            peer: peer_id.to_string(),
        })?;

    Ok(RemoteIdentity {
        peer_id,
        public_key,
        data: payload.data.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::IdentityKeyPair;
    use crate::payload::builder::PayloadBuilder;

    fn signed(kp: &IdentityKeyPair, static_key: [u8; 32]) -> NoiseHandshakePayload {
        PayloadBuilder::new(kp)
            .static_key(static_key)
            .data(b"ext".to_vec())
            .build()
            .unwrap()
    }

    #[test]
    fn valid_payload() {
        let kp = IdentityKeyPair::generate();
        let payload = signed(&kp, [7; 32]);
        let remote = verify_payload(&payload, &[7; 32], Some(kp.peer_id())).unwrap();
        assert_eq!(&remote.peer_id, kp.peer_id());
        assert_eq!(remote.data, b"ext");
    }

    #[test]
    fn unpinned_payload_is_accepted() {
        let kp = IdentityKeyPair::generate();
        let remote = verify_payload(&signed(&kp, [7; 32]), &[7; 32], None).unwrap();
        assert_eq!(remote.public_key, kp.public());
    }

    #[test]
    fn different_static_key_fails() {
        let kp = IdentityKeyPair::generate();
        let err = verify_payload(&signed(&kp, [7; 32]), &[8; 32], None).unwrap_err();
        assert!(matches!(err, VeilTrustError::StaticKeySignature { .. }));
    }

    #[test]
    fn pinned_peer_mismatch_fails() {
        let kp = IdentityKeyPair::generate();
        let other = IdentityKeyPair::generate();
        let err =
            verify_payload(&signed(&kp, [7; 32]), &[7; 32], Some(other.peer_id())).unwrap_err();
        match err {
            VeilTrustError::IdentityMismatch { expected, actual } => {
                assert_eq!(expected, other.peer_id().to_string());
                assert_eq!(actual, kp.peer_id().to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn garbage_identity_key_fails() {
        let kp = IdentityKeyPair::generate();
        let mut payload = signed(&kp, [7; 32]);
        payload.identity_key = vec![0x08, 0x01];
        assert!(verify_payload(&payload, &[7; 32], None).is_err());
    }
}
