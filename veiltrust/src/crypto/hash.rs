// SHA-256 and the Noise HKDF construction.

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{Result, VeilTrustError};

/// SHA-256 output length, and the length of every HKDF output.
pub const HASH_LEN: usize = 32;

/// SHA-256 hash of `data`, returning a 32-byte digest.
pub fn hash_sha256(data: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Noise HKDF: HKDF-SHA256 with the chaining key as salt and an empty info
/// string, expanded to three 32-byte outputs.
///
/// ```text
/// temp_key = HMAC(ck, ikm)
/// out1     = HMAC(temp_key, 0x01)
/// out2     = HMAC(temp_key, out1 || 0x02)
/// out3     = HMAC(temp_key, out2 || 0x03)
/// ```
pub fn hkdf_sha256(
    chaining_key: &[u8; HASH_LEN],
    input_key_material: &[u8],
) -> Result<([u8; HASH_LEN], [u8; HASH_LEN], [u8; HASH_LEN])> {
    let hk = Hkdf::<Sha256>::new(Some(chaining_key), input_key_material);
    let mut okm = Zeroizing::new([0u8; HASH_LEN * 3]);
    hk.expand(&[], &mut okm[..])
        .map_err(|e| VeilTrustError::Encryption(format!("HKDF expand error: {e}")))?;

    let mut k1 = [0u8; HASH_LEN];
    let mut k2 = [0u8; HASH_LEN];
    let mut k3 = [0u8; HASH_LEN];
    k1.copy_from_slice(&okm[..32]);
    k2.copy_from_slice(&okm[32..64]);
    k3.copy_from_slice(&okm[64..]);
    Ok((k1, k2, k3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::to_hex;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("") = e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        let hash = hash_sha256(b"");
        assert_eq!(
            to_hex(&hash),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hkdf_outputs_are_distinct() {
        let (k1, k2, k3) = hkdf_sha256(&[1u8; 32], b"ikm").unwrap();
        assert_ne!(k1, k2);
        assert_ne!(k2, k3);
        assert_ne!(k1, k3);
    }

    #[test]
    fn hkdf_accepts_empty_and_long_ikm() {
        let ck = [3u8; 32];
        let (a1, a2, _) = hkdf_sha256(&ck, b"").unwrap();
        let (b1, b2, _) = hkdf_sha256(&ck, &[0xEE; 4096]).unwrap();
        assert_ne!(a1, b1);
        assert_ne!(a2, b2);
    }

    #[test]
    fn hkdf_deterministic() {
        assert_eq!(
            hkdf_sha256(&[2u8; 32], b"a").unwrap(),
            hkdf_sha256(&[2u8; 32], b"a").unwrap()
        );
    }
}
