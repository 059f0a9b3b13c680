// Pure-Rust provider: sha2, hkdf, chacha20poly1305 (RFC 8439), x25519-dalek.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};

use crate::crypto::hash::{hash_sha256, hkdf_sha256, HASH_LEN};
use crate::crypto::x25519::{self, KeyPair, DH_LEN};
use crate::crypto::{nonce_bytes, CryptoProvider};
use crate::error::{Result, VeilTrustError};

/// The default provider, built on the RustCrypto crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustCrypto;

impl CryptoProvider for RustCrypto {
    fn hash_sha256(&self, data: &[u8]) -> [u8; HASH_LEN] {
        hash_sha256(data)
    }

    fn hkdf(
        &self,
        chaining_key: &[u8; HASH_LEN],
        input_key_material: &[u8],
    ) -> Result<([u8; HASH_LEN], [u8; HASH_LEN], [u8; HASH_LEN])> {
        hkdf_sha256(chaining_key, input_key_material)
    }

    fn generate_x25519_keypair(&self) -> KeyPair {
        KeyPair::generate()
    }

    fn x25519_keypair_from_seed(&self, seed: [u8; DH_LEN]) -> KeyPair {
        KeyPair::from_seed(seed)
    }

    fn x25519_dh(
        &self,
        private_key: &[u8; DH_LEN],
        public_key: &[u8; DH_LEN],
    ) -> Result<[u8; DH_LEN]> {
        x25519::diffie_hellman(private_key, public_key)
    }

    fn chacha20_poly1305_encrypt(
        &self,
        plaintext: &[u8],
        nonce: u64,
        ad: &[u8],
        key: &[u8; 32],
    ) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(key)
            .map_err(|e| VeilTrustError::Encryption(format!("cipher init: {e}")))?;
        let nonce = nonce_bytes(nonce);
        cipher
            .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad: ad })
            .map_err(|e| VeilTrustError::Encryption(format!("{e}")))
    }

    fn chacha20_poly1305_decrypt(
        &self,
        ciphertext: &[u8],
        nonce: u64,
        ad: &[u8],
        key: &[u8; 32],
    ) -> Result<Vec<u8>> {
        let cipher =
            ChaCha20Poly1305::new_from_slice(key).map_err(|_| VeilTrustError::Decryption)?;
        let nonce = nonce_bytes(nonce);
        cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad: ad,
                },
            )
            .map_err(|_| VeilTrustError::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_no_ad() {
        let key = [0x42u8; 32];
        let ct = RustCrypto
            .chacha20_poly1305_encrypt(b"hello veil", 0, b"", &key)
            .unwrap();
        assert_eq!(ct.len(), b"hello veil".len() + 16);
        let pt = RustCrypto.chacha20_poly1305_decrypt(&ct, 0, b"", &key).unwrap();
        assert_eq!(pt, b"hello veil");
    }

    #[test]
    fn wrong_ad_fails() {
        let key = [0xAAu8; 32];
        let ct = RustCrypto
            .chacha20_poly1305_encrypt(b"data", 2, b"good ad", &key)
            .unwrap();
        let err = RustCrypto
            .chacha20_poly1305_decrypt(&ct, 2, b"bad ad", &key)
            .unwrap_err();
        assert!(matches!(err, VeilTrustError::Decryption));
    }

    #[test]
    fn wrong_nonce_fails() {
        let key = [0x33u8; 32];
        let ct = RustCrypto.chacha20_poly1305_encrypt(b"data", 1, b"", &key).unwrap();
        assert!(RustCrypto.chacha20_poly1305_decrypt(&ct, 2, b"", &key).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = [0xBBu8; 32];
        let mut ct = RustCrypto.chacha20_poly1305_encrypt(b"data", 3, b"", &key).unwrap();
        ct[0] ^= 0xFF;
        assert!(RustCrypto.chacha20_poly1305_decrypt(&ct, 3, b"", &key).is_err());
    }
}
