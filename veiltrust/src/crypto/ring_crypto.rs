// ring-backed provider: SHA-256, HMAC-SHA256 HKDF and ChaCha20-Poly1305 from
// ring. ring only does X25519 with its own ephemeral private keys, so the
// scalar multiplication goes through x25519-dalek like the default provider.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, CHACHA20_POLY1305};
use ring::{digest, hmac};

use crate::crypto::hash::HASH_LEN;
use crate::crypto::x25519::{self, KeyPair, DH_LEN};
use crate::crypto::{nonce_bytes, CryptoProvider};
use crate::error::{Result, VeilTrustError};

/// Provider built on `ring`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RingCrypto;

fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; HASH_LEN] {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    let mut ctx = hmac::Context::with_key(&key);
    for part in parts {
        ctx.update(part);
    }
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(ctx.sign().as_ref());
    out
}

fn sealing_key(key: &[u8; 32]) -> Option<LessSafeKey> {
    UnboundKey::new(&CHACHA20_POLY1305, key)
        .ok()
        .map(LessSafeKey::new)
}

impl CryptoProvider for RingCrypto {
    fn hash_sha256(&self, data: &[u8]) -> [u8; HASH_LEN] {
        let d = digest::digest(&digest::SHA256, data);
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(d.as_ref());
        out
    }

    fn hkdf(
        &self,
        chaining_key: &[u8; HASH_LEN],
        input_key_material: &[u8],
    ) -> Result<([u8; HASH_LEN], [u8; HASH_LEN], [u8; HASH_LEN])> {
        let temp_key = hmac_sha256(chaining_key, &[input_key_material]);
        let out1 = hmac_sha256(&temp_key, &[&[0x01]]);
        let out2 = hmac_sha256(&temp_key, &[&out1, &[0x02]]);
        let out3 = hmac_sha256(&temp_key, &[&out2, &[0x03]]);
        Ok((out1, out2, out3))
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
        let key = sealing_key(key)
            .ok_or_else(|| VeilTrustError::Encryption("chacha20-poly1305 key rejected".into()))?;
        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes(nonce)),
            Aad::from(ad),
            &mut in_out,
        )
        .map_err(|_| VeilTrustError::Encryption("chacha20-poly1305 seal failed".into()))?;
        Ok(in_out)
    }

    fn chacha20_poly1305_decrypt(
        &self,
        ciphertext: &[u8],
        nonce: u64,
        ad: &[u8],
        key: &[u8; 32],
    ) -> Result<Vec<u8>> {
        let key = sealing_key(key).ok_or(VeilTrustError::Decryption)?;
        let mut in_out = ciphertext.to_vec();
        let plaintext_len = key
            .open_in_place(
                Nonce::assume_unique_for_key(nonce_bytes(nonce)),
                Aad::from(ad),
                &mut in_out,
            )
            .map_err(|_| VeilTrustError::Decryption)?
            .len();
        in_out.truncate(plaintext_len);
        Ok(in_out)
    }
}
