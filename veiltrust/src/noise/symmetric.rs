use std::fmt;
use std::sync::Arc;

use zeroize::Zeroize;

use super::CipherState;
use crate::crypto::{CryptoProvider, HASH_LEN};
use crate::error::Result;

/// Symmetric state during a handshake: chaining key `ck`, handshake hash
/// `h` and the cipher used for handshake payloads.
pub struct SymmetricState {
    ck: [u8; HASH_LEN],
    h: [u8; HASH_LEN],
    cipher: CipherState,
    crypto: Arc<dyn CryptoProvider>,
}

impl SymmetricState {
    /// Initialize from a protocol name. Names up to 32 bytes are zero
    /// padded; longer names are hashed.
    pub fn initialize(protocol_name: &str, crypto: Arc<dyn CryptoProvider>) -> Self {
        let name = protocol_name.as_bytes();
        let h = if name.len() <= HASH_LEN {
            let mut h = [0u8; HASH_LEN];
            h[..name.len()].copy_from_slice(name);
            h
        } else {
            crypto.hash_sha256(name)
        };

        Self {
            ck: h,
            h,
            cipher: CipherState::empty(crypto.clone()),
            crypto,
        }
    }

    /// `h = HASH(h || data)`.
    pub fn mix_hash(&mut self, data: &[u8]) {
        let mut buf = Vec::with_capacity(HASH_LEN + data.len());
        buf.extend_from_slice(&self.h);
        buf.extend_from_slice(data);
        self.h = self.crypto.hash_sha256(&buf);
    }

    /// `ck, k = HKDF(ck, ikm)`; installs `k` as the handshake cipher key.
    pub fn mix_key(&mut self, input_key_material: &[u8]) -> Result<()> {
        let (ck, mut temp_key, mut unused) = self.crypto.hkdf(&self.ck, input_key_material)?;
        self.ck.zeroize();
        self.ck = ck;
        self.cipher.initialize_key(temp_key);
        temp_key.zeroize();
        unused.zeroize();
        Ok(())
    }

    /// Whether at least one `mix_key` has happened.
    pub fn has_key(&self) -> bool {
        self.cipher.has_key()
    }

    /// Encrypt with `h` as associated data (pass-through before the first
    /// key), then mix the ciphertext into `h`.
    pub fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = self.cipher.encrypt_with_ad(&self.h, plaintext)?;
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    /// Decrypt with `h` as associated data, then mix the ciphertext into
    /// `h`. AEAD failure leaves `h` untouched and returns `Decryption`.
    pub fn decrypt_and_hash(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let plaintext = self.cipher.decrypt_with_ad(&self.h, ciphertext)?;
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    /// The current handshake hash.
    pub fn handshake_hash(&self) -> [u8; HASH_LEN] {
        self.h
    }

    /// Derive the two transport ciphers `(cs1, cs2)` from `ck`.
    /// Consumes the state; nothing can be mixed afterwards.
    pub fn split(self) -> Result<(CipherState, CipherState)> {
        let (k1, k2, mut unused) = self.crypto.hkdf(&self.ck, &[])?;
        unused.zeroize();
        Ok((
            CipherState::new(k1, self.crypto.clone()),
            CipherState::new(k2, self.crypto.clone()),
        ))
    }
}

impl Drop for SymmetricState {
    fn drop(&mut self) {
        self.ck.zeroize();
    }
}

impl fmt::Debug for SymmetricState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricState")
            .field("h", &crate::crypto::Hex(&self.h))
            .field("cipher", &self.cipher)
            .finish()
    }
}
