//! Post-handshake chunk cipher.
//!
//! Outgoing plaintext is cut into chunks of at most [`MAX_PLAINTEXT_SIZE`]
//! bytes and each chunk is sealed with the next nonce of the send cipher,
//! so every sealed frame fits a 16-bit length prefix. Incoming frames are
//! opened in order; the first authentication failure poisons the
//! decryptor and nothing after it is ever yielded.
//!
//! Both directions are pull-based iterators. Nothing is sealed or opened
//! until the caller asks for the next item.

use crate::error::{Result, VeilTrustError};
use crate::noise::{CipherState, MAX_MESSAGE_SIZE, MAX_PLAINTEXT_SIZE};

/// Seals plaintext chunks with the outbound cipher.
#[derive(Debug)]
pub struct ChunkEncryptor {
    cipher: CipherState,
}

impl ChunkEncryptor {
    pub fn new(cipher: CipherState) -> Self {
        Self { cipher }
    }

    /// Nonce the next sealed chunk will use.
    pub fn nonce(&self) -> u64 {
        self.cipher.nonce()
    }

    /// Seal one chunk of at most [`MAX_PLAINTEXT_SIZE`] bytes.
    pub fn seal_chunk(&mut self, chunk: &[u8]) -> Result<Vec<u8>> {
        if chunk.len() > MAX_PLAINTEXT_SIZE {
            return Err(VeilTrustError::MessageTooLarge {
                size: chunk.len(),
                max: MAX_PLAINTEXT_SIZE,
            });
        }
        self.cipher.encrypt_with_ad(&[], chunk)
    }

    /// Lazily split `data` into sealed frames.
    pub fn encrypt_chunks<'a>(&'a mut self, data: &'a [u8]) -> EncryptChunks<'a> {
        EncryptChunks {
            encryptor: self,
            chunks: data.chunks(MAX_PLAINTEXT_SIZE),
            done: false,
        }
    }
}

/// Iterator returned by [`ChunkEncryptor::encrypt_chunks`]. Stops after
/// the first error.
pub struct EncryptChunks<'a> {
    encryptor: &'a mut ChunkEncryptor,
    chunks: std::slice::Chunks<'a, u8>,
    done: bool,
}

impl Iterator for EncryptChunks<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let chunk = self.chunks.next()?;
        let sealed = self.encryptor.seal_chunk(chunk);
        self.done = sealed.is_err();
        Some(sealed)
    }
}

/// Opens sealed frames with the inbound cipher.
#[derive(Debug)]
pub struct ChunkDecryptor {
    cipher: CipherState,
    poisoned: bool,
}

impl ChunkDecryptor {
    pub fn new(cipher: CipherState) -> Self {
        Self {
            cipher,
            poisoned: false,
        }
    }

    /// Nonce the next frame is expected to use.
    pub fn nonce(&self) -> u64 {
        self.cipher.nonce()
    }

    /// Whether an earlier frame failed to authenticate.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Open one sealed frame. Any failure poisons the decryptor; later
    /// calls return [`VeilTrustError::StreamCorrupted`].
    pub fn open_frame(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        if self.poisoned {
            return Err(VeilTrustError::StreamCorrupted);
        }
        let opened = if frame.len() > MAX_MESSAGE_SIZE {
            Err(VeilTrustError::MessageTooLarge {
                size: frame.len(),
                max: MAX_MESSAGE_SIZE,
            })
        } else {
            self.cipher.decrypt_with_ad(&[], frame)
        };
        self.poisoned = opened.is_err();
        opened
    }

    /// Lazily open a sequence of frames.
    pub fn decrypt_frames<I>(&mut self, frames: I) -> DecryptFrames<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        DecryptFrames {
            decryptor: self,
            frames: frames.into_iter(),
            done: false,
        }
    }
}

/// Iterator returned by [`ChunkDecryptor::decrypt_frames`]. Yields the
/// error for the first bad frame, then ends.
pub struct DecryptFrames<'a, I> {
    decryptor: &'a mut ChunkDecryptor,
    frames: I,
    done: bool,
}

impl<I> Iterator for DecryptFrames<'_, I>
where
    I: Iterator,
    I::Item: AsRef<[u8]>,
{
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let frame = self.frames.next()?;
        let opened = self.decryptor.open_frame(frame.as_ref());
        self.done = opened.is_err();
        Some(opened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::default_provider;

    fn pair() -> (ChunkEncryptor, ChunkDecryptor) {
        let crypto = default_provider();
        (
            ChunkEncryptor::new(CipherState::new([0x42; 32], crypto.clone())),
            ChunkDecryptor::new(CipherState::new([0x42; 32], crypto)),
        )
    }

    #[test]
    fn empty_input_yields_nothing() {
        let (mut enc, _) = pair();
        assert_eq!(enc.encrypt_chunks(&[]).count(), 0);
        assert_eq!(enc.nonce(), 0);
    }

    #[test]
    fn exact_boundary_is_one_frame() {
        let (mut enc, mut dec) = pair();
        let data = vec![1u8; MAX_PLAINTEXT_SIZE];
        let frames: Vec<_> = enc.encrypt_chunks(&data).collect::<Result<_>>().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), MAX_MESSAGE_SIZE);
        assert_eq!(dec.open_frame(&frames[0]).unwrap(), data);
    }

    #[test]
    fn one_past_boundary_is_two_frames() {
        let (mut enc, _) = pair();
        let data = vec![1u8; MAX_PLAINTEXT_SIZE + 1];
        let sizes: Vec<usize> = enc.encrypt_chunks(&data).map(|f| f.unwrap().len()).collect();
        assert_eq!(sizes, vec![MAX_MESSAGE_SIZE, 17]);
    }

    #[test]
    fn oversized_chunk_rejected() {
        let (mut enc, _) = pair();
        assert!(enc.seal_chunk(&vec![0; MAX_PLAINTEXT_SIZE + 1]).is_err());
    }

    #[test]
    fn failure_poisons_decryptor() {
        let (mut enc, mut dec) = pair();
        let mut first = enc.seal_chunk(b"one").unwrap();
        let second = enc.seal_chunk(b"two").unwrap();
        first[0] ^= 1;
        assert!(matches!(dec.open_frame(&first), Err(VeilTrustError::Decryption)));
        assert!(dec.is_poisoned());
        assert!(matches!(dec.open_frame(&second), Err(VeilTrustError::StreamCorrupted)));
    }

    #[test]
    fn decrypt_frames_stops_after_failure() {
        let (mut enc, mut dec) = pair();
        let mut frames: Vec<Vec<u8>> = ["a", "b", "c"]
            .iter()
            .map(|s| enc.seal_chunk(s.as_bytes()).unwrap())
            .collect();
        frames[1][0] ^= 1;
        let out: Vec<_> = dec.decrypt_frames(frames).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), b"a");
        assert!(out[1].is_err());
    }
}
