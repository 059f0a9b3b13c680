// Handshake message wire layout.
//
//   +----------------+-------------------------+----------------------+
//   | ne (0 or 32 B) | ns (0, 32 or 48 B)      | ciphertext (rest)    |
//   +----------------+-------------------------+----------------------+
//
// `ne` is the sender's ephemeral public key, `ns` its static public key
// (encrypted with a 16-byte tag once a key has been mixed) and the
// ciphertext is the payload. Field boundaries are implied by the pattern.

use crate::error::{Result, VeilTrustError};
use crate::noise::{MAX_MESSAGE_SIZE, PUBKEY_SIZE, TAG_SIZE};

/// Which fields a given handshake message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageLayout {
    pub has_ephemeral: bool,
    /// 0 (no `s` token), 32 (plaintext static) or 48 (encrypted static).
    pub static_len: usize,
}

impl MessageLayout {
    /// Layout for a message whose `s` token is encrypted iff `keyed`.
    pub fn new(has_ephemeral: bool, has_static: bool, keyed: bool) -> Self {
        let static_len = match (has_static, keyed) {
            (false, _) => 0,
            (true, false) => PUBKEY_SIZE,
            (true, true) => PUBKEY_SIZE + TAG_SIZE,
        };
        Self {
            has_ephemeral,
            static_len,
        }
    }

    /// Bytes before the ciphertext.
    pub fn header_len(&self) -> usize {
        if self.has_ephemeral {
            PUBKEY_SIZE + self.static_len
        } else {
            self.static_len
        }
    }
}

/// One decoded handshake message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageBuffer {
    /// Ephemeral public key; zero-filled when absent.
    pub ne: [u8; PUBKEY_SIZE],
    /// Static public key, possibly encrypted; empty when absent.
    pub ns: Vec<u8>,
    /// Payload ciphertext.
    pub ciphertext: Vec<u8>,
}

impl MessageBuffer {
    /// Serialize as `ne || ns || ciphertext`, omitting `ne` when the layout
    /// says the message carries none.
    pub fn encode(&self, layout: MessageLayout) -> Result<Vec<u8>> {
        if self.ns.len() != layout.static_len {
            return Err(VeilTrustError::InvalidKey(format!(
                "static key field is {} bytes, layout expects {}",
                self.ns.len(),
                layout.static_len
            )));
        }
        let size = layout.header_len() + self.ciphertext.len();
        if size > MAX_MESSAGE_SIZE {
            return Err(VeilTrustError::MessageTooLarge {
                size,
                max: MAX_MESSAGE_SIZE,
            });
        }

        let mut out = Vec::with_capacity(size);
        if layout.has_ephemeral {
            out.extend_from_slice(&self.ne);
        }
        out.extend_from_slice(&self.ns);
        out.extend_from_slice(&self.ciphertext);
        Ok(out)
    }

    /// Slice a received message into its fields. The fields are copied out,
    /// so the buffer does not borrow `data`.
    pub fn decode(data: &[u8], layout: MessageLayout) -> Result<Self> {
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(VeilTrustError::MessageTooLarge {
                size: data.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let header = layout.header_len();
        if data.len() < header {
            return Err(VeilTrustError::MessageTooShort {
                expected: header,
                actual: data.len(),
            });
        }

        let mut ne = [0u8; PUBKEY_SIZE];
        let mut rest = data;
        if layout.has_ephemeral {
            let (e, tail) = rest.split_at(PUBKEY_SIZE);
            ne.copy_from_slice(e);
            rest = tail;
        }
        let (ns, ciphertext) = rest.split_at(layout.static_len);

        Ok(Self {
            ne,
            ns: ns.to_vec(),
            ciphertext: ciphertext.to_vec(),
        })
    }
}
