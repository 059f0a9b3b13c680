//! The secured byte stream handed out after a successful handshake.
//!
//! Every write is sealed into one length-prefixed frame of at most
//! [`MAX_MESSAGE_SIZE`](veiltrust::MAX_MESSAGE_SIZE) bytes. Reads open
//! frames in order and buffer any plaintext the caller did not consume.
//! The first frame that fails authentication poisons the read half: that
//! read and every later one return `io::ErrorKind::InvalidData`.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use veiltrust::{ChunkDecryptor, ChunkEncryptor, VeilTrustError, MAX_PLAINTEXT_SIZE};

use crate::metrics::NoiseMetrics;

fn invalid_data(e: VeilTrustError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// An encrypted duplex stream over a framed transport.
pub struct SecureStream<T> {
    io: Framed<T, LengthDelimitedCodec>,
    encryptor: ChunkEncryptor,
    decryptor: ChunkDecryptor,
    read_buf: Bytes,
    metrics: Option<Arc<NoiseMetrics>>,
}

impl<T> SecureStream<T> {
    pub(crate) fn new(
        io: Framed<T, LengthDelimitedCodec>,
        encryptor: ChunkEncryptor,
        decryptor: ChunkDecryptor,
        metrics: Option<Arc<NoiseMetrics>>,
    ) -> Self {
        Self {
            io,
            encryptor,
            decryptor,
            read_buf: Bytes::new(),
            metrics,
        }
    }

    /// The underlying transport.
    pub fn get_ref(&self) -> &T {
        self.io.get_ref()
    }

    /// Nonce the next outgoing frame will be sealed with.
    pub fn send_nonce(&self) -> u64 {
        self.encryptor.nonce()
    }

    /// Nonce the next incoming frame must have been sealed with.
    pub fn recv_nonce(&self) -> u64 {
        self.decryptor.nonce()
    }

    /// True once an incoming frame failed authentication.
    pub fn is_corrupted(&self) -> bool {
        self.decryptor.is_poisoned()
    }

    /// Plaintext decrypted but not yet read.
    pub fn buffered(&self) -> usize {
        self.read_buf.len()
    }
}

impl<T> fmt::Debug for SecureStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureStream")
            .field("send_nonce", &self.encryptor.nonce())
            .field("recv_nonce", &self.decryptor.nonce())
            .field("buffered", &self.read_buf.len())
            .field("corrupted", &self.decryptor.is_poisoned())
            .finish()
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> AsyncRead for SecureStream<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if !this.read_buf.is_empty() {
                let n = this.read_buf.len().min(buf.remaining());
                buf.put_slice(&this.read_buf.split_to(n));
                return Poll::Ready(Ok(()));
            }
            if buf.remaining() == 0 {
                return Poll::Ready(Ok(()));
            }
            if this.decryptor.is_poisoned() {
                return Poll::Ready(Err(invalid_data(VeilTrustError::StreamCorrupted)));
            }

            let frame = match ready!(this.io.poll_next_unpin(cx)) {
                Some(frame) => frame?,
                None => return Poll::Ready(Ok(())),
            };
            match this.decryptor.open_frame(&frame) {
                Ok(plaintext) => {
                    if let Some(m) = &this.metrics {
                        m.record_decrypted();
                    }
                    this.read_buf = Bytes::from(plaintext);
                }
                Err(e) => {
                    if let Some(m) = &this.metrics {
                        m.record_decrypt_error();
                    }
                    tracing::warn!(
                        frame_len = frame.len(),
                        nonce = this.decryptor.nonce(),
                        "secured stream corrupted: {e}"
                    );
                    return Poll::Ready(Err(invalid_data(e)));
                }
            }
        }
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> AsyncWrite for SecureStream<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        ready!(SinkExt::<Bytes>::poll_ready_unpin(&mut this.io, cx))?;

        let n = buf.len().min(MAX_PLAINTEXT_SIZE);
        let frame = this.encryptor.seal_chunk(&buf[..n]).map_err(invalid_data)?;
        this.io.start_send_unpin(Bytes::from(frame))?;
        if let Some(m) = &this.metrics {
            m.record_encrypted();
        }
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        SinkExt::<Bytes>::poll_flush_unpin(&mut self.get_mut().io, cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        SinkExt::<Bytes>::poll_close_unpin(&mut self.get_mut().io, cx)
    }
}
