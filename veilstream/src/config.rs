//! Configuration for the Noise session layer.

use std::sync::Arc;
use std::time::Duration;

use veiltrust::{default_provider, CryptoProvider, KeyPair};

use crate::key_cache::StaticKeyCache;
use crate::metrics::NoiseMetrics;

/// Configuration for [`Noise`](crate::Noise).
#[derive(Debug, Clone)]
pub struct NoiseConfig {
    /// Noise static keypair. Generated from `crypto` when absent.
    pub static_keypair: Option<KeyPair>,
    /// Extension data sent in our identity payload.
    pub extension_data: Vec<u8>,
    /// Mixed into the handshake transcript; both sides must agree.
    pub prologue: Vec<u8>,
    /// Enable IK with XX-fallback (Noise Pipes).
    pub use_noise_pipes: bool,
    pub crypto: Arc<dyn CryptoProvider>,
    /// Remembers peer static keys for IK. Only consulted with pipes enabled.
    pub key_cache: Option<Arc<dyn StaticKeyCache>>,
    /// Deadline for the whole handshake. `None` waits forever.
    pub handshake_timeout: Option<Duration>,
    /// Log the handshake hash and both transport keys at debug level.
    pub dump_session_keys: bool,
    pub metrics: Option<Arc<NoiseMetrics>>,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            static_keypair: None,
            extension_data: Vec::new(),
            prologue: Vec::new(),
            use_noise_pipes: false,
            crypto: default_provider(),
            key_cache: None,
            handshake_timeout: None,
            dump_session_keys: false,
            metrics: None,
        }
    }
}

impl NoiseConfig {
    pub fn with_static_keypair(mut self, keypair: KeyPair) -> Self {
        self.static_keypair = Some(keypair);
        self
    }

    pub fn with_extension_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.extension_data = data.into();
        self
    }

    pub fn with_prologue(mut self, prologue: impl Into<Vec<u8>>) -> Self {
        self.prologue = prologue.into();
        self
    }

    pub fn with_noise_pipes(mut self, enabled: bool) -> Self {
        self.use_noise_pipes = enabled;
        self
    }

    pub fn with_crypto(mut self, crypto: Arc<dyn CryptoProvider>) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn with_key_cache(mut self, cache: Arc<dyn StaticKeyCache>) -> Self {
        self.key_cache = Some(cache);
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    pub fn with_key_dump(mut self, enabled: bool) -> Self {
        self.dump_session_keys = enabled;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<NoiseMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_cache::MemoryKeyCache;

    #[test]
    fn defaults() {
        let cfg = NoiseConfig::default();
        assert!(cfg.static_keypair.is_none());
        assert!(!cfg.use_noise_pipes);
        assert!(!cfg.dump_session_keys);
        assert!(cfg.key_cache.is_none());
        assert!(cfg.handshake_timeout.is_none());
    }

    #[test]
    fn setters_chain() {
        let cfg = NoiseConfig::default()
            .with_noise_pipes(true)
            .with_prologue(b"p".to_vec())
            .with_extension_data("ext")
            .with_key_cache(Arc::new(MemoryKeyCache::new()))
            .with_handshake_timeout(Duration::from_secs(3));
        assert!(cfg.use_noise_pipes);
        assert_eq!(cfg.prologue, b"p");
        assert_eq!(cfg.extension_data, b"ext");
        assert!(cfg.key_cache.is_some());
        assert_eq!(cfg.handshake_timeout, Some(Duration::from_secs(3)));
    }
}
