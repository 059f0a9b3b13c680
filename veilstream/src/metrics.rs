//! Handshake and transport counters.

use std::sync::atomic::{AtomicU64, Ordering};

use veiltrust::PatternKind;

/// Lock-free counters shared by every session built from one config.
#[derive(Debug, Default)]
pub struct NoiseMetrics {
    xx_success: AtomicU64,
    xx_error: AtomicU64,
    ik_success: AtomicU64,
    ik_error: AtomicU64,
    xx_fallback_success: AtomicU64,
    xx_fallback_error: AtomicU64,
    encrypted_packets: AtomicU64,
    decrypted_packets: AtomicU64,
    decrypt_errors: AtomicU64,
}

/// A point-in-time copy of [`NoiseMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub xx_success: u64,
    pub xx_error: u64,
    pub ik_success: u64,
    pub ik_error: u64,
    pub xx_fallback_success: u64,
    pub xx_fallback_error: u64,
    pub encrypted_packets: u64,
    pub decrypted_packets: u64,
    pub decrypt_errors: u64,
}

impl NoiseMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_handshake(&self, kind: PatternKind, success: bool) {
        let counter = match (kind, success) {
            (PatternKind::Xx, true) => &self.xx_success,
            (PatternKind::Xx, false) => &self.xx_error,
            (PatternKind::Ik, true) => &self.ik_success,
            (PatternKind::Ik, false) => &self.ik_error,
            (PatternKind::XxFallback, true) => &self.xx_fallback_success,
            (PatternKind::XxFallback, false) => &self.xx_fallback_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encrypted(&self) {
        self.encrypted_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decrypted(&self) {
        self.decrypted_packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decrypt_error(&self) {
        self.decrypt_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            xx_success: self.xx_success.load(Ordering::Relaxed),
            xx_error: self.xx_error.load(Ordering::Relaxed),
            ik_success: self.ik_success.load(Ordering::Relaxed),
            ik_error: self.ik_error.load(Ordering::Relaxed),
            xx_fallback_success: self.xx_fallback_success.load(Ordering::Relaxed),
            xx_fallback_error: self.xx_fallback_error.load(Ordering::Relaxed),
            encrypted_packets: self.encrypted_packets.load(Ordering::Relaxed),
            decrypted_packets: self.decrypted_packets.load(Ordering::Relaxed),
            decrypt_errors: self.decrypt_errors.load(Ordering::Relaxed),
        }
    }
}
