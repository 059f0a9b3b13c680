//! Static-key cache: remembers each peer's Noise static key so the next
//! outbound connection can try IK instead of XX.
//!
//! The cache is an explicit handle owned by the caller. Share one `Arc`
//! between the [`Noise`](crate::Noise) instances that should see the same
//! entries; clear it or drop it to forget them.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use veiltrust::PeerId;

/// Peer id to Noise static public key.
pub trait StaticKeyCache: Send + Sync + fmt::Debug {
    fn load(&self, peer: &PeerId) -> Option<[u8; 32]>;

    fn store(&self, peer: &PeerId, static_key: [u8; 32]);

    fn remove(&self, peer: &PeerId);
}

/// In-memory cache behind a read-write lock.
#[derive(Debug, Default)]
pub struct MemoryKeyCache {
    entries: RwLock<HashMap<PeerId, [u8; 32]>>,
}

impl MemoryKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl StaticKeyCache for MemoryKeyCache {
    fn load(&self, peer: &PeerId) -> Option<[u8; 32]> {
        self.entries.read().get(peer).copied()
    }

    fn store(&self, peer: &PeerId, static_key: [u8; 32]) {
        self.entries.write().insert(peer.clone(), static_key);
    }

    fn remove(&self, peer: &PeerId) {
        self.entries.write().remove(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veiltrust::IdentityKeyPair;

    #[test]
    fn store_load_remove() {
        let cache = MemoryKeyCache::new();
        let peer = IdentityKeyPair::generate().peer_id().clone();
        assert!(cache.load(&peer).is_none());

        cache.store(&peer, [1; 32]);
        assert_eq!(cache.load(&peer), Some([1; 32]));
        cache.store(&peer, [2; 32]);
        assert_eq!(cache.load(&peer), Some([2; 32]));
        assert_eq!(cache.len(), 1);

        cache.remove(&peer);
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_forgets_everything() {
        let cache = MemoryKeyCache::new();
        for _ in 0..3 {
            cache.store(IdentityKeyPair::generate().peer_id(), [9; 32]);
        }
        assert_eq!(cache.len(), 3);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
