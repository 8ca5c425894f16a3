//! Process-local duplicate-observation filter (spec §3 I6, §4.2).

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Bounded LRU of recently-seen `leader_trade_id`s.
///
/// This is an optimization, not the source of truth for idempotency — the
/// deterministic `intent_id` (see `relay_core::idempotency`) is what actually
/// guarantees a leader trade is never copied twice. The cache exists so a
/// duplicate observed twice in quick succession (stream + poll overlap, or a
/// reconnect replay) doesn't even reach the dispatcher.
pub struct Dedup {
    seen: Mutex<LruCache<String, ()>>,
}

impl Dedup {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self { seen: Mutex::new(LruCache::new(capacity)) }
    }

    /// Record `leader_trade_id` as seen, returning `true` if it was already present.
    pub fn check_and_insert(&self, leader_trade_id: &str) -> bool {
        let mut seen = self.seen.lock();
        if seen.contains(leader_trade_id) {
            true
        } else {
            seen.put(leader_trade_id.to_string(), ());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_is_not_a_duplicate() {
        let dedup = Dedup::new(10);
        assert!(!dedup.check_and_insert("trade-1"));
    }

    #[test]
    fn repeated_observation_is_flagged() {
        let dedup = Dedup::new(10);
        assert!(!dedup.check_and_insert("trade-1"));
        assert!(dedup.check_and_insert("trade-1"));
    }

    #[test]
    fn eviction_drops_oldest_entry() {
        let dedup = Dedup::new(1);
        assert!(!dedup.check_and_insert("trade-1"));
        assert!(!dedup.check_and_insert("trade-2"));
        assert!(!dedup.check_and_insert("trade-1"));
    }
}
