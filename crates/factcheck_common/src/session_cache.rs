//! Session cache for search responses.
//!
//! TTL + capacity eviction. Capacity eviction drops the oldest-inserted
//! entries first; reads and overwrites of live keys never change eviction
//! order. One instance is built at process start and shared by reference
//! across runs; all mutation happens under a single lock.

use lru::LruCache;
use sha2::{Digest, Sha256};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    expires_at: Instant,
    last_access: Instant,
}

/// Process-wide key/value cache with TTL expiry and FIFO capacity eviction
pub struct SessionCache<V> {
    // Recency order in the LruCache is only touched by `put` of a new key,
    // so it doubles as insertion order.
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<V: Clone> SessionCache<V> {
    /// Create a new cache
    ///
    /// * `ttl` - Lifetime of an entry, reset on every `set`
    /// * `max_entries` - Size cap enforced after each `set`
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            ttl,
            max_entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Lookup as of `now`. Expired entries are removed on the way out.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut entries = self.lock();
        match entries.peek_mut(key) {
            None => return None,
            Some(entry) if now < entry.expires_at => {
                entry.last_access = now;
                return Some(entry.value.clone());
            }
            Some(_) => {}
        }
        entries.pop(key);
        debug!("Session cache entry expired");
        None
    }

    pub fn set(&self, key: &str, value: V) {
        self.set_at(key, value, Instant::now());
    }

    /// Insert as of `now`, then prune.
    ///
    /// Overwriting a live key keeps its original eviction position; an
    /// expired key is re-inserted as the newest entry.
    pub fn set_at(&self, key: &str, value: V, now: Instant) {
        let mut entries = self.lock();
        let fresh = CacheEntry {
            value,
            inserted_at: now,
            expires_at: now + self.ttl,
            last_access: now,
        };
        let live = entries.peek(key).map_or(false, |entry| now < entry.expires_at);
        if live {
            if let Some(entry) = entries.peek_mut(key) {
                *entry = fresh;
            }
        } else {
            entries.pop(key);
            entries.put(key.to_string(), fresh);
        }
        Self::prune(&mut entries, now, self.max_entries);
    }

    fn prune(entries: &mut LruCache<String, CacheEntry<V>>, now: Instant, max_entries: usize) {
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            entries.pop(&key);
        }

        while entries.len() > max_entries {
            match entries.pop_lru() {
                Some((key, entry)) => debug!(
                    "Evicted cache entry {} (age {:?})",
                    key_prefix(&key),
                    now.saturating_duration_since(entry.inserted_at)
                ),
                None => break,
            }
        }
    }

    /// Last read time of a live entry, without refreshing it.
    pub fn last_access(&self, key: &str) -> Option<Instant> {
        self.lock().peek(key).map(|entry| entry.last_access)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry<V>>> {
        // The map stays consistent across a panic mid-operation, so a
        // poisoned lock is still usable.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Short, char-safe form of a key for log lines.
fn key_prefix(key: &str) -> String {
    key.chars().take(12).collect()
}

/// Deterministic cache key for a search: sha256 of
/// `query|freshness|allowlist_version`, hex encoded.
pub fn build_cache_key(query: &str, freshness: &str, allowlist_version: &str) -> String {
    let input = format!("{}|{}|{}", query, freshness, allowlist_version);
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl_ms: u64, max_entries: usize) -> SessionCache<String> {
        SessionCache::new(Duration::from_millis(ttl_ms), max_entries)
    }

    #[test]
    fn test_get_returns_value_within_ttl() {
        let cache = cache(1_000, 10);
        let t0 = Instant::now();
        cache.set_at("k", "v".to_string(), t0);
        assert_eq!(cache.get_at("k", t0 + Duration::from_millis(999)), Some("v".to_string()));
    }

    #[test]
    fn test_entry_absent_after_ttl() {
        let cache = cache(1_000, 10);
        let t0 = Instant::now();
        cache.set_at("k", "v".to_string(), t0);
        assert_eq!(cache.get_at("k", t0 + Duration::from_millis(1_001)), None);
        // Lazily deleted
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let cache = cache(1_000, 10);
        let t0 = Instant::now();
        cache.set_at("k", "v".to_string(), t0);
        assert_eq!(cache.get_at("k", t0 + Duration::from_millis(1_000)), None);
    }

    #[test]
    fn test_capacity_evicts_oldest_inserted() {
        let max = 5;
        let cache = cache(60_000, max);
        let t0 = Instant::now();
        for i in 0..(max + 5) {
            cache.set_at(&format!("k{}", i), i.to_string(), t0);
        }
        assert_eq!(cache.len(), max);
        for i in 0..5 {
            assert!(!cache.contains_key(&format!("k{}", i)), "k{} should be evicted", i);
        }
        for i in 5..(max + 5) {
            assert!(cache.contains_key(&format!("k{}", i)));
        }
    }

    #[test]
    fn test_reads_do_not_reorder_eviction() {
        let cache = cache(60_000, 2);
        let t0 = Instant::now();
        cache.set_at("a", "1".to_string(), t0);
        cache.set_at("b", "2".to_string(), t0);
        // Reading "a" refreshes last_access only
        assert!(cache.get_at("a", t0 + Duration::from_millis(5)).is_some());
        assert_eq!(cache.last_access("a"), Some(t0 + Duration::from_millis(5)));

        cache.set_at("c", "3".to_string(), t0 + Duration::from_millis(10));
        assert!(!cache.contains_key("a"));
        assert!(cache.contains_key("b"));
        assert!(cache.contains_key("c"));
    }

    #[test]
    fn test_set_prunes_expired_before_capacity() {
        let cache = cache(100, 2);
        let t0 = Instant::now();
        cache.set_at("old", "1".to_string(), t0);
        cache.set_at("fresh", "2".to_string(), t0 + Duration::from_millis(90));
        cache.set_at("new", "3".to_string(), t0 + Duration::from_millis(150));
        // "old" expired and was pruned, so nothing live had to be evicted
        assert_eq!(cache.len(), 2);
        assert!(cache.contains_key("fresh"));
        assert!(cache.contains_key("new"));
    }

    #[test]
    fn test_set_resets_ttl() {
        let cache = cache(100, 10);
        let t0 = Instant::now();
        cache.set_at("k", "1".to_string(), t0);
        cache.set_at("k", "2".to_string(), t0 + Duration::from_millis(80));
        assert_eq!(
            cache.get_at("k", t0 + Duration::from_millis(150)),
            Some("2".to_string())
        );
    }

    #[test]
    fn test_overwrite_keeps_insertion_position() {
        let cache = cache(60_000, 2);
        let t0 = Instant::now();
        cache.set_at("a", "1".to_string(), t0);
        cache.set_at("b", "2".to_string(), t0);
        // Overwriting live "a" does not make it the newest entry
        cache.set_at("a", "1b".to_string(), t0 + Duration::from_millis(5));
        cache.set_at("c", "3".to_string(), t0 + Duration::from_millis(10));
        assert!(!cache.contains_key("a"));
        assert!(cache.contains_key("b"));
        assert!(cache.contains_key("c"));
    }

    #[test]
    fn test_expired_key_reinserted_as_newest() {
        let cache = cache(100, 2);
        let t0 = Instant::now();
        cache.set_at("a", "1".to_string(), t0);
        cache.set_at("b", "2".to_string(), t0 + Duration::from_millis(50));
        cache.set_at("a", "1b".to_string(), t0 + Duration::from_millis(120));
        cache.set_at("c", "3".to_string(), t0 + Duration::from_millis(130));
        assert!(!cache.contains_key("b"));
        assert_eq!(
            cache.get_at("a", t0 + Duration::from_millis(140)),
            Some("1b".to_string())
        );
    }

    #[test]
    fn test_non_ascii_keys_evict_cleanly() {
        assert_eq!(key_prefix("日本語のクエリ検索キーワード"), "日本語のクエリ検索キーワ");
        assert_eq!(key_prefix("abc"), "abc");

        let cache = cache(60_000, 1);
        let t0 = Instant::now();
        cache.set_at("éééééééééééééé", "1".to_string(), t0);
        cache.set_at("ü", "2".to_string(), t0);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key("ü"));
    }

    #[test]
    fn test_cache_key_is_deterministic_and_salted() {
        let a = build_cache_key("bill passed senate", "month", "v1");
        let b = build_cache_key("bill passed senate", "month", "v1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, build_cache_key("bill passed senate", "month", "v2"));
        assert_ne!(a, build_cache_key("bill passed senate", "week", "v1"));
    }
}
