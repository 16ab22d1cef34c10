//! Generic L1 in-memory TTL cache, shared by the keyword extractor's
//! memory tier and any other process-local cache. Grounded on the
//! teacher's `CacheBackend`/`CacheStats` shape (`cache/traits.rs`), but
//! keyed generically by `String` rather than a `CacheableEntity`
//! marker trait, since this cache stores opaque query results rather
//! than typed domain entities.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Hit/miss counters, mirroring the teacher's `CacheStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A process-local TTL cache with bounded size. Cleanup triggers when
/// `len()` reaches `max_entries`: expired entries are dropped first;
/// if the cache is still over half capacity, the oldest-expiring
/// entries are evicted until it's back at half capacity (§5).
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    stats: std::sync::Mutex<CacheStats>,
    ttl: Duration,
    max_entries: usize,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            stats: std::sync::Mutex::new(CacheStats::default()),
            ttl,
            max_entries,
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let hit = entries.get(key).filter(|e| e.expires_at > now).map(|e| e.value.clone());
        drop(entries);

        let mut stats = self.stats.lock().expect("cache stats mutex poisoned");
        if hit.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        hit
    }

    pub async fn put(&self, key: impl Into<String>, value: V) {
        let expires_at = Instant::now() + self.ttl;
        let mut entries = self.entries.write().await;
        entries.insert(key.into(), Entry { value, expires_at });

        if entries.len() >= self.max_entries {
            Self::cleanup(&mut entries, self.max_entries, &self.stats);
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().expect("cache stats mutex poisoned")
    }

    fn cleanup(
        entries: &mut HashMap<String, Entry<V>>,
        max_entries: usize,
        stats: &std::sync::Mutex<CacheStats>,
    ) {
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let expired = before - entries.len();

        let half_capacity = max_entries / 2;
        let mut evicted = 0;
        if entries.len() > half_capacity {
            let mut by_expiry: Vec<(String, Instant)> =
                entries.iter().map(|(k, e)| (k.clone(), e.expires_at)).collect();
            by_expiry.sort_by_key(|(_, expires_at)| *expires_at);
            let to_remove = entries.len() - half_capacity;
            for (key, _) in by_expiry.into_iter().take(to_remove) {
                entries.remove(&key);
                evicted += 1;
            }
        }

        let mut stats = stats.lock().expect("cache stats mutex poisoned");
        stats.evictions += (expired + evicted) as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_hits() {
        let cache: TtlCache<String> = TtlCache::new(Duration::from_secs(60), 1000);
        cache.put("k1", "v1".to_string()).await;
        assert_eq!(cache.get("k1").await, Some("v1".to_string()));
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn miss_on_unknown_key() {
        let cache: TtlCache<String> = TtlCache::new(Duration::from_secs(60), 1000);
        assert_eq!(cache.get("missing").await, None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache: TtlCache<String> = TtlCache::new(Duration::from_millis(10), 1000);
        cache.put("k1", "v1".to_string()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k1").await, None);
    }

    #[tokio::test]
    async fn cleanup_triggers_at_high_water_mark() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_secs(60), 4);
        for i in 0..4 {
            cache.put(format!("k{i}"), i).await;
        }
        // Hit the high-water mark: cleanup runs, nothing is expired yet,
        // so it falls back to evicting oldest-expiring down to half capacity.
        assert_eq!(cache.len().await, 2);
    }
}
