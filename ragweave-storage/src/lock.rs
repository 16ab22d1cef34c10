//! C2: LockRegistry — one fair reentrant lock per normalized key, with
//! deadlock-safe ordered acquisition across multiple keys.
//!
//! Grounded on the teacher's `caliber-core::lock` typestate lock, but
//! generalized from a database-advisory-lock key scheme (FNV-1a hash
//! into a PostgreSQL advisory lock id) to an in-process
//! `tokio::sync::Mutex` pool keyed directly by the normalized string
//! key, since §4.2 asks for process-wide, fair, reentrant-by-key locks
//! rather than durable/distributed ones.

use ragweave_core::normalize_pair_key;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Process-wide pool of per-key locks. `getLock` lazily allocates and
/// returns the same `Arc<Mutex<()>>` instance for a given key on every
/// call (§4.2).
#[derive(Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// A handle holding one or more locks acquired via
/// [`LockRegistry::acquire_in_order`]. Locks release when this value is
/// dropped, in reverse acquisition order.
pub struct LockHandle {
    guards: Vec<OwnedMutexGuard<()>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily allocates a lock for `key`, returning the same instance on
    /// subsequent calls.
    pub async fn get_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Sorts `a` and `b` lexicographically and joins with `::`.
    pub fn normalize_pair(&self, a: &str, b: &str) -> String {
        normalize_pair_key(a, b)
    }

    /// Acquires every lock for `keys`, sorted ascending, before
    /// returning. The handle releases them in reverse acquisition order
    /// on drop. Acquisition happens one at a time in sorted order so two
    /// concurrent callers touching an overlapping key set always
    /// contend in the same order (Invariant 3) — no partial-acquire
    /// rollback is needed because ordering alone prevents deadlock.
    pub async fn acquire_in_order(&self, keys: &[String]) -> LockHandle {
        let mut sorted: Vec<String> = keys.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for key in &sorted {
            let lock = self.get_lock(key).await;
            guards.push(lock.lock_owned().await);
        }
        LockHandle { guards }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        while self.guards.pop().is_some() {
            // Dropping the guard releases the underlying mutex; popping
            // in reverse order makes that explicit rather than relying
            // on Vec's own drop order (which already matches, but the
            // reverse-release contract is worth stating plainly).
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_lock_returns_same_instance() {
        let registry = LockRegistry::new();
        let a = registry.get_lock("k1").await;
        let b = registry.get_lock("k1").await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn normalize_pair_is_order_independent() {
        let registry = LockRegistry::new();
        assert_eq!(registry.normalize_pair("a", "b"), registry.normalize_pair("b", "a"));
    }

    #[tokio::test]
    async fn acquire_in_order_acquires_all_keys() {
        let registry = LockRegistry::new();
        let keys = vec!["b".to_string(), "a".to_string()];
        let handle = registry.acquire_in_order(&keys).await;
        assert_eq!(handle.guards.len(), 2);
    }

    #[tokio::test]
    async fn locks_release_on_drop() {
        let registry = LockRegistry::new();
        {
            let _handle = registry.acquire_in_order(&["k1".to_string()]).await;
        }
        // Lock released: a fresh acquire must not deadlock.
        let lock = registry.get_lock("k1").await;
        let _guard = tokio::time::timeout(std::time::Duration::from_millis(100), lock.lock())
            .await
            .expect("lock should be available after handle drop");
    }

    #[tokio::test]
    async fn concurrent_overlapping_acquires_do_not_deadlock() {
        let registry = Arc::new(LockRegistry::new());
        let r1 = registry.clone();
        let r2 = registry.clone();

        let t1 = tokio::spawn(async move {
            let keys = vec!["a".to_string(), "b".to_string()];
            let _h = r1.acquire_in_order(&keys).await;
        });
        let t2 = tokio::spawn(async move {
            let keys = vec!["b".to_string(), "a".to_string()];
            let _h = r2.acquire_in_order(&keys).await;
        });

        let (r1, r2) = tokio::join!(t1, t2);
        r1.unwrap();
        r2.unwrap();
    }
}
