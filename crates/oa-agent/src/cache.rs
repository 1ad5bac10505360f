//! Time-bounded memoization shared by the generation and execution caches.
//!
//! Expiry is detected, not scheduled: `get` evicts its own key when stale,
//! and every `set` sweeps the whole table so memory stays bounded between
//! reads. Time comes from `tokio::time::Instant`, so tests drive it with a
//! paused clock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use oa_protocol::ContextSnapshot;
use tokio::time::Instant;

/// Lifetime of generation and execution cache entries.
pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// A cached value and when it was stored. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) < ttl
    }
}

/// String-keyed cache whose entries expire `ttl` after insertion.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return a clone of the value if still fresh; evict it otherwise.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.is_fresh(now, self.ttl) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert or overwrite `key`, then sweep every expired entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                created_at: now,
            },
        );
        Self::sweep_locked(&mut entries, now, self.ttl);
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Self::sweep_locked(&mut entries, Instant::now(), self.ttl)
    }

    fn sweep_locked(
        entries: &mut HashMap<String, CacheEntry<V>>,
        now: Instant,
        ttl: Duration,
    ) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now, ttl));
        before - entries.len()
    }

    /// Entries currently stored, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(CACHE_TTL)
    }
}

/// Generation cache key: the prompt plus every context field, so the same
/// prompt under a different cluster or namespace never collides.
pub fn generation_key(prompt: &str, ctx: &ContextSnapshot) -> String {
    format!(
        "{}:{}:{}:{}:{}",
        prompt, ctx.cluster, ctx.namespace, ctx.user, ctx.server
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_is_returned() {
        let cache = TtlCache::new(CACHE_TTL);
        cache.set("get pods", "pod list".to_string());

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get("get pods").as_deref(), Some("pod list"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_evicted_on_read() {
        let cache = TtlCache::new(CACHE_TTL);
        cache.set("get pods", "pod list".to_string());

        tokio::time::advance(CACHE_TTL).await;
        assert!(cache.get("get pods").is_none());
        assert!(cache.is_empty(), "stale entry should be removed by get");
    }

    #[tokio::test(start_paused = true)]
    async fn set_sweeps_other_expired_entries() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("a", 1);
        cache.set("b", 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.len(), 2, "expiry is passive until a write");

        cache.set("c", 3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_resets_age() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("k", "old");

        tokio::time::advance(Duration::from_secs(50)).await;
        cache.set("k", "new");

        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(cache.get("k"), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_sweep_counts_removals() {
        let cache = TtlCache::new(Duration::from_secs(10));
        cache.set("a", ());
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.set("b", ());
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.sweep(), 1);
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn generation_key_includes_every_context_field() {
        let a = ContextSnapshot::new("c1", "demo", "admin", "https://api.c1:6443");
        let b = ContextSnapshot::new("c1", "prod", "admin", "https://api.c1:6443");

        assert_eq!(
            generation_key("list all pods", &a),
            "list all pods:c1:demo:admin:https://api.c1:6443"
        );
        assert_ne!(
            generation_key("list all pods", &a),
            generation_key("list all pods", &b)
        );
    }

    #[test]
    fn shared_across_threads() {
        let cache = std::sync::Arc::new(TtlCache::new(CACHE_TTL));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    cache.set(format!("k{i}"), i);
                    cache.get(&format!("k{i}"))
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), Some(i));
        }
        assert_eq!(cache.len(), 4);
    }
}
