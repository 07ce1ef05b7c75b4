use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::{Instant, MissedTickBehavior};

use crate::services::auth::result::ValidationResult;
use crate::services::cache::client::ValidationResultCache;

struct CacheEntry {
    result: ValidationResult,
    expires_at: Instant,
}

/// In-process validation-result cache.
///
/// - Sharded concurrent map: `get`/`put` on different keys do not contend.
/// - Entries expire lazily on read; an optional sweep task purges the rest.
/// - The sweep task holds only a weak reference and stops once the cache is dropped.
#[derive(Clone, Default)]
pub struct InMemoryValidationResultCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl std::fmt::Debug for InMemoryValidationResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print cached principals
        f.debug_struct("InMemoryValidationResultCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl InMemoryValidationResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the cache and spawns a periodic sweep on the current tokio runtime.
    pub fn with_sweep_interval(interval: Duration) -> Self {
        let cache = Self::new();
        if !interval.is_zero() {
            spawn_sweeper(Arc::downgrade(&cache.entries), interval);
        }
        cache
    }

    /// Removes every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        purge(&self.entries, Instant::now())
    }
}

fn purge(entries: &DashMap<String, CacheEntry>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.expires_at > now);
    before.saturating_sub(entries.len())
}

fn spawn_sweeper(entries: Weak<DashMap<String, CacheEntry>>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(entries) = entries.upgrade() else {
                tracing::debug!("validation cache dropped, sweep stopped");
                break;
            };
            let removed = purge(&entries, Instant::now());
            if removed > 0 {
                tracing::debug!(removed, remaining = entries.len(), "validation cache swept");
            }
        }
    });
}

#[async_trait]
impl ValidationResultCache for InMemoryValidationResultCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Option<ValidationResult> {
        let now = Instant::now();

        // The shard guard must be released before `remove_if` touches the same shard.
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                return Some(entry.result.clone());
            }
        }

        // Only drop it if nobody refreshed the key in between.
        self.entries
            .remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    async fn put(&self, key: &str, result: ValidationResult, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            tracing::debug!(ttl_secs = ttl.as_secs(), "cache ttl out of range, entry not stored");
            return;
        };
        let entry = CacheEntry { result, expires_at };
        self.entries.insert(key.to_string(), entry);
    }

    async fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    async fn clear(&self) {
        self.entries.clear();
    }

    async fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::services::auth::principal::{ClaimTypeMapping, Principal};
    use crate::services::auth::result::ValidationFailure;
    use serde_json::json;

    fn success(sub: &str) -> ValidationResult {
        let claims = json!({"sub": sub, "scope": "idmgr"});
        let principal =
            Principal::from_claims(claims.as_object().unwrap(), &ClaimTypeMapping::default())
                .unwrap();
        ValidationResult::success(principal)
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_returned_until_ttl_elapses() {
        let cache = InMemoryValidationResultCache::new();
        cache.put("k", success("alice"), Duration::from_secs(60)).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("k").await, Some(success("alice")));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k").await, None);
        // lazily evicted on read
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn failures_are_cached_too() {
        let cache = InMemoryValidationResultCache::new();
        let rejected = ValidationResult::Failure(ValidationFailure::EndpointRejected);
        cache.put("k", rejected.clone(), Duration::from_secs(60)).await;

        assert_eq!(cache.get("k").await, Some(rejected));
    }

    #[tokio::test]
    async fn out_of_range_ttl_stores_nothing() {
        let cache = InMemoryValidationResultCache::new();
        cache.put("k", success("alice"), Duration::MAX).await;

        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn zero_ttl_stores_nothing() {
        let cache = InMemoryValidationResultCache::new();
        cache.put("k", success("alice"), Duration::ZERO).await;

        assert!(cache.is_empty().await);
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn last_writer_wins() {
        let cache = InMemoryValidationResultCache::new();
        cache.put("k", success("alice"), Duration::from_secs(60)).await;
        cache.put("k", success("bob"), Duration::from_secs(60)).await;

        assert_eq!(cache.get("k").await, Some(success("bob")));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let cache = InMemoryValidationResultCache::new();
        cache.put("a", success("alice"), Duration::from_secs(60)).await;
        cache.put("b", success("bob"), Duration::from_secs(60)).await;

        cache.remove("a").await;
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_expired_keeps_live_entries() {
        let cache = InMemoryValidationResultCache::new();
        cache.put("short", success("a"), Duration::from_secs(10)).await;
        cache.put("long", success("b"), Duration::from_secs(100)).await;

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("long").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_entries() {
        let cache = InMemoryValidationResultCache::with_sweep_interval(Duration::from_secs(5));
        cache.put("k", success("alice"), Duration::from_secs(3)).await;

        // Paused clock auto-advances: the sweep tick at 5s runs before this wakes at 6s.
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn concurrent_puts_for_same_key_leave_one_entry() {
        let cache = InMemoryValidationResultCache::new();

        let mut handles = Vec::new();
        for i in 0..32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .put("same", success(&format!("user-{i}")), Duration::from_secs(60))
                    .await;
                cache.get("same").await
            }));
        }
        for h in handles {
            assert!(h.await.unwrap().is_some());
        }

        assert_eq!(cache.len().await, 1);
    }
}
