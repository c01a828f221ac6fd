//! In-memory TTL cache
//!
//! Entries are fresh while `now - timestamp < ttl`. Stale entries are ignored
//! on read and purged on every write. A bounded cache evicts its oldest entry
//! to make room for a new key.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CacheError {
    #[error("Cache full ({0} entries)")]
    Full(usize),
}

/// Key/value cache with per-instance expiry
#[async_trait]
pub trait Cache<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Fresh value for `key`, if any
    async fn get(&self, key: &str) -> Option<V>;

    async fn set(&self, key: &str, value: V) -> Result<(), CacheError>;

    async fn invalidate(&self, key: &str);

    async fn clear(&self);
}

/// Cached value with its insertion time
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub data: V,
    pub timestamp: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.timestamp.elapsed() < ttl
    }
}

/// [`Cache`] backed by a `HashMap` behind an async `RwLock`
pub struct TtlCache<V> {
    ttl: Duration,
    max_entries: Option<usize>,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_entries: None,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Bound the number of stored entries
    ///
    /// A full cache evicts its oldest entry; with a bound of zero `set` fails.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, fresh or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl<V> Cache<V> for TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.data.clone())
    }

    async fn set(&self, key: &str, value: V) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;

        if let Some(max) = self.max_entries {
            if !entries.contains_key(key) && entries.len() >= max {
                let ttl = self.ttl;
                entries.retain(|_, entry| entry.is_fresh(ttl));
                if entries.len() >= max {
                    return Err(CacheError::Full(max));
                }
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                data: value,
                timestamp: Instant::now(),
            },
        );
        Ok(())
    }

    async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("a", 1u32).await.unwrap();
        assert_eq!(cache.get("a").await, Some(1));
        assert_eq!(cache.get("b").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = TtlCache::new(Duration::from_secs(300));
        cache.set("a", "value".to_string()).await.unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get("a").await.as_deref(), Some("value"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("a").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("a", 1u32).await.unwrap();
        cache.set("b", 2u32).await.unwrap();

        cache.invalidate("a").await;
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, Some(2));

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_purged_on_write() {
        let cache = TtlCache::new(Duration::from_secs(10));
        for i in 0..50u32 {
            cache.set(&format!("k{}", i), i).await.unwrap();
        }
        assert_eq!(cache.len().await, 50);

        tokio::time::advance(Duration::from_secs(11)).await;
        cache.set("fresh", 99).await.unwrap();
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("fresh").await, Some(99));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_cache_evicts_oldest() {
        let cache = TtlCache::new(Duration::from_secs(60)).with_max_entries(2);
        cache.set("a", 1u32).await.unwrap();
        tokio::time::advance(Duration::from_millis(10)).await;
        cache.set("b", 2u32).await.unwrap();
        tokio::time::advance(Duration::from_millis(10)).await;

        // Overwriting an existing key never evicts
        cache.set("b", 3u32).await.unwrap();
        assert_eq!(cache.len().await, 2);

        cache.set("c", 4u32).await.unwrap();
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("b").await, Some(3));
        assert_eq!(cache.get("c").await, Some(4));
    }

    #[tokio::test]
    async fn test_zero_bound_rejects_writes() {
        let cache = TtlCache::new(Duration::from_secs(60)).with_max_entries(0);
        assert_eq!(cache.set("a", 1u32).await, Err(CacheError::Full(0)));
        assert!(cache.is_empty().await);
    }
}
