use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{Cache, glob_match};
use crate::{PlatformError, Result};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-memory cache for tests.
///
/// Honors TTLs against tokio's clock, so paused-time tests can expire
/// entries with `tokio::time::advance`.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail as if the backend were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns true if a live entry exists under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .await
            .get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PlatformError::Cache("cache is unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.check_available()?;
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !glob_match(pattern, key));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheExt;

    #[tokio::test]
    async fn set_get_delete() {
        let cache = InMemoryCache::new();
        cache
            .set("product:1", "{}".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get("product:1").await.unwrap().as_deref(), Some("{}"));

        cache.delete("product:1").await.unwrap();
        assert_eq!(cache.get("product:1").await.unwrap(), None);
        cache.delete("product:1").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = InMemoryCache::new();
        cache
            .set_json("k", &vec![1, 2, 3], Duration::from_secs(300))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get_json::<Vec<i32>>("k").await.unwrap(), Some(vec![1, 2, 3]));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get_json::<Vec<i32>>("k").await.unwrap(), None);
        assert!(!cache.contains("k").await);
    }

    #[tokio::test]
    async fn delete_by_pattern_only_touches_matches() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);
        for key in ["product:1", "product:2", "products:all"] {
            cache.set(key, "x".into(), ttl).await.unwrap();
        }

        assert_eq!(cache.delete_by_pattern("product:*").await.unwrap(), 2);
        assert!(cache.contains("products:all").await);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn unavailable_cache_errors() {
        let cache = InMemoryCache::new();
        cache.set_unavailable(true);
        assert!(matches!(cache.get("k").await, Err(PlatformError::Cache(_))));
        assert!(cache.set("k", "v".into(), Duration::from_secs(1)).await.is_err());
    }
}
