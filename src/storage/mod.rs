//! History cache.
//!
//! - [`LocalStore`]: single in-process slot (default, always available)
//! - [`RedisStore`]: shared Redis tier, authoritative when reachable
//!
//! [`HistoryCache`] fronts both and owns the "never fails" contract: a
//! shared-store error degrades that one operation to the local slot, and an
//! empty list is never served as a hit.

pub mod local;
pub mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::plex::PlaybackRecord;

pub use local::LocalStore;
pub use redis_store::RedisStore;

/// Key-scoped storage for history lists.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Human-readable backend name (e.g., "memory", "redis").
    fn backend_name(&self) -> &str;

    /// Stored items for `key`. `None` on miss or expiry.
    async fn get(&self, key: &str) -> Result<Option<Vec<PlaybackRecord>>>;

    /// Replace whatever is stored for `key`.
    async fn put(&self, key: &str, items: &[PlaybackRecord], ttl: Duration) -> Result<()>;

    async fn invalidate(&self, key: &str) -> Result<()>;
}

/// Cache key for a user's history.
pub fn history_key(user: Option<&str>) -> String {
    format!("history:{}", user.filter(|u| !u.is_empty()).unwrap_or("unknown"))
}

pub struct HistoryCache {
    shared: Option<Box<dyn HistoryStore>>,
    local: LocalStore,
}

impl HistoryCache {
    pub fn local_only() -> Self {
        Self {
            shared: None,
            local: LocalStore::new(),
        }
    }

    pub fn with_shared(store: Box<dyn HistoryStore>) -> Self {
        Self {
            shared: Some(store),
            local: LocalStore::new(),
        }
    }

    /// Use Redis when configured and reachable, the local slot otherwise.
    pub async fn from_config(config: &CacheConfig) -> Self {
        let Some(url) = config.redis_url.as_deref().filter(|u| !u.is_empty()) else {
            return Self::local_only();
        };
        let timeout = Duration::from_millis(config.store_timeout_ms);
        match RedisStore::connect(url, &config.key_prefix, timeout).await {
            Ok(store) => {
                tracing::info!("history cache backed by redis");
                Self::with_shared(Box::new(store))
            }
            Err(e) => {
                tracing::warn!("Redis unavailable, using in-process history cache: {}", e);
                Self::local_only()
            }
        }
    }

    pub fn backend_name(&self) -> &str {
        self.shared
            .as_ref()
            .map(|s| s.backend_name())
            .unwrap_or_else(|| self.local.backend_name())
    }

    pub async fn get(&self, key: &str) -> Option<Vec<PlaybackRecord>> {
        let found = match &self.shared {
            Some(shared) => match shared.get(key).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(key, "Shared cache read failed, using local slot: {}", e);
                    self.local_get(key).await
                }
            },
            None => self.local_get(key).await,
        };

        let items = found.filter(|items| !items.is_empty())?;
        tracing::debug!(key, count = items.len(), backend = self.backend_name(), "history cache hit");
        Some(items)
    }

    pub async fn put(&self, key: &str, items: &[PlaybackRecord], ttl: Duration) {
        if let Some(shared) = &self.shared {
            match shared.put(key, items, ttl).await {
                Ok(()) => {
                    tracing::debug!(key, count = items.len(), ttl = ttl.as_secs(), "history cached in shared store");
                    return;
                }
                Err(e) => {
                    tracing::warn!(key, "Shared cache write failed, using local slot: {}", e);
                }
            }
        }
        // The local store cannot fail.
        let _ = self.local.put(key, items, ttl).await;
        tracing::debug!(key, count = items.len(), ttl = ttl.as_secs(), "history cached in process");
    }

    /// Drop `key` from the shared store and clear the local slot.
    pub async fn invalidate(&self, key: &str) {
        if let Some(shared) = &self.shared {
            if let Err(e) = shared.invalidate(key).await {
                tracing::warn!(key, "Shared cache invalidation failed: {}", e);
            }
        }
        let _ = self.local.invalidate(key).await;
        tracing::info!(key, "history cache cleared");
    }

    async fn local_get(&self, key: &str) -> Option<Vec<PlaybackRecord>> {
        self.local.get(key).await.ok().flatten()
    }
}
