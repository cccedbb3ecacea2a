//! In-memory TTL cache for public listings.
//!
//! Entries expire lazily on read and via [`TtlCache::purge_expired`]. There is no
//! capacity bound; admin mutations drop the affected key prefix instead.

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Key prefixes shared by the services that read and invalidate cached data
pub mod keys {
    pub const CATALOG: &str = "catalog:";
    pub const PRODUCTS: &str = "catalog:products";
    pub const FLAVORS: &str = "catalog:flavors";
    pub const GEOGRAPHY: &str = "geo:";
    pub const CITIES: &str = "geo:cities";
    pub const DELIVERY_RULE: &str = "geo:delivery-rule";

    pub fn zones_for_city(city_id: uuid::Uuid) -> String {
        format!("geo:zones:{}", city_id)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct TtlCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl TtlCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            default_ttl,
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                return match serde_json::from_value(entry.value.clone()) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(key, error = %e, "cached value has unexpected shape");
                        None
                    }
                };
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired());
        }
        None
    }

    pub fn insert<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        self.insert_with_ttl(key, value, self.default_ttl)
    }

    pub fn insert_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value)?;
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drops every entry whose key starts with `prefix`
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before.saturating_sub(self.entries.len());
        debug!(prefix, removed, "cache prefix invalidated");
        removed
    }

    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the cached value or runs `loader` and caches its result.
    /// Loader errors are returned as-is and nothing is cached.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &str, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key) {
            debug!(key, "cache hit");
            return Ok(hit);
        }

        let value = loader().await?;
        if let Err(e) = self.insert(key, &value) {
            warn!(key, error = %e, "failed to cache value");
        }
        Ok(value)
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}
