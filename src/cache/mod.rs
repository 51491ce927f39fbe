//! Keyed cache of recently fetched read results.
//!
//! Populated opportunistically on every successful remote read and consulted
//! only when the network fails. Invalidation is write-driven: a confirmed
//! mutation evicts every entry of the affected resource family by key
//! prefix. An optional max-age is defense in depth on top of that.

mod key;
mod merge;

pub use key::CacheKey;
pub use merge::{merge_page, MergedPage};

use crate::api::{ApiError, ApiResult};
use crate::error::Result;
use crate::store::PersistentStore;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const KEY_PREFIX: &str = "cache:";

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    value: serde_json::Value,
    stored_at: DateTime<Utc>,
    type_tag: String,
}

pub struct ResponseCache {
    store: Arc<dyn PersistentStore>,
    max_age: Option<Duration>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn PersistentStore>, max_age: Option<Duration>) -> Self {
        Self { store, max_age }
    }

    fn blob_key(key: &CacheKey) -> String {
        format!("{}{}", KEY_PREFIX, key.as_str())
    }

    /// Decode a cached value, or miss on absence, staleness or a type-tag
    /// mismatch (an entry written for a different shape is never served).
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        let Some(bytes) = self.store.load_blob(&Self::blob_key(key))? else {
            return Ok(None);
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(_) => {
                // Unreadable entry: drop it rather than fail the read path
                self.store.delete_blob(&Self::blob_key(key))?;
                return Ok(None);
            }
        };

        if entry.type_tag != std::any::type_name::<T>() {
            return Ok(None);
        }

        if let Some(max_age) = self.max_age {
            let age = Utc::now().signed_duration_since(entry.stored_at);
            if age.num_milliseconds() < 0 || age.to_std().unwrap_or(Duration::MAX) > max_age {
                return Ok(None);
            }
        }

        match serde_json::from_value(entry.value) {
            Ok(value) => Ok(Some(value)),
            Err(_) => Ok(None),
        }
    }

    /// Write-through on a successful remote read.
    pub fn put<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> {
        let entry = CacheEntry {
            value: serde_json::to_value(value)?,
            stored_at: Utc::now(),
            type_tag: std::any::type_name::<T>().to_string(),
        };
        let bytes = serde_json::to_vec(&entry)?;
        self.store.save_blob(&Self::blob_key(key), &bytes)
    }

    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        self.store.delete_blob(&Self::blob_key(key))
    }

    /// Evict every entry whose key belongs to `family`.
    pub fn invalidate_prefix(&self, family: &str) -> Result<usize> {
        let prefix = format!("{}{}:", KEY_PREFIX, family);
        let keys = self.store.list_keys(&prefix)?;
        let count = keys.len();
        for key in keys {
            self.store.delete_blob(&key)?;
        }
        if count > 0 {
            debug!(family, count, "invalidated cached reads");
        }
        Ok(count)
    }
}

/// How a read was satisfied.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadResult<T> {
    /// The network answered; cache was refreshed.
    Fresh(T),
    /// Network down, served from cache.
    Cached(T),
    /// Network down and nothing cached.
    Unavailable,
}

impl<T> ReadResult<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            ReadResult::Fresh(value) | ReadResult::Cached(value) => Some(value),
            ReadResult::Unavailable => None,
        }
    }
}

/// Network-first read with cache fallback.
///
/// Always attempts the remote call; on success the result is written
/// through to the cache and returned fresh. On transport failure the cache
/// is consulted. An application rejection propagates - the server answered,
/// serving stale data would mask it.
pub async fn read_through<T, F>(
    cache: &ResponseCache,
    key: &CacheKey,
    fetch: F,
) -> ApiResult<ReadResult<T>>
where
    T: Serialize + DeserializeOwned,
    F: Future<Output = ApiResult<T>>,
{
    match fetch.await {
        Ok(value) => {
            if let Err(e) = cache.put(key, &value) {
                debug!(key = %key, error = %e, "cache write-through failed");
            }
            Ok(ReadResult::Fresh(value))
        }
        Err(ApiError::Transport(reason)) => {
            debug!(key = %key, reason, "network read failed, trying cache");
            match cache.get::<T>(key) {
                Ok(Some(value)) => Ok(ReadResult::Cached(value)),
                _ => Ok(ReadResult::Unavailable),
            }
        }
        Err(rejection) => Err(rejection),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ListQuery;
    use crate::store::MemoryStore;

    fn cache() -> ResponseCache {
        ResponseCache::new(Arc::new(MemoryStore::new()), None)
    }

    #[test]
    fn test_put_get_round_trip() {
        let cache = cache();
        let key = CacheKey::list("categories", &ListQuery::page(25, 0));

        cache.put(&key, &vec!["tools".to_string()]).unwrap();
        let got: Vec<String> = cache.get(&key).unwrap().unwrap();
        assert_eq!(got, vec!["tools"]);
    }

    #[test]
    fn test_type_tag_mismatch_misses() {
        let cache = cache();
        let key = CacheKey::detail("products", 1);

        cache.put(&key, &42u64).unwrap();
        assert!(cache.get::<String>(&key).unwrap().is_none());
        assert_eq!(cache.get::<u64>(&key).unwrap(), Some(42));
    }

    #[test]
    fn test_prefix_invalidation_scope() {
        let cache = cache();
        let stocks_list = CacheKey::list("stocks", &ListQuery::page(25, 0));
        let stocks_detail = CacheKey::detail("stocks", 4);
        let products_list = CacheKey::list("products", &ListQuery::page(25, 0));

        cache.put(&stocks_list, &1u32).unwrap();
        cache.put(&stocks_detail, &2u32).unwrap();
        cache.put(&products_list, &3u32).unwrap();

        let evicted = cache.invalidate_prefix("stocks").unwrap();
        assert_eq!(evicted, 2);

        assert!(cache.get::<u32>(&stocks_list).unwrap().is_none());
        assert!(cache.get::<u32>(&stocks_detail).unwrap().is_none());
        assert_eq!(cache.get::<u32>(&products_list).unwrap(), Some(3));
    }

    #[test]
    fn test_max_age_expiry() {
        let store = Arc::new(MemoryStore::new());
        let cache = ResponseCache::new(Arc::clone(&store) as Arc<dyn PersistentStore>, Some(Duration::ZERO));
        let key = CacheKey::detail("products", 1);

        cache.put(&key, &1u32).unwrap();
        // Zero max-age means anything already stored is stale
        assert!(cache.get::<u32>(&key).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_through_fresh_populates_cache() {
        let cache = cache();
        let key = CacheKey::detail("products", 9);

        let result = read_through(&cache, &key, async { Ok::<_, ApiError>(7u32) })
            .await
            .unwrap();
        assert_eq!(result, ReadResult::Fresh(7));
        assert_eq!(cache.get::<u32>(&key).unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_read_through_falls_back_to_cache() {
        let cache = cache();
        let key = CacheKey::detail("products", 9);
        cache.put(&key, &7u32).unwrap();

        let result = read_through::<u32, _>(&cache, &key, async {
            Err(ApiError::Transport("offline".to_string()))
        })
        .await
        .unwrap();
        assert_eq!(result, ReadResult::Cached(7));
    }

    #[tokio::test]
    async fn test_read_through_unavailable_on_cold_cache() {
        let cache = cache();
        let key = CacheKey::detail("products", 9);

        let result = read_through::<u32, _>(&cache, &key, async {
            Err(ApiError::Transport("offline".to_string()))
        })
        .await
        .unwrap();
        assert_eq!(result, ReadResult::Unavailable);
    }

    #[tokio::test]
    async fn test_read_through_propagates_rejection() {
        let cache = cache();
        let key = CacheKey::detail("products", 9);
        cache.put(&key, &7u32).unwrap();

        let result = read_through::<u32, _>(&cache, &key, async {
            Err(ApiError::Rejected {
                status: 404,
                message: "gone".to_string(),
            })
        })
        .await;
        assert!(matches!(
            result,
            Err(ApiError::Rejected { status: 404, .. })
        ));
    }
}
