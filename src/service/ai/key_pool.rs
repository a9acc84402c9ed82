use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cyder_tools::log::{debug, info, warn};

use crate::database::DbResult;
use crate::service::cache::memory::MemoryCacheBackend;
use crate::service::cache::repository::CacheRepository;
use crate::utils::http::mask_secret;

const KEYS_CACHE_KEY: &str = "ai:api_keys";

/// Where runtime keys come from (the admin-managed `api_keys` table).
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn fetch_keys(&self) -> DbResult<Vec<String>>;
}

/// Ordered credentials plus the rotation cursor shared by every call on this pool.
pub struct KeyPool {
    static_keys: Vec<String>,
    source: Option<Arc<dyn KeySource>>,
    cache: CacheRepository<Vec<String>, MemoryCacheBackend<Vec<String>>>,
    index: AtomicUsize,
    refresh_lock: tokio::sync::Mutex<()>,
}

fn merge_keys(first: &[String], second: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    first
        .iter()
        .chain(second.iter())
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_string()))
        .map(str::to_string)
        .collect()
}

impl KeyPool {
    pub fn new(static_keys: Vec<String>, source: Option<Arc<dyn KeySource>>, ttl: Duration) -> Self {
        Self {
            static_keys,
            source,
            cache: CacheRepository::new(MemoryCacheBackend::new(), Some(ttl)),
            index: AtomicUsize::new(0),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The current key list, refetched from the source once the cache window has passed.
    pub async fn keys(&self) -> Arc<Vec<String>> {
        if let Ok(Some(keys)) = self.cache.get(KEYS_CACHE_KEY).await {
            return keys;
        }
        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        if let Ok(Some(keys)) = self.cache.get(KEYS_CACHE_KEY).await {
            return keys;
        }

        let Some(source) = &self.source else {
            let keys = merge_keys(&self.static_keys, &[]);
            return self.store(keys).await;
        };
        match source.fetch_keys().await {
            Ok(fetched) => {
                let keys = merge_keys(&self.static_keys, &fetched);
                info!(
                    "AI key pool refreshed: {} configured, {} fetched, {} usable",
                    self.static_keys.len(),
                    fetched.len(),
                    keys.len()
                );
                self.store(keys).await
            }
            Err(e) => {
                // Not cached, so the next call retries the source.
                warn!("Failed to fetch API keys, using configured keys only: {}", e);
                Arc::new(merge_keys(&self.static_keys, &[]))
            }
        }
    }

    async fn store(&self, keys: Vec<String>) -> Arc<Vec<String>> {
        match self.cache.set_positive(KEYS_CACHE_KEY, keys.clone()).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Failed to cache API keys: {}", e);
                Arc::new(keys)
            }
        }
    }

    /// Key at the cursor, bounded by the snapshot the caller is iterating.
    pub fn current<'a>(&self, keys: &'a [String]) -> Option<(usize, &'a str)> {
        if keys.is_empty() {
            return None;
        }
        let index = self.index.load(Ordering::SeqCst) % keys.len();
        Some((index, keys[index].as_str()))
    }

    pub fn index(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    /// Advances the cursor, wrapping at `len`. Returns the new index.
    pub fn rotate(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let previous = self
            .index
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| Some((i % len + 1) % len))
            .unwrap_or(0);
        let next = (previous % len + 1) % len;
        debug!("AI key rotated {} -> {}", previous % len, next);
        next
    }

    pub async fn describe(&self) -> Vec<String> {
        self.keys().await.iter().map(|k| mask_secret(k)).collect()
    }

    pub async fn invalidate(&self) {
        if let Err(e) = self.cache.delete(KEYS_CACHE_KEY).await {
            warn!("Failed to invalidate API key cache: {}", e);
        }
    }
}
