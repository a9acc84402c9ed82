use async_trait::async_trait;
use cyder_tools::log::debug;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::{metrics::CacheMetrics, CacheBackend, CacheEntry};

#[derive(Debug, Error)]
#[error("Memory cache error: {0}")]
pub struct MemoryCacheError(String);

type Slot<T> = (Arc<CacheEntry<T>>, Option<Instant>); // value + expiration

pub struct MemoryCacheBackend<T>
where
    T: Send + Sync + 'static,
{
    data: Arc<DashMap<String, Slot<T>>>,
    metrics: Arc<CacheMetrics>,
}

impl<T> Clone for MemoryCacheBackend<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<T> MemoryCacheBackend<T>
where
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        let backend = Self {
            data: Arc::new(DashMap::new()),
            metrics: Arc::new(CacheMetrics::new()),
        };

        // Sweeping is only possible inside a runtime; lazy expiry on read covers the rest.
        if tokio::runtime::Handle::try_current().is_ok() {
            backend.clone().spawn_cleanup_task();
        }

        backend
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    fn spawn_cleanup_task(self) {
        let data = Arc::downgrade(&self.data);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                // Stop once every handle to the cache is gone.
                let Some(data) = data.upgrade() else { break };
                cleanup_expired(&data);
            }
        });
    }

    fn is_expired(expiration: Option<Instant>) -> bool {
        expiration.is_some_and(|exp| Instant::now() >= exp)
    }
}

fn cleanup_expired<T>(data: &DashMap<String, Slot<T>>) {
    let now = Instant::now();
    let mut removed_count = 0;

    data.retain(|_, (_, expiration)| match expiration {
        Some(exp) if now >= *exp => {
            removed_count += 1;
            false
        }
        _ => true,
    });

    if removed_count > 0 {
        debug!("Cleaned up {} expired cache entries", removed_count);
    }
}

#[async_trait]
impl<T> CacheBackend<T> for MemoryCacheBackend<T>
where
    T: Send + Sync + 'static,
{
    type Error = MemoryCacheError;

    async fn get(&self, key: &str) -> Result<Option<Arc<CacheEntry<T>>>, Self::Error> {
        if let Some(entry) = self.data.get(key) {
            let (value, expiration) = entry.value();

            if Self::is_expired(*expiration) {
                drop(entry);
                self.data.remove(key);
                self.metrics.record_miss();
                return Ok(None);
            }

            self.metrics.record_hit();
            Ok(Some(value.clone()))
        } else {
            self.metrics.record_miss();
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: Arc<CacheEntry<T>>, ttl: Option<Duration>) -> Result<(), Self::Error> {
        let expiration = ttl.map(|d| Instant::now() + d);
        self.data.insert(key.to_string(), (value, expiration));
        self.metrics.record_set();
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Self::Error> {
        self.data.remove(key);
        self.metrics.record_delete();
        Ok(())
    }

    async fn clear(&self) -> Result<(), Self::Error> {
        self.data.clear();
        debug!("In-memory cache cleared.");
        Ok(())
    }
}

impl<T> Default for MemoryCacheBackend<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
