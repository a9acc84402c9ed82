use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use super::{CacheBackend, CacheEntry, CacheError};

/// Typed view over a backend. Cache keys are managed by the caller.
pub struct CacheRepository<T, B>
where
    T: Send + Sync + 'static,
    B: CacheBackend<T>,
{
    backend: B,
    default_ttl: Option<Duration>,
    _phantom: PhantomData<T>,
}

impl<T, B> CacheRepository<T, B>
where
    T: Send + Sync + 'static,
    B: CacheBackend<T>,
{
    pub fn new(backend: B, default_ttl: Option<Duration>) -> Self {
        Self {
            backend,
            default_ttl,
            _phantom: PhantomData,
        }
    }

    /// Get the raw cache entry (Positive or Negative)
    pub async fn get_entry(&self, cache_key: &str) -> Result<Option<Arc<CacheEntry<T>>>, CacheError> {
        self.backend.get(cache_key).await
            .map_err(|e| CacheError::BackendError(e.to_string()))
    }

    /// Returns Ok(None) for Negative entries or cache misses.
    pub async fn get(&self, cache_key: &str) -> Result<Option<Arc<T>>, CacheError> {
        match self.get_entry(cache_key).await? {
            Some(entry) => match &*entry {
                CacheEntry::Positive(value) => Ok(Some(value.clone())),
                CacheEntry::Negative => Ok(None),
            },
            None => Ok(None),
        }
    }

    pub async fn set_positive(&self, cache_key: &str, value: T) -> Result<Arc<T>, CacheError> {
        let value = Arc::new(value);
        let entry = Arc::new(CacheEntry::Positive(value.clone()));
        self.backend.set(cache_key, entry, self.default_ttl).await
            .map_err(|e| CacheError::BackendError(e.to_string()))?;
        Ok(value)
    }

    pub async fn set_negative(&self, cache_key: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = Arc::new(CacheEntry::Negative);
        self.backend.set(cache_key, entry, Some(ttl)).await
            .map_err(|e| CacheError::BackendError(e.to_string()))
    }

    pub async fn delete(&self, cache_key: &str) -> Result<(), CacheError> {
        self.backend.delete(cache_key).await
            .map_err(|e| CacheError::BackendError(e.to_string()))
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.backend.clear().await
            .map_err(|e| CacheError::BackendError(e.to_string()))
    }
}

impl<T, B> Clone for CacheRepository<T, B>
where
    T: Send + Sync + 'static,
    B: CacheBackend<T>,
{
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            default_ttl: self.default_ttl,
            _phantom: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::cache::memory::MemoryCacheBackend;

    #[tokio::test]
    async fn test_default_ttl_applies_to_positive_entries() {
        let repo = CacheRepository::new(MemoryCacheBackend::<u32>::new(), Some(Duration::from_millis(40)));
        repo.set_positive("n", 7).await.unwrap();
        assert_eq!(repo.get("n").await.unwrap().as_deref(), Some(&7));
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(repo.get("n").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_negative_entry_reads_as_none_but_is_present() {
        let repo = CacheRepository::new(MemoryCacheBackend::<u32>::new(), None);
        repo.set_negative("n", Duration::from_secs(5)).await.unwrap();
        assert!(repo.get("n").await.unwrap().is_none());
        assert!(repo.get_entry("n").await.unwrap().is_some());
        repo.clear().await.unwrap();
        assert!(repo.get_entry("n").await.unwrap().is_none());
    }
}
