use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod metrics;
pub mod repository;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// A cached value, or a marker that the source had nothing for the key.
#[derive(PartialEq, Debug, Clone)]
pub enum CacheEntry<T> {
    Positive(Arc<T>),
    Negative,
}

/// Basic KV operations with optional per-entry TTL.
#[async_trait]
pub trait CacheBackend<T>: Send + Sync + Clone + 'static
where
    T: Send + Sync + 'static,
{
    type Error: std::error::Error + Send + Sync + 'static;

    async fn get(&self, key: &str) -> Result<Option<Arc<CacheEntry<T>>>, Self::Error>;
    async fn set(&self, key: &str, value: Arc<CacheEntry<T>>, ttl: Option<Duration>) -> Result<(), Self::Error>;
    async fn delete(&self, key: &str) -> Result<(), Self::Error>;
    async fn clear(&self) -> Result<(), Self::Error>;
}
