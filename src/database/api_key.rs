use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{decode_first, decode_rows, DbResult, Query, RemoteStore};
use crate::error::BaseError;
use crate::schema::models::ApiKeyRow;
use crate::service::ai::key_pool::KeySource;

const API_KEYS: &str = "api_keys";

/// Admin-managed provider keys; active ones feed the AI key pool.
#[derive(Clone)]
pub struct ApiKeyRepository {
    store: Arc<dyn RemoteStore>,
}

impl ApiKeyRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> DbResult<Vec<ApiKeyRow>> {
        let query = Query::table(API_KEYS).order("created_at", true);
        decode_rows(self.store.select(&query).await?)
    }

    pub async fn list_active(&self) -> DbResult<Vec<ApiKeyRow>> {
        let query = Query::table(API_KEYS)
            .eq("is_active", true)
            .order("created_at", true);
        decode_rows(self.store.select(&query).await?)
    }

    pub async fn insert(&self, api_key: &str, name: Option<&str>) -> DbResult<ApiKeyRow> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(BaseError::ParamInvalid(Some("API key is required".to_string())));
        }
        let row = json!({ "api_key": api_key, "name": name, "is_active": true });
        decode_first(self.store.insert(API_KEYS, row).await?)?
            .ok_or_else(|| BaseError::Backend(Some("api key insert returned no row".to_string())))
    }

    pub async fn set_active(&self, id: &str, is_active: bool) -> DbResult<()> {
        let rows = self
            .store
            .update(&Query::table(API_KEYS).eq("id", id), json!({ "is_active": is_active }))
            .await?;
        if rows.is_empty() {
            return Err(BaseError::NotFound(Some(format!("api key {} not found", id))));
        }
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        self.store.delete(&Query::table(API_KEYS).eq("id", id)).await?;
        Ok(())
    }
}

#[async_trait]
impl KeySource for ApiKeyRepository {
    async fn fetch_keys(&self) -> DbResult<Vec<String>> {
        Ok(self
            .list_active()
            .await?
            .into_iter()
            .map(|row| row.api_key)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;

    #[tokio::test]
    async fn test_only_active_keys_reach_the_pool() {
        let store = Arc::new(MemoryStore::new());
        let repo = ApiKeyRepository::new(store);
        let first = repo.insert("sk-1", Some("primary")).await.unwrap();
        repo.insert("sk-2", None).await.unwrap();
        repo.set_active(first.id.as_deref().unwrap(), false).await.unwrap();

        assert_eq!(repo.fetch_keys().await.unwrap(), vec!["sk-2"]);
        assert_eq!(repo.list().await.unwrap().len(), 2);
        assert!(repo.insert("  ", None).await.is_err());
    }
}
