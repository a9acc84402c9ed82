use std::sync::Arc;

use serde_json::json;

use super::{decode_first, decode_rows, DbResult, Query, RemoteStore};
use crate::error::BaseError;
use crate::schema::models::PromptRequest;

const PROMPT_REQUESTS: &str = "prompt_requests";

#[derive(Clone)]
pub struct PromptRequestRepository {
    store: Arc<dyn RemoteStore>,
}

impl PromptRequestRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub async fn submit(
        &self,
        user_id: Option<&str>,
        description: &str,
        reference_url: Option<&str>,
    ) -> DbResult<PromptRequest> {
        let description = description.trim();
        if description.is_empty() {
            return Err(BaseError::ParamInvalid(Some("Please describe the prompt you need".to_string())));
        }
        let row = json!({
            "user_id": user_id,
            "description": description,
            "reference_url": reference_url,
            "is_resolved": false,
        });
        decode_first(self.store.insert(PROMPT_REQUESTS, row).await?)?
            .ok_or_else(|| BaseError::Backend(Some("request insert returned no row".to_string())))
    }

    pub async fn list_open(&self) -> DbResult<Vec<PromptRequest>> {
        let query = Query::table(PROMPT_REQUESTS)
            .eq("is_resolved", false)
            .order("created_at", true);
        decode_rows(self.store.select(&query).await?)
    }

    pub async fn resolve(&self, id: &str) -> DbResult<()> {
        let rows = self
            .store
            .update(&Query::table(PROMPT_REQUESTS).eq("id", id), json!({ "is_resolved": true }))
            .await?;
        if rows.is_empty() {
            return Err(BaseError::NotFound(Some(format!("request {} not found", id))));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;

    #[tokio::test]
    async fn test_submit_and_resolve() {
        let repo = PromptRequestRepository::new(Arc::new(MemoryStore::new()));
        assert!(repo.submit(None, "  ", None).await.is_err());

        let request = repo.submit(Some("u1"), "Vintage poster style", None).await.unwrap();
        assert_eq!(repo.list_open().await.unwrap().len(), 1);

        repo.resolve(request.id.as_deref().unwrap()).await.unwrap();
        assert!(repo.list_open().await.unwrap().is_empty());
    }
}
