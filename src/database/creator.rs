use std::sync::Arc;

use serde_json::json;

use super::{decode_first, decode_rows, DbResult, Query, RemoteStore};
use crate::error::BaseError;
use crate::schema::models::{Creator, CreatorUnlock};

const CREATORS: &str = "creators";
const CREATOR_UNLOCKS: &str = "creator_unlocks";

#[derive(Clone)]
pub struct CreatorRepository {
    store: Arc<dyn RemoteStore>,
}

impl CreatorRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: &str) -> DbResult<Creator> {
        let rows = self.store.select(&Query::table(CREATORS).eq("id", id).limit(1)).await?;
        decode_first(rows)?.ok_or_else(|| BaseError::NotFound(Some(format!("creator {} not found", id))))
    }

    pub async fn list_approved(&self) -> DbResult<Vec<Creator>> {
        let query = Query::table(CREATORS)
            .eq("is_approved", true)
            .order("display_name", true);
        decode_rows(self.store.select(&query).await?)
    }

    pub async fn list_applications(&self) -> DbResult<Vec<Creator>> {
        let query = Query::table(CREATORS).eq("is_approved", false);
        decode_rows(self.store.select(&query).await?)
    }

    pub async fn set_approved(&self, id: &str, approved: bool) -> DbResult<Creator> {
        let rows = self
            .store
            .update(&Query::table(CREATORS).eq("id", id), json!({ "is_approved": approved }))
            .await?;
        decode_first(rows)?.ok_or_else(|| BaseError::NotFound(Some(format!("creator {} not found", id))))
    }

    /// Creators the user holds an all-content unlock for.
    pub async fn unlocks_of(&self, user_id: &str) -> DbResult<Vec<CreatorUnlock>> {
        let query = Query::table(CREATOR_UNLOCKS).eq("user_id", user_id);
        decode_rows(self.store.select(&query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;

    #[tokio::test]
    async fn test_approval_moves_creator_out_of_applications() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            CREATORS,
            vec![
                json!({"id": "c1", "display_name": "Zed", "is_approved": true}),
                json!({"id": "c2", "display_name": "Amy", "is_approved": false}),
            ],
        );
        let repo = CreatorRepository::new(store);
        assert_eq!(repo.list_applications().await.unwrap().len(), 1);

        repo.set_approved("c2", true).await.unwrap();
        let names: Vec<_> = repo
            .list_approved()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.display_name)
            .collect();
        assert_eq!(names, vec!["Amy", "Zed"]);
    }
}
