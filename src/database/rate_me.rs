use std::sync::Arc;

use serde_json::json;

use super::{decode_first, decode_rows, DbResult, Query, RemoteStore};
use crate::error::BaseError;
use crate::schema::models::RateMeEntry;
use crate::service::ai::analysis::RateMeAnalysis;

const RATE_ME_ENTRIES: &str = "rate_me_entries";

#[derive(Clone)]
pub struct RateMeRepository {
    store: Arc<dyn RemoteStore>,
}

impl RateMeRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Most voted first, score breaks ties.
    pub async fn leaderboard(&self, limit: usize) -> DbResult<Vec<RateMeEntry>> {
        let query = Query::table(RATE_ME_ENTRIES)
            .order("votes", false)
            .order("final_score", false)
            .limit(limit);
        decode_rows(self.store.select(&query).await?)
    }

    pub async fn get(&self, id: &str) -> DbResult<RateMeEntry> {
        let rows = self
            .store
            .select(&Query::table(RATE_ME_ENTRIES).eq("id", id).limit(1))
            .await?;
        decode_first(rows)?.ok_or_else(|| BaseError::NotFound(Some(format!("entry {} not found", id))))
    }

    /// Publishes an analysed photo to the leaderboard.
    pub async fn submit(
        &self,
        user_id: Option<&str>,
        display_name: Option<&str>,
        image_url: &str,
        analysis: &RateMeAnalysis,
    ) -> DbResult<RateMeEntry> {
        let row = json!({
            "user_id": user_id,
            "display_name": display_name,
            "image_url": image_url,
            "final_score": analysis.final_score,
            "votes": 0.0,
            "roast": analysis.roast,
            "toast": analysis.toast,
        });
        decode_first(self.store.insert(RATE_ME_ENTRIES, row).await?)?
            .ok_or_else(|| BaseError::Backend(Some("entry insert returned no row".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;

    #[tokio::test]
    async fn test_leaderboard_order() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            RATE_ME_ENTRIES,
            vec![
                json!({"id": "a", "image_url": "u", "final_score": 9.1, "votes": 0.02}),
                json!({"id": "b", "image_url": "u", "final_score": 7.5, "votes": 0.05}),
                json!({"id": "c", "image_url": "u", "final_score": 9.8, "votes": 0.02}),
            ],
        );
        let repo = RateMeRepository::new(store);
        let ids: Vec<_> = repo
            .leaderboard(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }
}
