use std::sync::Arc;

use super::{decode_first, decode_rows, DbResult, Page, Query, RemoteStore};
use crate::error::BaseError;
use crate::schema::models::SuperPrompt;

const SUPER_PROMPTS: &str = "super_prompts";

#[derive(Clone)]
pub struct SuperPromptRepository {
    store: Arc<dyn RemoteStore>,
}

impl SuperPromptRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, category_id: Option<&str>, page: Page) -> DbResult<Vec<SuperPrompt>> {
        let mut query = Query::table(SUPER_PROMPTS).order("created_at", false);
        if let Some(category_id) = category_id {
            query = query.eq("category_id", category_id);
        }
        decode_rows(self.store.select(&query.page(page)).await?)
    }

    pub async fn get(&self, id: &str) -> DbResult<SuperPrompt> {
        let rows = self
            .store
            .select(&Query::table(SUPER_PROMPTS).eq("id", id).limit(1))
            .await?;
        decode_first(rows)?.ok_or_else(|| BaseError::NotFound(Some(format!("mega prompt {} not found", id))))
    }
}
