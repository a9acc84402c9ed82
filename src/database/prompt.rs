use std::sync::Arc;

use cyder_tools::log::warn;
use serde_json::json;

use super::{decode_first, decode_rows, DbResult, Page, Query, RemoteStore};
use crate::error::BaseError;
use crate::schema::enum_def::PromptStatus;
use crate::schema::models::{Prompt, PromptContent, PromptImage};

const PROMPTS: &str = "prompts";
const PROMPT_IMAGES: &str = "prompt_images";
const PROMPT_CONTENTS: &str = "prompt_contents";

/// Creator upload, stored as pending until moderated.
#[derive(Debug, Clone)]
pub struct NewPrompt {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub creator_id: String,
    pub price_credits: i64,
    pub image_urls: Vec<String>,
    pub contents: Vec<String>,
}

#[derive(Clone)]
pub struct PromptRepository {
    store: Arc<dyn RemoteStore>,
}

impl PromptRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    fn approved() -> Query {
        Query::table(PROMPTS)
            .eq("status", PromptStatus::Approved)
            .order("created_at", false)
    }

    pub async fn list_approved(&self, page: Page) -> DbResult<Vec<Prompt>> {
        decode_rows(self.store.select(&Self::approved().page(page)).await?)
    }

    pub async fn list_by_category(&self, category_id: &str, page: Page) -> DbResult<Vec<Prompt>> {
        let query = Self::approved().eq("category_id", category_id).page(page);
        decode_rows(self.store.select(&query).await?)
    }

    pub async fn list_by_creator(&self, creator_id: &str) -> DbResult<Vec<Prompt>> {
        let query = Self::approved().eq("creator_id", creator_id);
        decode_rows(self.store.select(&query).await?)
    }

    /// Title search; a blank term returns nothing rather than the whole catalogue.
    pub async fn search(&self, term: &str, limit: usize) -> DbResult<Vec<Prompt>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }
        // `%` and `*` are both wildcards to PostgREST.
        let escaped = term.replace(['%', '*'], "").replace(',', " ");
        if escaped.trim().is_empty() {
            return Ok(Vec::new());
        }
        let query = Self::approved()
            .ilike("title", &format!("%{}%", escaped))
            .limit(limit);
        decode_rows(self.store.select(&query).await?)
    }

    pub async fn get(&self, id: &str) -> DbResult<Prompt> {
        let rows = self.store.select(&Query::table(PROMPTS).eq("id", id).limit(1)).await?;
        decode_first(rows)?.ok_or_else(|| BaseError::NotFound(Some(format!("prompt {} not found", id))))
    }

    pub async fn images(&self, prompt_id: &str) -> DbResult<Vec<PromptImage>> {
        let query = Query::table(PROMPT_IMAGES)
            .eq("prompt_id", prompt_id)
            .order("position", true);
        decode_rows(self.store.select(&query).await?)
    }

    pub async fn contents(&self, prompt_id: &str) -> DbResult<Vec<PromptContent>> {
        let query = Query::table(PROMPT_CONTENTS)
            .eq("prompt_id", prompt_id)
            .order("position", true);
        decode_rows(self.store.select(&query).await?)
    }

    pub async fn create(&self, new_prompt: NewPrompt) -> DbResult<Prompt> {
        if new_prompt.title.trim().is_empty() {
            return Err(BaseError::ParamInvalid(Some("Title is required".to_string())));
        }
        if new_prompt.contents.iter().all(|c| c.trim().is_empty()) {
            return Err(BaseError::ParamInvalid(Some("Prompt text is required".to_string())));
        }
        if new_prompt.price_credits < 0 {
            return Err(BaseError::ParamInvalid(Some("Price cannot be negative".to_string())));
        }
        let is_bundle = new_prompt.contents.len() > 1 || new_prompt.image_urls.len() > 1;
        let row = json!({
            "title": new_prompt.title.trim(),
            "description": new_prompt.description,
            "category_id": new_prompt.category_id,
            "creator_id": new_prompt.creator_id,
            "price_credits": new_prompt.price_credits,
            "status": PromptStatus::Pending,
            "is_bundle": is_bundle,
            "cover_url": new_prompt.image_urls.first(),
        });
        let prompt: Prompt = decode_first(self.store.insert(PROMPTS, row).await?)?
            .ok_or_else(|| BaseError::Backend(Some("prompt insert returned no row".to_string())))?;

        if let Err(e) = self.insert_children(&prompt.id, &new_prompt).await {
            // A prompt without its images or text must not reach moderation.
            if let Err(cleanup) = self.delete(&prompt.id).await {
                warn!("could not remove partial prompt {}: {}", prompt.id, cleanup);
            }
            return Err(e);
        }
        Ok(prompt)
    }

    async fn insert_children(&self, prompt_id: &str, new_prompt: &NewPrompt) -> DbResult<()> {
        if !new_prompt.image_urls.is_empty() {
            let images: Vec<_> = new_prompt
                .image_urls
                .iter()
                .enumerate()
                .map(|(i, url)| json!({ "prompt_id": prompt_id, "image_url": url, "position": i }))
                .collect();
            self.store.insert(PROMPT_IMAGES, json!(images)).await?;
        }
        let contents: Vec<_> = new_prompt
            .contents
            .iter()
            .filter(|c| !c.trim().is_empty())
            .enumerate()
            .map(|(i, text)| json!({ "prompt_id": prompt_id, "content": text, "position": i }))
            .collect();
        self.store.insert(PROMPT_CONTENTS, json!(contents)).await?;
        Ok(())
    }

    // --- moderation ---

    pub async fn list_pending(&self) -> DbResult<Vec<Prompt>> {
        let query = Query::table(PROMPTS)
            .eq("status", PromptStatus::Pending)
            .order("created_at", true);
        decode_rows(self.store.select(&query).await?)
    }

    pub async fn set_status(&self, id: &str, status: PromptStatus) -> DbResult<Prompt> {
        let rows = self
            .store
            .update(&Query::table(PROMPTS).eq("id", id), json!({ "status": status }))
            .await?;
        decode_first(rows)?.ok_or_else(|| BaseError::NotFound(Some(format!("prompt {} not found", id))))
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        self.store.delete(&Query::table(PROMPT_IMAGES).eq("prompt_id", id)).await?;
        self.store.delete(&Query::table(PROMPT_CONTENTS).eq("prompt_id", id)).await?;
        let removed = self.store.delete(&Query::table(PROMPTS).eq("id", id)).await?;
        if removed.is_empty() {
            return Err(BaseError::NotFound(Some(format!("prompt {} not found", id))));
        }
        Ok(())
    }
}
