// Row shapes of the externally owned tables. Unknown columns are ignored and
// optional columns default, so schema drift on the backend does not break reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enum_def::{CategoryKind, ProfileRole, PromptStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role: ProfileRole,
    #[serde(default)]
    pub is_pro: bool,
    #[serde(default)]
    pub pro_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub affiliate_code: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: String,
    #[serde(default)]
    pub credits: i64,
    /// Creator earnings, in credits, eligible for payout.
    #[serde(default)]
    pub earnings: i64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub price_credits: i64,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub status: PromptStatus,
    #[serde(default)]
    pub is_bundle: bool,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptImage {
    #[serde(default)]
    pub id: Option<String>,
    pub prompt_id: String,
    pub image_url: String,
    #[serde(default)]
    pub position: i32,
}

/// One text variant of a prompt; bundles carry several, copied individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptContent {
    #[serde(default)]
    pub id: Option<String>,
    pub prompt_id: String,
    pub content: String,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Price of the all-content creator unlock.
    #[serde(default)]
    pub unlock_price_credits: i64,
    #[serde(default)]
    pub is_approved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorUnlock {
    pub user_id: String,
    pub creator_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptPurchase {
    pub user_id: String,
    pub prompt_id: String,
    #[serde(default)]
    pub price_credits: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateMeEntry {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub image_url: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub final_score: f64,
    /// Leaderboard votes, kept as a float because the remote vote adds fractional steps.
    #[serde(default)]
    pub votes: f64,
    #[serde(default)]
    pub roast: Option<String>,
    #[serde(default)]
    pub toast: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperPrompt {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub kind: CategoryKind,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub description: String,
    #[serde(default)]
    pub reference_url: Option<String>,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Row of the `api_keys` table feeding the AI key pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRow {
    #[serde(default)]
    pub id: Option<String>,
    pub api_key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_tolerates_missing_and_extra_columns() {
        let prompt: Prompt = serde_json::from_value(json!({
            "id": "p1",
            "title": "Neon portrait",
            "status": "approved",
            "views": 42
        }))
        .unwrap();
        assert_eq!(prompt.price_credits, 0);
        assert_eq!(prompt.status, PromptStatus::Approved);
        assert!(!prompt.is_bundle);
    }

    #[test]
    fn test_api_key_row_defaults_active() {
        let row: ApiKeyRow = serde_json::from_value(json!({ "api_key": "sk-or-1" })).unwrap();
        assert!(row.is_active);
    }
}
