use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::{decode_first, DbResult, Query, RemoteStore};
use crate::error::BaseError;
use crate::schema::models::{Profile, Wallet};

const PROFILES: &str = "profiles";
const WALLETS: &str = "wallets";

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone)]
pub struct ProfileRepository {
    store: Arc<dyn RemoteStore>,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, user_id: &str) -> DbResult<Option<Profile>> {
        let rows = self
            .store
            .select(&Query::table(PROFILES).eq("id", user_id).limit(1))
            .await?;
        decode_first(rows)
    }

    pub async fn update(&self, user_id: &str, patch: ProfilePatch) -> DbResult<Profile> {
        let mut fields = Map::new();
        if let Some(username) = patch.username {
            let username = username.trim().to_string();
            if username.is_empty() {
                return Err(BaseError::ParamInvalid(Some("Username cannot be empty".to_string())));
            }
            fields.insert("username".to_string(), json!(username));
        }
        if let Some(avatar_url) = patch.avatar_url {
            fields.insert("avatar_url".to_string(), json!(avatar_url));
        }
        if fields.is_empty() {
            return self
                .get(user_id)
                .await?
                .ok_or_else(|| BaseError::NotFound(Some("profile not found".to_string())));
        }
        let rows = self
            .store
            .update(&Query::table(PROFILES).eq("id", user_id), Value::Object(fields))
            .await?;
        decode_first(rows)?.ok_or_else(|| BaseError::NotFound(Some("profile not found".to_string())))
    }
}

#[derive(Clone)]
pub struct WalletRepository {
    store: Arc<dyn RemoteStore>,
}

impl WalletRepository {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, user_id: &str) -> DbResult<Option<Wallet>> {
        let rows = self
            .store
            .select(&Query::table(WALLETS).eq("user_id", user_id).limit(1))
            .await?;
        decode_first(rows)
    }
}
