// Typed calls into the backend's stored procedures. Their algorithms live in
// the database; only parameter names and the result envelope are assumed here.

use std::sync::Arc;

use cyder_tools::log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{DbResult, RemoteStore};
use crate::error::BaseError;

/// Common `{ success, message, ... }` envelope returned by mutating procedures.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct RpcOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default, alias = "error")]
    pub message: Option<String>,
    #[serde(default)]
    pub new_balance: Option<i64>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcOutcome {
    fn parse(name: &str, value: Value) -> DbResult<Self> {
        let outcome = match value {
            // Some procedures answer with a bare boolean.
            Value::Bool(success) => RpcOutcome { success, ..Default::default() },
            Value::Null => RpcOutcome { success: true, ..Default::default() },
            other => serde_json::from_value(other)?,
        };
        if outcome.success {
            return Ok(outcome);
        }
        let message = outcome.message.clone();
        warn!("procedure {} refused: {:?}", name, message);
        let lowered = message.as_deref().unwrap_or_default().to_lowercase();
        Err(if lowered.contains("insufficient credit") || lowered.contains("not enough credit") {
            BaseError::InsufficientCredits(message)
        } else if lowered.contains("insufficient balance") {
            BaseError::InsufficientBalance(message)
        } else {
            BaseError::Backend(message)
        })
    }
}

fn as_bool(name: &str, value: &Value) -> DbResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Object(map) => map
            .get("has_access")
            .or_else(|| map.get("unlocked"))
            .and_then(Value::as_bool)
            .ok_or_else(|| BaseError::Backend(Some(format!("{} returned no flag", name)))),
        Value::Null => Ok(false),
        _ => Err(BaseError::Backend(Some(format!("{} returned {}", name, value)))),
    }
}

#[derive(Clone)]
pub struct Procedures {
    store: Arc<dyn RemoteStore>,
}

impl Procedures {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    async fn call(&self, name: &str, params: Value) -> DbResult<RpcOutcome> {
        let value = self.store.rpc(name, params).await?;
        RpcOutcome::parse(name, value)
    }

    async fn flag(&self, name: &str, params: Value) -> DbResult<bool> {
        let value = self.store.rpc(name, params).await?;
        as_bool(name, &value)
    }

    pub async fn deduct_credits(&self, user_id: &str, amount: i64, reason: &str) -> DbResult<RpcOutcome> {
        self.call(
            "deduct_credits",
            json!({ "p_user_id": user_id, "p_amount": amount, "p_reason": reason }),
        )
        .await
    }

    pub async fn has_prompt_access(&self, user_id: &str, prompt_id: &str) -> DbResult<bool> {
        self.flag(
            "check_prompt_unlock",
            json!({ "p_user_id": user_id, "p_prompt_id": prompt_id }),
        )
        .await
    }

    pub async fn has_creator_unlock(&self, user_id: &str, creator_id: &str) -> DbResult<bool> {
        self.flag(
            "check_creator_unlock",
            json!({ "p_user_id": user_id, "p_creator_id": creator_id }),
        )
        .await
    }

    pub async fn purchase_prompt(&self, user_id: &str, prompt_id: &str) -> DbResult<RpcOutcome> {
        self.call(
            "purchase_prompt",
            json!({ "p_user_id": user_id, "p_prompt_id": prompt_id }),
        )
        .await
    }

    pub async fn unlock_creator(&self, user_id: &str, creator_id: &str) -> DbResult<RpcOutcome> {
        self.call(
            "unlock_creator",
            json!({ "p_user_id": user_id, "p_creator_id": creator_id }),
        )
        .await
    }

    pub async fn request_payout(&self, user_id: &str, credits: i64) -> DbResult<RpcOutcome> {
        self.call(
            "request_payout",
            json!({ "p_user_id": user_id, "p_amount": credits }),
        )
        .await
    }

    pub async fn credits_to_usd(&self, credits: i64) -> DbResult<f64> {
        let value = self
            .store
            .rpc("convert_credits_to_usd", json!({ "p_credits": credits }))
            .await?;
        match &value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            Value::Object(map) => map.get("usd").and_then(Value::as_f64),
            _ => None,
        }
        .ok_or_else(|| BaseError::Backend(Some(format!("convert_credits_to_usd returned {}", value))))
    }

    pub async fn vote_rate_me(&self, entry_id: &str, user_id: Option<&str>) -> DbResult<RpcOutcome> {
        self.call(
            "vote_rate_me_entry",
            json!({ "p_entry_id": entry_id, "p_user_id": user_id }),
        )
        .await
    }

    pub async fn increment_prompt_likes(&self, prompt_id: &str, delta: i64) -> DbResult<()> {
        self.store
            .rpc(
                "increment_prompt_likes",
                json!({ "p_prompt_id": prompt_id, "p_delta": delta }),
            )
            .await?;
        Ok(())
    }

    pub async fn upgrade_to_pro(&self, user_id: &str, affiliate_code: Option<&str>) -> DbResult<RpcOutcome> {
        let outcome = self
            .call(
                "upgrade_to_pro_with_affiliate",
                json!({ "p_user_id": user_id, "p_affiliate_code": affiliate_code }),
            )
            .await?;
        info!("user {} upgraded to Pro (affiliate: {:?})", user_id, affiliate_code);
        Ok(outcome)
    }

    pub async fn redeem_coupon(&self, user_id: &str, code: &str) -> DbResult<RpcOutcome> {
        let code = code.trim();
        if code.is_empty() {
            return Err(BaseError::ParamInvalid(Some("Enter a coupon code".to_string())));
        }
        self.call(
            "redeem_coupon",
            json!({ "p_user_id": user_id, "p_code": code.to_uppercase() }),
        )
        .await
    }

    pub async fn top_up_credits(&self, user_id: &str, credits: i64, transaction_id: &str) -> DbResult<RpcOutcome> {
        self.call(
            "top_up_credits",
            json!({ "p_user_id": user_id, "p_amount": credits, "p_transaction_id": transaction_id }),
        )
        .await
    }

    /// Sandbox-only credit grant used while the checkout runs against the test environment.
    pub async fn simulate_top_up(&self, user_id: &str, credits: i64) -> DbResult<RpcOutcome> {
        self.call(
            "simulate_top_up",
            json!({ "p_user_id": user_id, "p_amount": credits }),
        )
        .await
    }

    pub async fn become_creator(&self, user_id: &str, display_name: &str, bio: Option<&str>) -> DbResult<RpcOutcome> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(BaseError::ParamInvalid(Some("Display name is required".to_string())));
        }
        self.call(
            "become_creator",
            json!({ "p_user_id": user_id, "p_display_name": display_name, "p_bio": bio }),
        )
        .await
    }
}
