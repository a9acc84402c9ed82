use std::sync::Arc;

use cyder_tools::log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::{CheckoutConfig, CreditPack};
use crate::database::procedure::{Procedures, RpcOutcome};
use crate::error::BaseError;
use crate::schema::enum_def::CheckoutEnvironment;
use crate::service::session::SessionContext;

pub const CHECKOUT_COMPLETED: &str = "checkout.completed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutItem {
    #[serde(rename = "priceId")]
    pub price_id: String,
    pub quantity: u32,
}

/// Echoed back by the checkout widget on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutCustomData {
    pub user_id: String,
    #[serde(default)]
    pub credits: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliate_code: Option<String>,
}

/// Everything the overlay needs to open.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutIntent {
    pub token: String,
    pub environment: CheckoutEnvironment,
    pub items: Vec<CheckoutItem>,
    #[serde(rename = "customData")]
    pub custom_data: CheckoutCustomData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutEvent {
    pub name: String,
    #[serde(default)]
    pub data: Option<CheckoutEventData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutEventData {
    #[serde(default, alias = "id")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub custom_data: Option<CheckoutCustomData>,
}

pub const PRO_PLAN: &str = "pro";

pub struct Checkout {
    config: CheckoutConfig,
    session: Arc<SessionContext>,
    procedures: Procedures,
}

impl Checkout {
    pub fn new(config: CheckoutConfig, session: Arc<SessionContext>, procedures: Procedures) -> Self {
        Self { config, session, procedures }
    }

    pub fn packs(&self) -> &[CreditPack] {
        &self.config.packs
    }

    fn token(&self) -> Result<String, BaseError> {
        self.config
            .client_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BaseError::ParamInvalid(Some("Checkout is not configured".to_string())))
    }

    pub fn credit_intent(&self, price_id: &str) -> Result<CheckoutIntent, BaseError> {
        let user = self.session.require_user()?;
        let pack = self
            .config
            .packs
            .iter()
            .find(|p| p.price_id == price_id)
            .ok_or_else(|| BaseError::NotFound(Some(format!("unknown credit pack {}", price_id))))?;
        Ok(CheckoutIntent {
            token: self.token()?,
            environment: self.config.environment,
            items: vec![CheckoutItem { price_id: pack.price_id.clone(), quantity: 1 }],
            custom_data: CheckoutCustomData {
                user_id: user.id,
                credits: pack.credits,
                plan: None,
                affiliate_code: None,
            },
        })
    }

    pub fn pro_intent(&self, affiliate_code: Option<&str>) -> Result<CheckoutIntent, BaseError> {
        let user = self.session.require_user()?;
        let price_id = self
            .config
            .pro_price_id
            .clone()
            .ok_or_else(|| BaseError::ParamInvalid(Some("Pro checkout is not configured".to_string())))?;
        Ok(CheckoutIntent {
            token: self.token()?,
            environment: self.config.environment,
            items: vec![CheckoutItem { price_id, quantity: 1 }],
            custom_data: CheckoutCustomData {
                user_id: user.id,
                credits: 0,
                plan: Some(PRO_PLAN.to_string()),
                affiliate_code: affiliate_code.map(str::to_string),
            },
        })
    }

    /// Reacts to widget events. Only completed checkouts do anything.
    pub async fn handle_event(&self, event: CheckoutEvent) -> Result<Option<RpcOutcome>, BaseError> {
        if event.name != CHECKOUT_COMPLETED {
            debug!("ignoring checkout event {}", event.name);
            return Ok(None);
        }
        let data = event
            .data
            .ok_or_else(|| BaseError::ParamInvalid(Some("checkout event without data".to_string())))?;
        let custom = data
            .custom_data
            .ok_or_else(|| BaseError::ParamInvalid(Some("checkout event without custom data".to_string())))?;

        let outcome = if custom.plan.as_deref() == Some(PRO_PLAN) {
            self.procedures
                .upgrade_to_pro(&custom.user_id, custom.affiliate_code.as_deref())
                .await?
        } else {
            if custom.credits <= 0 {
                return Err(BaseError::ParamInvalid(Some("checkout without credits".to_string())));
            }
            match self.config.environment {
                CheckoutEnvironment::Sandbox => self.procedures.simulate_top_up(&custom.user_id, custom.credits).await?,
                CheckoutEnvironment::Production => {
                    let transaction_id = data.transaction_id.ok_or_else(|| {
                        BaseError::ParamInvalid(Some("checkout event without transaction id".to_string()))
                    })?;
                    self.procedures
                        .top_up_credits(&custom.user_id, custom.credits, &transaction_id)
                        .await?
                }
            }
        };
        info!("checkout completed for {} ({} credits)", custom.user_id, custom.credits);
        if self.session.snapshot().user_id() == Some(custom.user_id.as_str()) {
            self.session.refresh().await?;
        }
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::database::SharedToken;
    use crate::service::session::tests::{context, seeded_store};
    use serde_json::json;

    async fn checkout(store: Arc<MemoryStore>, environment: CheckoutEnvironment) -> Checkout {
        let session = Arc::new(context(store.clone(), SharedToken::default()));
        session.sign_in("bo@test", "password").await.unwrap();
        let config = CheckoutConfig {
            client_token: Some("test_token".to_string()),
            environment,
            pro_price_id: Some("pri_pro".to_string()),
            ..Default::default()
        };
        Checkout::new(config, session, Procedures::new(store))
    }

    #[tokio::test]
    async fn test_credit_intent_shape() {
        let checkout = checkout(seeded_store(), CheckoutEnvironment::Sandbox).await;
        let intent = checkout.credit_intent("pri_credits_500").unwrap();
        let value = serde_json::to_value(&intent).unwrap();
        assert_eq!(value["items"], json!([{"priceId": "pri_credits_500", "quantity": 1}]));
        assert_eq!(value["customData"], json!({"user_id": "bo", "credits": 500}));
        assert_eq!(value["environment"], "sandbox");
        assert!(checkout.credit_intent("pri_nope").is_err());
    }

    #[tokio::test]
    async fn test_completed_event_tops_up_and_refreshes_wallet() {
        let store = seeded_store();
        store.on_rpc("simulate_top_up", |_| Ok(json!({"success": true, "new_balance": 110})));
        let checkout = checkout(store.clone(), CheckoutEnvironment::Sandbox).await;

        let ignored: CheckoutEvent = serde_json::from_value(json!({"name": "checkout.loaded"})).unwrap();
        assert!(checkout.handle_event(ignored).await.unwrap().is_none());

        let event: CheckoutEvent = serde_json::from_value(json!({
            "name": "checkout.completed",
            "data": {"id": "txn_1", "custom_data": {"user_id": "bo", "credits": 100}}
        }))
        .unwrap();
        let outcome = checkout.handle_event(event).await.unwrap().unwrap();
        assert_eq!(outcome.new_balance, Some(110));
        let (name, params) = store.rpc_calls().pop().unwrap();
        assert_eq!(name, "simulate_top_up");
        assert_eq!(params["p_amount"], 100);
    }

    #[tokio::test]
    async fn test_production_requires_transaction_and_pro_plan_upgrades() {
        let store = seeded_store();
        store.on_rpc("top_up_credits", |_| Ok(json!({"success": true})));
        store.on_rpc("upgrade_to_pro_with_affiliate", |_| Ok(json!({"success": true})));
        let checkout = checkout(store.clone(), CheckoutEnvironment::Production).await;

        let missing_txn: CheckoutEvent = serde_json::from_value(json!({
            "name": "checkout.completed",
            "data": {"custom_data": {"user_id": "bo", "credits": 100}}
        }))
        .unwrap();
        assert!(checkout.handle_event(missing_txn).await.is_err());

        let intent = checkout.pro_intent(Some("FRIEND")).unwrap();
        let event: CheckoutEvent = serde_json::from_value(json!({
            "name": "checkout.completed",
            "data": {"transaction_id": "txn_2", "custom_data": serde_json::to_value(&intent.custom_data).unwrap()}
        }))
        .unwrap();
        checkout.handle_event(event).await.unwrap();
        let (name, params) = store.rpc_calls().pop().unwrap();
        assert_eq!(name, "upgrade_to_pro_with_affiliate");
        assert_eq!(params["p_affiliate_code"], "FRIEND");
    }
}
