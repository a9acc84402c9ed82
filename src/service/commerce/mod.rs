pub mod checkout;
pub mod engagement;

use std::sync::Arc;

use cyder_tools::log::info;

use crate::config::ClientConfig;
use crate::database::procedure::{Procedures, RpcOutcome};
use crate::error::BaseError;
use crate::schema::models::{Creator, Prompt};
use crate::service::session::SessionContext;

/// Why a prompt's content is (or is not) visible to the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Free,
    Owner,
    ProMember,
    CreatorUnlocked,
    Purchased,
    Locked { price: i64 },
}

impl AccessDecision {
    pub fn is_unlocked(&self) -> bool {
        !matches!(self, AccessDecision::Locked { .. })
    }
}

/// Credit-spending operations. Every balance rule is enforced remotely; the
/// checks here only avoid a round trip that is bound to fail.
pub struct Wallets {
    session: Arc<SessionContext>,
    procedures: Procedures,
    payout_min_credits: i64,
}

impl Wallets {
    pub fn new(session: Arc<SessionContext>, procedures: Procedures, config: &ClientConfig) -> Self {
        Self {
            session,
            procedures,
            payout_min_credits: config.payout_min_credits,
        }
    }

    pub async fn access_for(&self, prompt: &Prompt) -> Result<AccessDecision, BaseError> {
        if prompt.price_credits <= 0 {
            return Ok(AccessDecision::Free);
        }
        let snapshot = self.session.snapshot();
        let Some(user_id) = snapshot.user_id() else {
            return Ok(AccessDecision::Locked { price: prompt.price_credits });
        };
        if prompt.creator_id.as_deref() == Some(user_id) {
            return Ok(AccessDecision::Owner);
        }
        if snapshot.is_paid_member() {
            return Ok(AccessDecision::ProMember);
        }
        if let Some(creator_id) = &prompt.creator_id {
            if self.procedures.has_creator_unlock(user_id, creator_id).await? {
                return Ok(AccessDecision::CreatorUnlocked);
            }
        }
        if self.procedures.has_prompt_access(user_id, &prompt.id).await? {
            return Ok(AccessDecision::Purchased);
        }
        Ok(AccessDecision::Locked { price: prompt.price_credits })
    }

    fn ensure_credits(&self, needed: i64) -> Result<(), BaseError> {
        let credits = self.session.snapshot().credits();
        if credits < needed {
            return Err(BaseError::InsufficientCredits(Some(format!(
                "Insufficient credits: this costs {} credits and you have {}",
                needed, credits
            ))));
        }
        Ok(())
    }

    pub async fn unlock_prompt(&self, prompt: &Prompt) -> Result<AccessDecision, BaseError> {
        let user = self.session.require_user()?;
        let access = self.access_for(prompt).await?;
        if access.is_unlocked() {
            return Ok(access);
        }
        self.ensure_credits(prompt.price_credits)?;
        self.procedures.purchase_prompt(&user.id, &prompt.id).await?;
        info!("user {} purchased prompt {}", user.id, prompt.id);
        self.session.refresh_wallet().await?;
        Ok(AccessDecision::Purchased)
    }

    pub async fn unlock_creator(&self, creator: &Creator) -> Result<RpcOutcome, BaseError> {
        let user = self.session.require_user()?;
        if creator.id == user.id {
            return Err(BaseError::ParamInvalid(Some("You already own this content".to_string())));
        }
        self.ensure_credits(creator.unlock_price_credits)?;
        let outcome = self.procedures.unlock_creator(&user.id, &creator.id).await?;
        info!("user {} unlocked creator {}", user.id, creator.id);
        self.session.refresh_wallet().await?;
        Ok(outcome)
    }

    pub async fn request_payout(&self, credits: i64) -> Result<RpcOutcome, BaseError> {
        let user = self.session.require_user()?;
        if credits <= 0 {
            return Err(BaseError::ParamInvalid(Some("Enter a positive amount".to_string())));
        }
        if credits < self.payout_min_credits {
            return Err(BaseError::ParamInvalid(Some(format!(
                "Minimum payout is {} credits",
                self.payout_min_credits
            ))));
        }
        let earnings = self.session.snapshot().earnings();
        if credits > earnings {
            return Err(BaseError::InsufficientBalance(Some(format!(
                "Insufficient balance: you have {} credits in earnings",
                earnings
            ))));
        }
        let outcome = self.procedures.request_payout(&user.id, credits).await?;
        self.session.refresh_wallet().await?;
        Ok(outcome)
    }

    pub async fn credits_to_usd(&self, credits: i64) -> Result<f64, BaseError> {
        self.procedures.credits_to_usd(credits).await
    }

    pub async fn redeem_coupon(&self, code: &str) -> Result<RpcOutcome, BaseError> {
        let user = self.session.require_user()?;
        let outcome = self.procedures.redeem_coupon(&user.id, code).await?;
        self.session.refresh_wallet().await?;
        Ok(outcome)
    }

    pub async fn upgrade_to_pro(&self, affiliate_code: Option<&str>) -> Result<RpcOutcome, BaseError> {
        let user = self.session.require_user()?;
        let affiliate_code = affiliate_code.map(str::trim).filter(|c| !c.is_empty());
        let outcome = self.procedures.upgrade_to_pro(&user.id, affiliate_code).await?;
        self.session.refresh().await?;
        Ok(outcome)
    }

    pub async fn become_creator(&self, display_name: &str, bio: Option<&str>) -> Result<RpcOutcome, BaseError> {
        let user = self.session.require_user()?;
        let outcome = self.procedures.become_creator(&user.id, display_name, bio).await?;
        self.session.refresh().await?;
        Ok(outcome)
    }
}
