use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use cyder_tools::log::{info, warn};
use tokio::sync::watch;

use crate::database::profile::{ProfileRepository, WalletRepository};
use crate::database::SharedToken;
use crate::error::BaseError;
use crate::schema::enum_def::{OAuthProvider, ProfileRole};
use crate::schema::models::{Profile, Wallet};
use crate::service::auth::{AuthApi, AuthSession, AuthUser, SignUpOutcome};

/// What the rest of the app knows about the signed-in user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<AuthUser>,
    pub profile: Option<Profile>,
    pub wallet: Option<Wallet>,
}

impl SessionSnapshot {
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    pub fn is_paid_member_at(&self, now: DateTime<Utc>) -> bool {
        self.profile
            .as_ref()
            .is_some_and(|p| p.is_pro && p.pro_expires_at.is_none_or(|expires| expires > now))
    }

    pub fn is_paid_member(&self) -> bool {
        self.is_paid_member_at(Utc::now())
    }

    pub fn is_admin(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| p.role == ProfileRole::Admin)
    }

    pub fn credits(&self) -> i64 {
        self.wallet.as_ref().map_or(0, |w| w.credits)
    }

    pub fn earnings(&self) -> i64 {
        self.wallet.as_ref().map_or(0, |w| w.earnings)
    }
}

/// Sole writer of the session state; everyone else holds a receiver.
pub struct SessionContext {
    auth: Arc<dyn AuthApi>,
    profiles: ProfileRepository,
    wallets: WalletRepository,
    token: SharedToken,
    refresh_token: Mutex<Option<String>>,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionContext {
    pub fn new(
        auth: Arc<dyn AuthApi>,
        profiles: ProfileRepository,
        wallets: WalletRepository,
        token: SharedToken,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            auth,
            profiles,
            wallets,
            token,
            refresh_token: Mutex::new(None),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn require_user(&self) -> Result<AuthUser, BaseError> {
        self.state
            .borrow()
            .user
            .clone()
            .ok_or_else(|| BaseError::Unauthorized(None))
    }

    async fn establish(&self, session: AuthSession) -> Result<SessionSnapshot, BaseError> {
        self.token.set(Some(session.access_token.clone()));
        *self.refresh_token.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.refresh_token.clone());
        info!("signed in as {}", session.user.id);
        self.state.send_modify(|s| {
            *s = SessionSnapshot { user: Some(session.user), profile: None, wallet: None };
        });
        self.refresh().await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionSnapshot, BaseError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(BaseError::ParamInvalid(Some("Email and password are required".to_string())));
        }
        let session = self.auth.sign_in_with_password(email, password).await?;
        self.establish(session).await
    }

    pub async fn sign_up(&self, email: &str, password: &str, username: Option<&str>) -> Result<SignUpOutcome, BaseError> {
        if password.chars().count() < 6 {
            return Err(BaseError::ParamInvalid(Some("Password must be at least 6 characters".to_string())));
        }
        let outcome = self.auth.sign_up(email, password, username).await?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.establish(session.clone()).await?;
        }
        Ok(outcome)
    }

    pub fn oauth_url(&self, provider: OAuthProvider, redirect_to: Option<&str>) -> Result<String, BaseError> {
        self.auth.oauth_url(provider, redirect_to)
    }

    /// Resumes a stored session.
    pub async fn restore(&self, refresh_token: &str) -> Result<SessionSnapshot, BaseError> {
        let session = self.auth.refresh(refresh_token).await?;
        self.establish(session).await
    }

    /// Profile first, then wallet; the snapshot is published after both.
    pub async fn refresh(&self) -> Result<SessionSnapshot, BaseError> {
        let Some(user) = self.state.borrow().user.clone() else {
            return Ok(SessionSnapshot::default());
        };
        let profile = self.profiles.get(&user.id).await?;
        let wallet = self.wallets.get(&user.id).await?;
        let snapshot = SessionSnapshot { user: Some(user), profile, wallet };
        self.state.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    pub async fn refresh_wallet(&self) -> Result<Option<Wallet>, BaseError> {
        let Some(user_id) = self.state.borrow().user_id().map(str::to_string) else {
            return Ok(None);
        };
        let wallet = self.wallets.get(&user_id).await?;
        self.state.send_modify(|s| s.wallet = wallet.clone());
        Ok(wallet)
    }

    pub async fn sign_out(&self) -> Result<(), BaseError> {
        if let Some(token) = self.token.get() {
            if let Err(e) = self.auth.sign_out(&token).await {
                // The local session is dropped regardless.
                warn!("remote sign out failed: {}", e);
            }
        }
        self.token.set(None);
        *self.refresh_token.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.state.send_replace(SessionSnapshot::default());
        Ok(())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.refresh_token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
