use async_trait::async_trait;
use cyder_tools::log::{debug, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::BackendConfig;
use crate::error::BaseError;
use crate::schema::enum_def::OAuthProvider;
use crate::utils::http::build_reqwest_client;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: i64,
    pub user: AuthUser,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    /// The account exists but the e-mail address still has to be confirmed.
    ConfirmationSent(AuthUser),
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession, BaseError>;
    async fn sign_up(&self, email: &str, password: &str, username: Option<&str>) -> Result<SignUpOutcome, BaseError>;
    /// Where to send the browser for a provider login.
    fn oauth_url(&self, provider: OAuthProvider, redirect_to: Option<&str>) -> Result<String, BaseError>;
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, BaseError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), BaseError>;
}

/// Client for the backend's GoTrue auth endpoints.
pub struct GoTrueAuth {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Deserialize)]
struct AuthErrorBody {
    #[serde(alias = "error_description", alias = "message")]
    msg: Option<String>,
}

fn auth_error(status: StatusCode, body: &str) -> BaseError {
    let message = serde_json::from_str::<AuthErrorBody>(body)
        .ok()
        .and_then(|b| b.msg)
        .unwrap_or_else(|| format!("auth request failed with {}", status));
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => BaseError::ParamInvalid(Some(message)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BaseError::Unauthorized(Some(message)),
        _ => BaseError::Backend(Some(message)),
    }
}

impl GoTrueAuth {
    pub fn new(config: &BackendConfig) -> Result<Self, BaseError> {
        Ok(Self::with_client(build_reqwest_client(None)?, config))
    }

    pub fn with_client(client: reqwest::Client, config: &BackendConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, bearer: Option<&str>, body: serde_json::Value) -> Result<String, BaseError> {
        let response = self
            .client
            .post(self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!("auth {} failed with {}", path, status);
            return Err(auth_error(status, &text));
        }
        debug!("auth {} -> {}", path, status);
        Ok(text)
    }
}

#[async_trait]
impl AuthApi for GoTrueAuth {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession, BaseError> {
        let body = self
            .post_json(
                "token?grant_type=password",
                None,
                json!({ "email": email.trim(), "password": password }),
            )
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn sign_up(&self, email: &str, password: &str, username: Option<&str>) -> Result<SignUpOutcome, BaseError> {
        let body = self
            .post_json(
                "signup",
                None,
                json!({ "email": email.trim(), "password": password, "data": { "username": username } }),
            )
            .await?;
        if let Ok(session) = serde_json::from_str::<AuthSession>(&body) {
            return Ok(SignUpOutcome::SignedIn(session));
        }
        Ok(SignUpOutcome::ConfirmationSent(serde_json::from_str(&body)?))
    }

    fn oauth_url(&self, provider: OAuthProvider, redirect_to: Option<&str>) -> Result<String, BaseError> {
        let mut params = vec![("provider", provider.to_string())];
        if let Some(redirect_to) = redirect_to {
            params.push(("redirect_to", redirect_to.to_string()));
        }
        let query = serde_urlencoded::to_string(&params)
            .map_err(|e| BaseError::ParamInvalid(Some(e.to_string())))?;
        Ok(format!("{}?{}", self.url("authorize"), query))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, BaseError> {
        let body = self
            .post_json(
                "token?grant_type=refresh_token",
                None,
                json!({ "refresh_token": refresh_token }),
            )
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BaseError> {
        self.post_json("logout", Some(access_token), json!({})).await?;
        Ok(())
    }
}
