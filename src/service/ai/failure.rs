use thiserror::Error;

use crate::error::BaseError;

/// What the analyzer does after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Quota or rate exhaustion: next key, wait, same model.
    RotateWithBackoff,
    /// Key rejected: next key, same model, no wait.
    RotateKey,
    /// Provider side trouble: give up on this model.
    NextModel,
    /// Not retried.
    Fatal,
}

const QUOTA_KEYWORDS: [&str; 3] = ["quota", "credit", "limit"];

/// `status` is `None` when the request never produced a response.
pub fn classify_failure(status: Option<u16>, message: &str) -> FailureAction {
    let lowered = message.to_lowercase();
    if matches!(status, Some(429) | Some(402)) || QUOTA_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return FailureAction::RotateWithBackoff;
    }
    if matches!(status, Some(401) | Some(403)) || lowered.contains("user not found") {
        return FailureAction::RotateKey;
    }
    match status {
        Some(code) if code >= 500 => FailureAction::NextModel,
        // Connection errors look like an unavailable model.
        None => FailureAction::NextModel,
        Some(_) => FailureAction::Fatal,
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("{model} returned HTTP {status}: {message}")]
    Http { model: String, status: u16, message: String },
    #[error("request to {model} failed: {message}")]
    Transport { model: String, message: String },
    #[error("{model} returned an unusable answer: {reason}")]
    Malformed { model: String, reason: String },
    #[error("No AI API keys are configured")]
    NoKeys,
    #[error("All models are busy, please try again in a moment")]
    Exhausted,
}

impl From<ProviderError> for BaseError {
    fn from(err: ProviderError) -> Self {
        BaseError::Provider(Some(err.to_string()))
    }
}
