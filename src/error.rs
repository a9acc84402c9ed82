use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum BaseError {
    ParamInvalid(Option<String>),
    InsufficientCredits(Option<String>),
    InsufficientBalance(Option<String>),
    NotFound(Option<String>),
    Unauthorized(Option<String>),
    LimitReached(Option<String>),
    Backend(Option<String>),
    Provider(Option<String>),
    StoreError(Option<String>), // local preferences / cache
    InternalServerError(Option<String>),
}

impl BaseError {
    /// Numeric code and fallback text, grouped the same way the HTTP error codes were.
    fn parts(&self) -> (usize, &Option<String>, &'static str) {
        match self {
            BaseError::ParamInvalid(msg) => (1001, msg, "request params invalid"),
            BaseError::NotFound(msg) => (1002, msg, "data not found"),
            BaseError::Unauthorized(msg) => (1003, msg, "Please sign in to continue"),
            BaseError::InsufficientCredits(msg) => (1301, msg, "Insufficient credits"),
            BaseError::InsufficientBalance(msg) => (1302, msg, "Insufficient balance"),
            BaseError::LimitReached(msg) => (1303, msg, "Daily free limit reached"),
            BaseError::Backend(msg) => (1100, msg, "backend request failed"),
            BaseError::Provider(msg) => (1400, msg, "AI provider request failed"),
            BaseError::StoreError(msg) => (1200, msg, "local store operation failed"),
            BaseError::InternalServerError(msg) => (0, msg, "internal error"),
        }
    }

    pub fn code(&self) -> usize {
        self.parts().0
    }

    /// The text a front end shows in its toast.
    pub fn user_message(&self) -> String {
        let (_, msg, fallback) = self.parts();
        msg.clone().unwrap_or_else(|| fallback.to_string())
    }
}

impl fmt::Display for BaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.user_message())
    }
}

impl std::error::Error for BaseError {}

impl From<reqwest::Error> for BaseError {
    fn from(err: reqwest::Error) -> Self {
        BaseError::Backend(Some(err.to_string()))
    }
}

impl From<serde_json::Error> for BaseError {
    fn from(err: serde_json::Error) -> Self {
        BaseError::Backend(Some(format!("unexpected response shape: {}", err)))
    }
}

impl From<crate::service::cache::CacheError> for BaseError {
    fn from(err: crate::service::cache::CacheError) -> Self {
        BaseError::StoreError(Some(err.to_string()))
    }
}

impl From<crate::service::storage::types::StorageError> for BaseError {
    fn from(err: crate::service::storage::types::StorageError) -> Self {
        BaseError::Backend(Some(err.to_string()))
    }
}

impl From<crate::service::prefs::KvError> for BaseError {
    fn from(err: crate::service::prefs::KvError) -> Self {
        BaseError::StoreError(Some(err.to_string()))
    }
}
