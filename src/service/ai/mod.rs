pub mod analysis;
pub mod extract;
pub mod failure;
pub mod key_pool;

use std::sync::Arc;

use cyder_tools::log::{debug, info, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AiConfig;
use crate::error::BaseError;
use crate::utils::http::{build_reqwest_client, mask_secret};
use crate::database::api_key::ApiKeyRepository;
use crate::database::DbResult;
use crate::schema::models::ApiKeyRow;
use crate::utils::image::data_url;

use analysis::AnalysisTask;
use extract::extract_json_object;
use failure::{classify_failure, FailureAction, ProviderError};
use key_pool::{KeyPool, KeySource};

/// An image ready to be sent inline as a `data:` URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInput {
    url: String,
}

impl ImageInput {
    pub fn from_bytes(bytes: &[u8], mime: &str) -> Self {
        Self { url: data_url(mime, bytes) }
    }

    pub fn from_data_url(url: &str) -> Result<Self, BaseError> {
        if !url.starts_with("data:image/") || !url.contains(";base64,") {
            return Err(BaseError::ParamInvalid(Some("Expected a base64 image data URL".to_string())));
        }
        Ok(Self { url: url.to_string() })
    }

    pub fn as_data_url(&self) -> &str {
        &self.url
    }
}

// --- wire types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: String },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<Value>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<Value>,
}

enum AttemptError {
    Failed { status: Option<u16>, message: String },
    Malformed(String),
}

fn content_text(content: Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s),
        // Some providers answer with a list of typed parts.
        Value::Array(parts) => {
            let joined: String = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message.unwrap_or_else(|| body.to_string()),
        Err(_) => body.chars().take(300).collect(),
    }
}

/// Image question answering over a chat-completion provider. Owns the key pool,
/// so the rotation cursor is shared by every call made through one analyzer.
pub struct ImageAnalyzer {
    config: AiConfig,
    client: reqwest::Client,
    pool: KeyPool,
}

impl ImageAnalyzer {
    pub fn new(config: AiConfig, source: Option<Arc<dyn KeySource>>) -> Result<Self, BaseError> {
        let client = build_reqwest_client(config.proxy.as_deref())?;
        Ok(Self::with_client(config, client, source))
    }

    pub fn with_client(config: AiConfig, client: reqwest::Client, source: Option<Arc<dyn KeySource>>) -> Self {
        let pool = KeyPool::new(config.api_keys.clone(), source, config.key_cache_ttl());
        Self { config, client, pool }
    }

    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    pub async fn analyze<T: AnalysisTask>(&self, task: &T, image: &ImageInput) -> Result<T::Output, BaseError> {
        let keys = self.pool.keys().await;
        if keys.is_empty() {
            return Err(ProviderError::NoKeys.into());
        }
        let attempts = keys.len().max(1);
        let mut last_error: Option<ProviderError> = None;

        for model in &self.config.models {
            let mut backoff_round = 0u32;
            for attempt in 0..attempts {
                let Some((index, key)) = self.pool.current(&keys) else {
                    return Err(ProviderError::NoKeys.into());
                };
                debug!(
                    "{}: model {} attempt {}/{} with key #{} ({})",
                    task.name(),
                    model,
                    attempt + 1,
                    attempts,
                    index,
                    mask_secret(key)
                );

                let failure = match self.send(model, key, task, image).await {
                    Ok(answer) => {
                        let parsed = extract_json_object(&answer)
                            .ok_or_else(|| "no JSON object in answer".to_string())
                            .and_then(|object| task.parse(object));
                        match parsed {
                            Ok(output) => {
                                info!("{}: answered by {}", task.name(), model);
                                return Ok(output);
                            }
                            Err(reason) => {
                                warn!("{}: {} gave an unusable answer: {}", task.name(), model, reason);
                                last_error = Some(ProviderError::Malformed { model: model.clone(), reason });
                                break;
                            }
                        }
                    }
                    Err(AttemptError::Malformed(reason)) => {
                        warn!("{}: {} gave an unusable response: {}", task.name(), model, reason);
                        last_error = Some(ProviderError::Malformed { model: model.clone(), reason });
                        break;
                    }
                    Err(AttemptError::Failed { status, message }) => (status, message),
                };

                let (status, message) = failure;
                let action = classify_failure(status, &message);
                warn!("{}: {} failed ({:?}): {} -> {:?}", task.name(), model, status, message, action);
                let error = match status {
                    Some(status) => ProviderError::Http { model: model.clone(), status, message },
                    None => ProviderError::Transport { model: model.clone(), message },
                };

                match action {
                    FailureAction::RotateWithBackoff => {
                        last_error = Some(error);
                        self.pool.rotate(keys.len());
                        if attempt + 1 < attempts {
                            tokio::time::sleep(self.config.backoff(backoff_round)).await;
                            backoff_round += 1;
                        }
                    }
                    FailureAction::RotateKey => {
                        last_error = Some(error);
                        self.pool.rotate(keys.len());
                    }
                    FailureAction::NextModel => {
                        last_error = Some(error);
                        break;
                    }
                    FailureAction::Fatal => return Err(error.into()),
                }
            }
        }

        Err(last_error.unwrap_or(ProviderError::Exhausted).into())
    }

    async fn send<T: AnalysisTask>(
        &self,
        model: &str,
        key: &str,
        task: &T,
        image: &ImageInput,
    ) -> Result<String, AttemptError> {
        let body = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: task.instruction() },
                    ContentPart::ImageUrl { image_url: ImageUrl { url: image.as_data_url() } },
                ],
            }],
        };

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", key))
            .header(CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(referer) = &self.config.referer {
            request = request.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.config.title {
            request = request.header("X-Title", title);
        }

        let response = request.send().await.map_err(|e| AttemptError::Failed {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        })?;
        let status = response.status();
        let text = response.text().await.map_err(|e| AttemptError::Failed {
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(AttemptError::Failed {
                status: Some(status.as_u16()),
                message: error_message(&text),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| AttemptError::Malformed(format!("invalid response body: {}", e)))?;
        // Errors can also arrive inside a 200 body.
        if let Some(error) = parsed.error {
            let status = error
                .code
                .as_ref()
                .and_then(Value::as_u64)
                .and_then(|c| u16::try_from(c).ok());
            return Err(AttemptError::Failed {
                status,
                message: error.message.unwrap_or_else(|| "provider error".to_string()),
            });
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .and_then(content_text)
            .ok_or_else(|| AttemptError::Malformed("response has no message content".to_string()))
    }
}

/// Admin edits to the `api_keys` table. Every change drops the analyzer's cached
/// pool so the next analysis picks it up.
pub struct KeyAdmin {
    keys: ApiKeyRepository,
    analyzer: Arc<ImageAnalyzer>,
}

impl KeyAdmin {
    pub fn new(keys: ApiKeyRepository, analyzer: Arc<ImageAnalyzer>) -> Self {
        Self { keys, analyzer }
    }

    pub async fn list(&self) -> DbResult<Vec<ApiKeyRow>> {
        self.keys.list().await
    }

    pub async fn add(&self, api_key: &str, name: Option<&str>) -> DbResult<ApiKeyRow> {
        let row = self.keys.insert(api_key, name).await?;
        self.analyzer.pool().invalidate().await;
        info!("added AI key {}", mask_secret(&row.api_key));
        Ok(row)
    }

    pub async fn set_active(&self, id: &str, is_active: bool) -> DbResult<()> {
        self.keys.set_active(id, is_active).await?;
        self.analyzer.pool().invalidate().await;
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> DbResult<()> {
        self.keys.delete(id).await?;
        self.analyzer.pool().invalidate().await;
        Ok(())
    }
}
