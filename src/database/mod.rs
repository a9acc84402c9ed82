use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use cyder_tools::log::{debug, error};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::config::BackendConfig;
use crate::error::BaseError;
use crate::utils::http::build_reqwest_client;

pub mod api_key;
pub mod category;
pub mod creator;
pub mod procedure;
pub mod profile;
pub mod prompt;
pub mod prompt_request;
pub mod rate_me;
pub mod super_prompt;

#[cfg(test)]
pub mod memory;

pub type DbResult<T> = Result<T, BaseError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, String),
    Neq(String, String),
    /// Case-insensitive match, `%` as wildcard.
    ILike(String, String),
    In(String, Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A read/update/delete target on one remote table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn table(name: &str) -> Self {
        Self {
            table: name.to_string(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.to_string()));
        self
    }

    pub fn neq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter::Neq(column.to_string(), value.to_string()));
        self
    }

    pub fn ilike(mut self, column: &str, pattern: &str) -> Self {
        self.filters.push(Filter::ILike(column.to_string(), pattern.to_string()));
        self
    }

    pub fn in_(mut self, column: &str, values: &[String]) -> Self {
        self.filters.push(Filter::In(column.to_string(), values.to_vec()));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(Order { column: column.to_string(), ascending });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn page(self, page: Page) -> Self {
        self.limit(page.page_size).offset(page.offset())
    }

    /// PostgREST query string pairs.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.clone())];
        for filter in &self.filters {
            let pair = match filter {
                Filter::Eq(col, v) => (col.clone(), format!("eq.{}", v)),
                Filter::Neq(col, v) => (col.clone(), format!("neq.{}", v)),
                Filter::ILike(col, v) => (col.clone(), format!("ilike.{}", v)),
                Filter::In(col, values) => {
                    let quoted: Vec<String> = values
                        .iter()
                        .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
                        .collect();
                    (col.clone(), format!("in.({})", quoted.join(",")))
                }
            };
            params.push(pair);
        }
        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect();
            params.push(("order".to_string(), order.join(",")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub page: usize,
    pub page_size: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, page_size: 24 }
    }
}

impl Page {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self { page: page.max(1), page_size }
    }

    pub fn offset(&self) -> usize {
        (self.page.max(1) - 1) * self.page_size
    }
}

/// Table and procedure access against the managed backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select(&self, query: &Query) -> DbResult<Vec<Value>>;
    async fn insert(&self, table: &str, rows: Value) -> DbResult<Vec<Value>>;
    async fn update(&self, query: &Query, patch: Value) -> DbResult<Vec<Value>>;
    async fn delete(&self, query: &Query) -> DbResult<Vec<Value>>;
    async fn rpc(&self, name: &str, params: Value) -> DbResult<Value>;
}

/// Access token of the signed-in user, shared between the auth client and the table client.
#[derive(Debug, Clone, Default)]
pub struct SharedToken(Arc<RwLock<Option<String>>>);

impl SharedToken {
    pub fn get(&self) -> Option<String> {
        self.0.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set(&self, token: Option<String>) {
        *self.0.write().unwrap_or_else(|e| e.into_inner()) = token;
    }
}

#[derive(Debug, Deserialize)]
struct RestErrorBody {
    message: Option<String>,
    #[serde(alias = "msg", alias = "error_description")]
    details: Option<String>,
}

/// PostgREST client.
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    token: SharedToken,
}

impl RestStore {
    pub fn new(config: &BackendConfig, token: SharedToken) -> DbResult<Self> {
        Ok(Self {
            client: build_reqwest_client(None)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let bearer = self.token.get().unwrap_or_else(|| self.anon_key.clone());
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, builder: reqwest::RequestBuilder, what: &str) -> DbResult<Value> {
        let response = builder.send().await.map_err(|e| {
            error!("backend request {} failed: {}", what, e);
            BaseError::Backend(Some(e.to_string()))
        })?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(rest_error(status, &body, what));
        }
        debug!("backend {} -> {}", what, status);
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn rest_error(status: StatusCode, body: &str, what: &str) -> BaseError {
    let message = serde_json::from_str::<RestErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.details))
        .unwrap_or_else(|| format!("{} returned {}", what, status));
    error!("backend {} error {}: {}", what, status, message);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BaseError::Unauthorized(Some(message)),
        StatusCode::NOT_FOUND => BaseError::NotFound(Some(message)),
        StatusCode::BAD_REQUEST => BaseError::ParamInvalid(Some(message)),
        _ => BaseError::Backend(Some(message)),
    }
}

fn into_rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn select(&self, query: &Query) -> DbResult<Vec<Value>> {
        let builder = self.request(Method::GET, &query.table).query(&query.to_params());
        Ok(into_rows(self.send(builder, &format!("select {}", query.table)).await?))
    }

    async fn insert(&self, table: &str, rows: Value) -> DbResult<Vec<Value>> {
        let builder = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&rows);
        Ok(into_rows(self.send(builder, &format!("insert {}", table)).await?))
    }

    async fn update(&self, query: &Query, patch: Value) -> DbResult<Vec<Value>> {
        let mut params = query.to_params();
        params.retain(|(k, _)| k != "select" && k != "order" && k != "limit" && k != "offset");
        let builder = self
            .request(Method::PATCH, &query.table)
            .header("Prefer", "return=representation")
            .query(&params)
            .json(&patch);
        Ok(into_rows(self.send(builder, &format!("update {}", query.table)).await?))
    }

    async fn delete(&self, query: &Query) -> DbResult<Vec<Value>> {
        let mut params = query.to_params();
        params.retain(|(k, _)| k != "select" && k != "order" && k != "limit" && k != "offset");
        let builder = self
            .request(Method::DELETE, &query.table)
            .header("Prefer", "return=representation")
            .query(&params);
        Ok(into_rows(self.send(builder, &format!("delete {}", query.table)).await?))
    }

    async fn rpc(&self, name: &str, params: Value) -> DbResult<Value> {
        let builder = self.request(Method::POST, &format!("rpc/{}", name)).json(&params);
        self.send(builder, &format!("rpc {}", name)).await
    }
}

pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> DbResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(BaseError::from))
        .collect()
}

pub(crate) fn decode_first<T: DeserializeOwned>(rows: Vec<Value>) -> DbResult<Option<T>> {
    match rows.into_iter().next() {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params() {
        let query = Query::table("prompts")
            .eq("status", "approved")
            .ilike("title", "%neon%")
            .in_("id", &["a".to_string(), "b".to_string()])
            .order("created_at", false)
            .page(Page::new(3, 10));
        let params = query.to_params();
        assert_eq!(params[0], ("select".to_string(), "*".to_string()));
        assert!(params.contains(&("status".to_string(), "eq.approved".to_string())));
        assert!(params.contains(&("title".to_string(), "ilike.%neon%".to_string())));
        assert!(params.contains(&("id".to_string(), "in.(\"a\",\"b\")".to_string())));
        assert!(params.contains(&("order".to_string(), "created_at.desc".to_string())));
        assert!(params.contains(&("limit".to_string(), "10".to_string())));
        assert!(params.contains(&("offset".to_string(), "20".to_string())));
    }

    #[test]
    fn test_page_zero_is_first_page() {
        assert_eq!(Page::new(0, 24).offset(), 0);
        assert_eq!(Page::new(2, 24).offset(), 24);
    }

    #[test]
    fn test_rest_error_mapping() {
        let err = rest_error(StatusCode::UNAUTHORIZED, r#"{"message":"JWT expired"}"#, "select x");
        assert_eq!(err, BaseError::Unauthorized(Some("JWT expired".to_string())));
        let err = rest_error(StatusCode::BAD_GATEWAY, "not json", "rpc y");
        assert!(matches!(err, BaseError::Backend(Some(ref m)) if m.contains("rpc y")));
    }

    #[test]
    fn test_shared_token() {
        let token = SharedToken::default();
        let clone = token.clone();
        token.set(Some("jwt".to_string()));
        assert_eq!(clone.get().as_deref(), Some("jwt"));
    }
}
