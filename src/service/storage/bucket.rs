use async_trait::async_trait;
use bytes::Bytes;
use cyder_tools::log::{debug, error};
use reqwest::StatusCode;
use serde_json::json;

use crate::config::{BackendConfig, StorageDriver};
use crate::database::SharedToken;
use crate::service::storage::types::{PutObjectOptions, StorageError, StorageResult};
use crate::service::storage::Storage;
use crate::utils::http::build_reqwest_client;

/// One bucket of the backend's object storage API.
pub struct BucketStorage {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    bucket: String,
    token: SharedToken,
}

impl BucketStorage {
    pub fn new(backend: &BackendConfig, bucket: &str, token: SharedToken) -> StorageResult<Self> {
        let client = build_reqwest_client(None).map_err(|e| StorageError::Config(e.to_string()))?;
        Ok(Self::with_client(client, backend, bucket, token))
    }

    pub fn with_client(client: reqwest::Client, backend: &BackendConfig, bucket: &str, token: SharedToken) -> Self {
        Self {
            client,
            base_url: backend.url.trim_end_matches('/').to_string(),
            anon_key: backend.anon_key.clone(),
            bucket: bucket.to_string(),
            token,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let bearer = self.token.get().unwrap_or_else(|| self.anon_key.clone());
        builder.header("apikey", &self.anon_key).bearer_auth(bearer)
    }
}

async fn failure(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{}: {}", status, body.chars().take(200).collect::<String>())
}

#[async_trait]
impl Storage for BucketStorage {
    fn driver(&self) -> StorageDriver {
        StorageDriver::Remote
    }

    async fn put_object(&self, key: &str, data: Bytes, options: Option<PutObjectOptions<'_>>) -> StorageResult<()> {
        let options = options.unwrap_or_default();
        let response = self
            .authorized(self.client.post(self.object_url(key)))
            .header("content-type", options.content_type.unwrap_or("application/octet-stream"))
            .header("x-upsert", if options.upsert { "true" } else { "false" })
            .body(data)
            .send()
            .await
            .map_err(|e| {
                error!("upload of {} failed: {}", key, e);
                StorageError::Put(e.to_string())
            })?;
        if !response.status().is_success() {
            return Err(StorageError::Put(failure(response).await));
        }
        debug!("uploaded {}/{}", self.bucket, key);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> StorageResult<Bytes> {
        let response = self
            .authorized(self.client.get(self.object_url(key)))
            .send()
            .await
            .map_err(|e| StorageError::Get(e.to_string()))?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound),
            s if s.is_success() => response.bytes().await.map_err(|e| StorageError::Get(e.to_string())),
            _ => Err(StorageError::Get(failure(response).await)),
        }
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let response = self
            .authorized(self.client.delete(url))
            .json(&json!({ "prefixes": [key] }))
            .send()
            .await
            .map_err(|e| StorageError::Delete(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StorageError::Delete(failure(response).await));
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes as Body;
    use axum::extract::State;
    use axum::http::{HeaderMap, Method, StatusCode as HttpStatus, Uri};
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Objects = Arc<Mutex<HashMap<String, (String, Vec<u8>)>>>;

    async fn bucket_api(
        State(objects): State<Objects>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Body,
    ) -> (HttpStatus, Vec<u8>) {
        assert_eq!(headers.get("apikey").unwrap(), "anon");
        let path = uri.path().trim_start_matches("/storage/v1/object/").to_string();
        let mut objects = objects.lock().unwrap();
        match method {
            Method::POST => {
                let content_type = headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                objects.insert(path, (content_type, body.to_vec()));
                (HttpStatus::OK, b"{}".to_vec())
            }
            Method::GET => match objects.get(&path) {
                Some((_, data)) => (HttpStatus::OK, data.clone()),
                None => (HttpStatus::NOT_FOUND, Vec::new()),
            },
            Method::DELETE => {
                let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
                let key = format!("{}/{}", path, request["prefixes"][0].as_str().unwrap());
                objects.remove(&key);
                (HttpStatus::OK, b"[]".to_vec())
            }
            _ => (HttpStatus::METHOD_NOT_ALLOWED, Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_bucket_round_trip_against_stub() {
        let objects: Objects = Arc::default();
        let app = Router::new().fallback(bucket_api).with_state(objects.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let backend = BackendConfig { url: format!("http://{}/", addr), anon_key: "anon".to_string() };
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let storage = BucketStorage::with_client(client, &backend, "images", SharedToken::default());

        let options = PutObjectOptions { content_type: Some("image/jpeg"), upsert: false };
        storage
            .put_object("rate-me/a.jpg", Bytes::from_static(b"jpeg"), Some(options))
            .await
            .unwrap();
        assert_eq!(objects.lock().unwrap()["images/rate-me/a.jpg"].0, "image/jpeg");
        assert_eq!(storage.get_object("rate-me/a.jpg").await.unwrap(), Bytes::from_static(b"jpeg"));

        storage.delete_object("rate-me/a.jpg").await.unwrap();
        assert!(matches!(storage.get_object("rate-me/a.jpg").await, Err(StorageError::NotFound)));
        assert_eq!(
            storage.public_url("rate-me/a.jpg"),
            format!("http://{}/storage/v1/object/public/images/rate-me/a.jpg", addr)
        );
    }
}
