use async_trait::async_trait;
use bytes::Bytes;
use cyder_tools::log::info;
use uuid::Uuid;

use crate::config::{BackendConfig, StorageConfig, StorageDriver};
use crate::database::SharedToken;
use crate::schema::enum_def::StorageFolder;
use crate::service::storage::bucket::BucketStorage;
use crate::service::storage::local::LocalStorage;
use crate::service::storage::types::{PutObjectOptions, StorageResult, StoredObject};
use crate::utils::image::compress_image;

pub mod bucket;
pub mod local;
pub mod types;

#[async_trait]
pub trait Storage: Send + Sync {
    fn driver(&self) -> StorageDriver;
    async fn put_object(&self, key: &str, data: Bytes, options: Option<PutObjectOptions<'_>>) -> StorageResult<()>;
    async fn get_object(&self, key: &str) -> StorageResult<Bytes>;
    async fn delete_object(&self, key: &str) -> StorageResult<()>;
    fn public_url(&self, key: &str) -> String;
}

pub fn new_storage(
    config: &StorageConfig,
    backend: &BackendConfig,
    token: SharedToken,
) -> StorageResult<Box<dyn Storage>> {
    Ok(match config.driver {
        StorageDriver::Local => Box::new(LocalStorage::new(&config.local_root)?),
        StorageDriver::Remote => Box::new(BucketStorage::new(backend, &config.bucket, token)?),
    })
}

fn extension_of(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())).then_some(ext)
}

/// Compresses and stores an image under `{folder}/{uuid}.{ext}`.
pub async fn upload_image(
    storage: &dyn Storage,
    folder: StorageFolder,
    file_name: &str,
    bytes: Vec<u8>,
    max_edge: u32,
) -> StorageResult<StoredObject> {
    let prepared = compress_image(bytes, max_edge).await;
    let extension = match prepared.extension {
        "bin" => extension_of(file_name).unwrap_or_else(|| "bin".to_string()),
        ext => ext.to_string(),
    };
    let key = format!("{}/{}.{}", folder, Uuid::new_v4(), extension);
    let options = PutObjectOptions { content_type: Some(prepared.mime), upsert: false };
    storage.put_object(&key, Bytes::from(prepared.bytes), Some(options)).await?;
    info!("stored {} via {:?} storage", key, storage.driver());
    Ok(StoredObject { url: storage.public_url(&key), key })
}
