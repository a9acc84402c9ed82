use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use cyder_tools::log::error;

use crate::config::StorageDriver;
use crate::service::storage::types::{PutObjectOptions, StorageError, StorageResult};
use crate::service::storage::Storage;

/// Filesystem driver for offline use and tests. Public URLs are `file://` paths.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: &str) -> StorageResult<Self> {
        let root_path = Path::new(root);
        std::fs::create_dir_all(root_path).map_err(|e| {
            error!("Failed to create local storage directory {}: {}", root, e);
            StorageError::Config(format!("cannot create {}", root))
        })?;
        Ok(Self { root: root_path.to_path_buf() })
    }

    fn full_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.split('/').any(|part| part == ".." || part.is_empty()) {
            return Err(StorageError::Config(format!("invalid object key {}", key)));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn driver(&self) -> StorageDriver {
        StorageDriver::Local
    }

    async fn put_object(&self, key: &str, data: Bytes, options: Option<PutObjectOptions<'_>>) -> StorageResult<()> {
        let full_path = self.full_path(key)?;
        let upsert = options.map(|o| o.upsert).unwrap_or(false);
        if !upsert && tokio::fs::try_exists(&full_path).await.unwrap_or(false) {
            return Err(StorageError::Put(format!("{} already exists", key)));
        }
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                error!("Failed to create directory for local storage: {}", e);
                StorageError::Put("Failed to create directory".to_string())
            })?;
        }
        tokio::fs::write(&full_path, data)
            .await
            .map_err(|e| StorageError::Put(format!("Failed to write to file: {}", e)))
    }

    async fn get_object(&self, key: &str) -> StorageResult<Bytes> {
        let full_path = self.full_path(key)?;
        let data = tokio::fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound
            } else {
                StorageError::Get(format!("Failed to read file: {}", e))
            }
        })?;
        Ok(Bytes::from(data))
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let full_path = self.full_path(key)?;
        tokio::fs::remove_file(full_path)
            .await
            .map_err(|e| StorageError::Delete(format!("Failed to delete file: {}", e)))
    }

    fn public_url(&self, key: &str) -> String {
        format!("file://{}", self.root.join(key).display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap()).unwrap();
        let key = "avatars/me.jpg";

        storage.put_object(key, Bytes::from_static(b"jpeg"), None).await.unwrap();
        assert_eq!(storage.get_object(key).await.unwrap(), Bytes::from_static(b"jpeg"));
        assert!(storage.put_object(key, Bytes::from_static(b"again"), None).await.is_err());
        storage
            .put_object(key, Bytes::from_static(b"again"), Some(PutObjectOptions { upsert: true, ..Default::default() }))
            .await
            .unwrap();
        assert!(storage.public_url(key).ends_with("avatars/me.jpg"));

        storage.delete_object(key).await.unwrap();
        assert!(matches!(storage.get_object(key).await, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap()).unwrap();
        assert!(storage.get_object("../etc/passwd").await.is_err());
    }
}
