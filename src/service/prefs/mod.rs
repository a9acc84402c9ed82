pub mod likes;
pub mod onboarding;
pub mod store;
pub mod usage;

use cyder_tools::log::warn;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub use store::{FileKv, MemoryKv};

#[derive(Debug, Error)]
pub enum KvError {
    #[error("local store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("local store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Flat string key/value persistence for client-side state.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    fn set(&self, key: &str, value: &str) -> Result<(), KvError>;
    fn remove(&self, key: &str) -> Result<(), KvError>;
    fn keys(&self) -> Result<Vec<String>, KvError>;
}

/// A value that no longer decodes is treated as absent.
pub fn get_json<T: DeserializeOwned>(kv: &dyn KeyValueStore, key: &str) -> Result<Option<T>, KvError> {
    let Some(raw) = kv.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("discarding unreadable local value {}: {}", key, e);
            Ok(None)
        }
    }
}

pub fn set_json<T: Serialize + ?Sized>(kv: &dyn KeyValueStore, key: &str, value: &T) -> Result<(), KvError> {
    kv.set(key, &serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_json_reads_as_absent() {
        let kv = MemoryKv::new();
        kv.set("liked_prompts", "[\"a\",").unwrap();
        let value: Option<Vec<String>> = get_json(&kv, "liked_prompts").unwrap();
        assert!(value.is_none());

        set_json(&kv, "liked_prompts", &["a", "b"]).unwrap();
        let value: Option<Vec<String>> = get_json(&kv, "liked_prompts").unwrap();
        assert_eq!(value.unwrap(), vec!["a", "b"]);
    }
}
