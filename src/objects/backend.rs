//! # Object Store Trait

use async_trait::async_trait;

use super::errors::{ObjectResult, ObjectStoreError};

/// Backend trait for blob uploads
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Store `body` under `key` in `bucket`, replacing any existing object
    async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>) -> ObjectResult<()>;
}

/// Reject keys that could escape a bucket prefix on path-based backends.
pub fn validate_key(key: &str) -> ObjectResult<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment.is_empty() || segment == "..");
    if bad {
        Err(ObjectStoreError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}
