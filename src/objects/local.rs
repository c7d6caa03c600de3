//! # Local Filesystem Backend
//!
//! Lays objects out as `<root>/<bucket>/<key>`. Used in local mode.

use std::path::PathBuf;

use async_trait::async_trait;

use super::backend::{validate_key, ObjectStore};
use super::errors::{ObjectResult, ObjectStoreError};

/// Local filesystem object store
#[derive(Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a new local backend
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn full_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>) -> ObjectResult<()> {
        validate_key(key)?;
        validate_key(bucket)?;
        let full_path = self.full_path(bucket, key);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ObjectStoreError::IoError(e.to_string()))?;
        }

        tokio::fs::write(&full_path, body)
            .await
            .map_err(|e| ObjectStoreError::UploadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_creates_nested_path() {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path().to_path_buf());

        store
            .upload("assets", "tenant-1/policy.pdf", b"pdf".to_vec())
            .await
            .unwrap();

        let written = std::fs::read(temp.path().join("assets/tenant-1/policy.pdf")).unwrap();
        assert_eq!(written, b"pdf");
    }

    #[tokio::test]
    async fn test_upload_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp.path().to_path_buf());

        let result = store.upload("assets", "../escape", b"x".to_vec()).await;
        assert!(matches!(result, Err(ObjectStoreError::InvalidKey(_))));
    }
}
