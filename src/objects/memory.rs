//! # In-Memory Backend

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::backend::{validate_key, ObjectStore};
use super::errors::{ObjectResult, ObjectStoreError};

#[derive(Debug, Default)]
struct Objects {
    stored: BTreeMap<(String, String), Vec<u8>>,
    failing_keys: BTreeSet<String>,
    attempts: Vec<String>,
}

/// Object store holding blobs in memory. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<Mutex<Objects>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make uploads of `key` fail
    pub fn fail_key(&self, key: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing_keys.insert(key.to_string());
        }
    }

    /// Stored object body
    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock().ok()?;
        inner
            .stored
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys stored in `bucket`, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .stored
                    .keys()
                    .filter(|(b, _)| b == bucket)
                    .map(|(_, k)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every key an upload was attempted for, in order
    pub fn attempts(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.attempts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>) -> ObjectResult<()> {
        validate_key(key)?;
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| ObjectStoreError::Internal("Lock poisoned".into()))?;
        inner.attempts.push(key.to_string());
        if inner.failing_keys.contains(key) {
            return Err(ObjectStoreError::UploadFailed {
                key: key.to_string(),
                reason: "injected failure".into(),
            });
        }
        inner
            .stored
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_failure_injection() {
        let store = MemoryObjectStore::new();
        store.fail_key("t/bad.pdf");

        store.upload("b", "t/good.pdf", b"ok".to_vec()).await.unwrap();
        assert!(store.upload("b", "t/bad.pdf", b"no".to_vec()).await.is_err());

        assert_eq!(store.keys("b"), vec!["t/good.pdf".to_string()]);
        assert_eq!(store.attempts().len(), 2);
        assert_eq!(store.get("b", "t/good.pdf").unwrap(), b"ok");
    }
}
