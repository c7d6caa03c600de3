//! # S3 Backend
//!
//! Uploads tenant assets and downloads backup archives. Operation timeouts are
//! long and fixed: single uploads of large files may legitimately take tens of
//! minutes.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use tokio::io::AsyncWriteExt;

use super::backend::{validate_key, ObjectStore};
use super::errors::{ObjectResult, ObjectStoreError};

/// S3 client wrapper
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// Build a client from the ambient AWS environment.
    pub async fn from_env(region: Option<&str>, operation_timeout: Duration) -> Self {
        let timeouts = aws_config::timeout::TimeoutConfig::builder()
            .operation_timeout(operation_timeout)
            .build();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .timeout_config(timeouts);
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;

        Self {
            client: aws_sdk_s3::Client::new(&config),
        }
    }

    /// Stream `s3://bucket/key` into a local file, returning the bytes written.
    pub async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> ObjectResult<u64> {
        let failed = |reason: String| ObjectStoreError::DownloadFailed {
            key: key.to_string(),
            reason,
        };

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ObjectStoreError::IoError(e.to_string()))?;

        let mut body = response.body;
        let mut written = 0u64;
        while let Some(chunk) = body.try_next().await.map_err(|e| failed(e.to_string()))? {
            file.write_all(&chunk)
                .await
                .map_err(|e| ObjectStoreError::IoError(e.to_string()))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ObjectStoreError::IoError(e.to_string()))?;

        Ok(written)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, bucket: &str, key: &str, body: Vec<u8>) -> ObjectResult<()> {
        validate_key(key)?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| ObjectStoreError::UploadFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }
}
