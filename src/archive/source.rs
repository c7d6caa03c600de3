//! Archive Store: turns a locator into a local archive file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::objects::S3ObjectStore;

use super::errors::{ArchiveError, ArchiveResult};
use super::locator::ArchiveLocator;

/// Fetches a remote archive to a local path
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Write the archive to `dest`, returning its size in bytes
    async fn fetch(&self, locator: &ArchiveLocator, dest: &Path) -> ArchiveResult<u64>;
}

/// Archive store backed by S3
pub struct S3ArchiveSource {
    client: S3ObjectStore,
}

impl S3ArchiveSource {
    pub fn new(client: S3ObjectStore) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArchiveSource for S3ArchiveSource {
    async fn fetch(&self, locator: &ArchiveLocator, dest: &Path) -> ArchiveResult<u64> {
        self.client
            .download_to(&locator.bucket, &locator.key, dest)
            .await
            .map_err(|e| ArchiveError::download_failed(e.to_string()))
    }
}

/// Archive store mirrored on the local filesystem as `<root>/<bucket>/<key>`.
///
/// Used for local runs against fixture archives.
pub struct DirectoryArchiveSource {
    root: PathBuf,
}

impl DirectoryArchiveSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ArchiveSource for DirectoryArchiveSource {
    async fn fetch(&self, locator: &ArchiveLocator, dest: &Path) -> ArchiveResult<u64> {
        let source = self.root.join(&locator.bucket).join(&locator.key);
        tokio::fs::copy(&source, dest).await.map_err(|e| {
            ArchiveError::download_failed(format!("{}: {}", source.display(), e))
        })
    }
}
