//! # Object Store Errors

use thiserror::Error;

/// Result type for object store operations
pub type ObjectResult<T> = Result<T, ObjectStoreError>;

/// Object store errors
#[derive(Debug, Clone, Error)]
pub enum ObjectStoreError {
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Upload failed for {key}: {reason}")]
    UploadFailed { key: String, reason: String },

    #[error("Download failed for {key}: {reason}")]
    DownloadFailed { key: String, reason: String },

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ObjectStoreError {
    /// True for failures a later re-upload may fix
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ObjectStoreError::UploadFailed { .. }
                | ObjectStoreError::DownloadFailed { .. }
                | ObjectStoreError::IoError(_)
        )
    }
}
