//! # Document Store Errors

use thiserror::Error;

/// Result type for document store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Server error code for a missing namespace.
pub const NAMESPACE_NOT_FOUND_CODE: i32 = 26;

/// Document store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The collection (namespace) does not exist.
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("Namespace already exists: {0}")]
    NamespaceExists(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// True if this error is the "namespace absent" condition
    pub fn is_namespace_absent(&self) -> bool {
        match self {
            StoreError::NamespaceNotFound(_) => true,
            StoreError::Command(message) => is_namespace_absent_message(message),
            _ => false,
        }
    }
}

/// True if a server message reports a missing namespace.
///
/// Matches the server's literal `ns not found` text, case-sensitive, anywhere in
/// the message. Drivers wrap it (`Command failed (NamespaceNotFound): ns not found`),
/// so a prefix match would be too strict.
pub fn is_namespace_absent_message(message: &str) -> bool {
    message.contains("ns not found")
}
