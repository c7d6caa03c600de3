//! Lifecycle error types
//!
//! Service control, schema migration and bootstrap failures. Each carries the
//! step it came from so the driver can report which external system failed.

use std::fmt;

/// Lifecycle error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleErrorCode {
    /// A process-controller command exited unsuccessfully or could not spawn
    CommandFailed,
    /// The schema migration runner failed
    MigrationFailed,
    /// The bootstrap call failed (single attempt or after exhausting retries)
    BootstrapFailed,
    /// The lifecycle state machine refused a transition
    InvalidTransition,
}

impl LifecycleErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleErrorCode::CommandFailed => "LIFECYCLE_COMMAND_FAILED",
            LifecycleErrorCode::MigrationFailed => "LIFECYCLE_MIGRATION_FAILED",
            LifecycleErrorCode::BootstrapFailed => "LIFECYCLE_BOOTSTRAP_FAILED",
            LifecycleErrorCode::InvalidTransition => "LIFECYCLE_INVALID_TRANSITION",
        }
    }
}

impl fmt::Display for LifecycleErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle error
#[derive(Debug, Clone)]
pub struct LifecycleError {
    code: LifecycleErrorCode,
    message: String,
}

impl LifecycleError {
    pub fn new(code: LifecycleErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn command_failed(message: impl Into<String>) -> Self {
        Self::new(LifecycleErrorCode::CommandFailed, message)
    }

    pub fn migration_failed(message: impl Into<String>) -> Self {
        Self::new(LifecycleErrorCode::MigrationFailed, message)
    }

    pub fn bootstrap_failed(message: impl Into<String>) -> Self {
        Self::new(LifecycleErrorCode::BootstrapFailed, message)
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new(LifecycleErrorCode::InvalidTransition, message)
    }

    pub fn code(&self) -> LifecycleErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for LifecycleError {}

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;
