//! Restore error types
//!
//! Every error that reaches the driver is fatal: it aborts the remaining
//! pipeline and the process exits non-zero. Idempotent-absence and best-effort
//! failures are recognized at the call site and never become a `RestoreError`.

use std::error::Error as StdError;
use std::fmt;

use crate::archive::ArchiveError;
use crate::lifecycle::{LifecycleError, LifecycleErrorCode};
use crate::store::StoreError;

use super::plan::Phase;

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Unrecoverable, requires operator intervention
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Failure taxonomy of a restore run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Nothing has been mutated yet; safe to abort
    Precondition,
    /// A rename/insert/update failed mid-mutation; rotated data is the rollback path
    Mutation,
    /// An eventually-consistent dependency never became reachable
    Dependency,
    /// Local filesystem or subprocess failure
    Io,
    /// Invalid configuration or entry parameters
    Config,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Precondition => "precondition",
            ErrorClass::Mutation => "mutation",
            ErrorClass::Dependency => "dependency",
            ErrorClass::Io => "io",
            ErrorClass::Config => "config",
        }
    }
}

/// Restore error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreErrorCode {
    /// Organization record missing or ambiguous, tenant id unreadable
    RestorePrecondition,
    /// Archive could not be located, fetched or read
    RestoreArchive,
    /// Document store mutation failed
    RestoreMutation,
    /// Service stop/start or schema migration failed
    RestoreLifecycle,
    /// Bootstrap retries exhausted
    RestoreBootstrap,
    /// Local I/O failure
    RestoreIo,
    /// Invalid options
    RestoreConfig,
    /// Driver invariant broken
    RestoreInternal,
}

impl RestoreErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestoreErrorCode::RestorePrecondition => "RESTORE_PRECONDITION",
            RestoreErrorCode::RestoreArchive => "RESTORE_ARCHIVE",
            RestoreErrorCode::RestoreMutation => "RESTORE_MUTATION",
            RestoreErrorCode::RestoreLifecycle => "RESTORE_LIFECYCLE",
            RestoreErrorCode::RestoreBootstrap => "RESTORE_BOOTSTRAP",
            RestoreErrorCode::RestoreIo => "RESTORE_IO",
            RestoreErrorCode::RestoreConfig => "RESTORE_CONFIG",
            RestoreErrorCode::RestoreInternal => "RESTORE_INTERNAL",
        }
    }

    /// Where this code sits in the failure taxonomy
    pub fn class(&self) -> ErrorClass {
        match self {
            RestoreErrorCode::RestorePrecondition | RestoreErrorCode::RestoreArchive => {
                ErrorClass::Precondition
            }
            RestoreErrorCode::RestoreMutation => ErrorClass::Mutation,
            RestoreErrorCode::RestoreBootstrap => ErrorClass::Dependency,
            RestoreErrorCode::RestoreLifecycle
            | RestoreErrorCode::RestoreIo
            | RestoreErrorCode::RestoreInternal => ErrorClass::Io,
            RestoreErrorCode::RestoreConfig => ErrorClass::Config,
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

impl fmt::Display for RestoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

type Source = Box<dyn StdError + Send + Sync + 'static>;

/// Restore error with full context
#[derive(Debug)]
pub struct RestoreError {
    code: RestoreErrorCode,
    message: String,
    /// Phase the error surfaced in, attached by the driver
    phase: Option<Phase>,
    source: Option<Source>,
}

impl RestoreError {
    fn new(code: RestoreErrorCode, message: impl Into<String>, source: Option<Source>) -> Self {
        Self {
            code,
            message: message.into(),
            phase: None,
            source,
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorCode::RestorePrecondition, message, None)
    }

    pub fn precondition_with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::new(
            RestoreErrorCode::RestorePrecondition,
            message,
            Some(Box::new(source)),
        )
    }

    pub fn mutation(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::new(RestoreErrorCode::RestoreMutation, message, Some(Box::new(source)))
    }

    pub fn bootstrap(message: impl Into<String>, source: LifecycleError) -> Self {
        Self::new(RestoreErrorCode::RestoreBootstrap, message, Some(Box::new(source)))
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorCode::RestoreIo, message, None)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorCode::RestoreConfig, message, None)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RestoreErrorCode::RestoreInternal, message, None)
    }

    /// Attach the phase this error surfaced in. The first phase attached wins.
    pub fn in_phase(mut self, phase: Phase) -> Self {
        self.phase.get_or_insert(phase);
        self
    }

    pub fn code(&self) -> RestoreErrorCode {
        self.code
    }

    pub fn class(&self) -> ErrorClass {
        self.code.class()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Restore errors always abort the run
    pub fn is_fatal(&self) -> bool {
        true
    }
}

impl fmt::Display for RestoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: ", self.severity(), self.code)?;
        if let Some(phase) = self.phase {
            write!(f, "{}: ", phase.name())?;
        }
        write!(f, "{}", self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl StdError for RestoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<StoreError> for RestoreError {
    fn from(err: StoreError) -> Self {
        RestoreError::mutation("Document store operation failed", err)
    }
}

impl From<ArchiveError> for RestoreError {
    fn from(err: ArchiveError) -> Self {
        Self::new(
            RestoreErrorCode::RestoreArchive,
            "Archive unavailable",
            Some(Box::new(err)),
        )
    }
}

impl From<LifecycleError> for RestoreError {
    fn from(err: LifecycleError) -> Self {
        let code = match err.code() {
            LifecycleErrorCode::BootstrapFailed => RestoreErrorCode::RestoreBootstrap,
            _ => RestoreErrorCode::RestoreLifecycle,
        };
        Self::new(code, "Lifecycle step failed", Some(Box::new(err)))
    }
}

/// Result type for restore operations
pub type RestoreResult<T> = Result<T, RestoreError>;
