//! Archive-specific error types
//!
//! Archive errors follow the crate's error model:
//! - Stable string codes in CATEGORY_NAME form
//! - Optional underlying cause
//! - No silent failures

use std::fmt;
use std::io;

/// Archive error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveErrorCode {
    /// URL does not match the backup bucket convention
    InvalidLocator,
    /// Download from the archive store failed
    DownloadFailed,
    /// Archive could not be unpacked or lacks required structure
    InvalidArchive,
    /// A dump file could not be decoded
    DecodeFailed,
    /// Local filesystem failure
    Io,
}

impl ArchiveErrorCode {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveErrorCode::InvalidLocator => "ARCHIVE_INVALID_LOCATOR",
            ArchiveErrorCode::DownloadFailed => "ARCHIVE_DOWNLOAD_FAILED",
            ArchiveErrorCode::InvalidArchive => "ARCHIVE_INVALID",
            ArchiveErrorCode::DecodeFailed => "ARCHIVE_DECODE_FAILED",
            ArchiveErrorCode::Io => "ARCHIVE_IO",
        }
    }
}

impl fmt::Display for ArchiveErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Archive error with context
#[derive(Debug)]
pub struct ArchiveError {
    code: ArchiveErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl ArchiveError {
    fn new(code: ArchiveErrorCode, message: impl Into<String>, source: Option<io::Error>) -> Self {
        Self {
            code,
            message: message.into(),
            source,
        }
    }

    pub fn invalid_locator(message: impl Into<String>) -> Self {
        Self::new(ArchiveErrorCode::InvalidLocator, message, None)
    }

    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::new(ArchiveErrorCode::DownloadFailed, message, None)
    }

    pub fn invalid_archive(message: impl Into<String>) -> Self {
        Self::new(ArchiveErrorCode::InvalidArchive, message, None)
    }

    pub fn invalid_archive_with_source(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(ArchiveErrorCode::InvalidArchive, message, Some(source))
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::new(ArchiveErrorCode::DecodeFailed, message, None)
    }

    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(ArchiveErrorCode::Io, message, Some(source))
    }

    /// I/O error at a specific path
    pub fn io_error_at_path(path: &std::path::Path, source: io::Error) -> Self {
        Self::io_error(format!("I/O error at {}", path.display()), source)
    }

    pub fn code(&self) -> ArchiveErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;
