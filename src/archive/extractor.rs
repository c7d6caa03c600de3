//! Archive extraction
//!
//! - Create a clean extraction directory under the work directory
//! - Unpack the gzip-compressed tar into it
//! - Remove work artifacts on request

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use super::errors::{ArchiveError, ArchiveResult};

/// Name of the extraction directory inside the work directory
pub const EXTRACTED_DIR: &str = "extracted";

/// Create `<work_dir>/extracted`, removing leftovers from an earlier run.
pub fn create_extraction_dir(work_dir: &Path) -> ArchiveResult<PathBuf> {
    let dest = work_dir.join(EXTRACTED_DIR);

    if dest.exists() {
        fs::remove_dir_all(&dest).map_err(|e| {
            ArchiveError::io_error(
                format!("Failed to clean up existing extraction directory: {}", dest.display()),
                e,
            )
        })?;
    }

    fs::create_dir_all(&dest).map_err(|e| {
        ArchiveError::io_error(
            format!("Failed to create extraction directory: {}", dest.display()),
            e,
        )
    })?;

    Ok(dest)
}

/// Unpack a `.tar.gz` archive into `dest_dir`
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> ArchiveResult<()> {
    let file = File::open(archive_path).map_err(|e| {
        ArchiveError::io_error(
            format!("Failed to open backup archive: {}", archive_path.display()),
            e,
        )
    })?;

    let mut archive = Archive::new(GzDecoder::new(file));

    archive.unpack(dest_dir).map_err(|e| {
        ArchiveError::invalid_archive_with_source(
            format!("Failed to extract backup archive: {}", archive_path.display()),
            e,
        )
    })
}

/// Remove a file or directory tree. Missing paths are not an error.
pub fn remove_path(path: &Path) -> ArchiveResult<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.exists() {
        fs::remove_file(path)
    } else {
        return Ok(());
    };
    result.map_err(|e| ArchiveError::io_error_at_path(path, e))
}
