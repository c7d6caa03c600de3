//! Archive subsystem
//!
//! Locating, fetching, unpacking and reading a tenant backup archive.
//! Nothing here touches the live deployment.

mod errors;
mod extractor;
mod locator;
mod reader;
mod source;

pub use errors::{ArchiveError, ArchiveErrorCode, ArchiveResult};
pub use extractor::{create_extraction_dir, extract_archive, remove_path, EXTRACTED_DIR};
pub use locator::ArchiveLocator;
pub use reader::{ArchiveLayout, DumpFile, DUMP_DIR};
pub use source::{ArchiveSource, DirectoryArchiveSource, S3ArchiveSource};
