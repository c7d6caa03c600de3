//! Archive Reader
//!
//! Pure lookup over an extracted archive:
//!
//! ```text
//! extracted/
//! ├── dump/
//! │   └── <database>/          (or the .bson files directly under dump/)
//! │       ├── organizations.bson
//! │       └── settings.bson
//! └── s3/
//!     └── org::<tenant>/       (organization-scoped asset directory)
//!         └── policy.pdf
//! ```

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use mongodb::bson::Document;

use crate::predicates::{is_dump_file_name, is_org_scoped_dir};

use super::errors::{ArchiveError, ArchiveResult};

/// Directory holding collection dumps inside the extracted archive
pub const DUMP_DIR: &str = "dump";

/// One collection dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFile {
    /// Collection the dump reconstitutes (file stem)
    pub collection: String,
    pub path: PathBuf,
}

impl DumpFile {
    /// Decode the concatenated BSON documents in this dump, in file order.
    pub fn read_documents(&self) -> ArchiveResult<Vec<Document>> {
        let bytes = fs::read(&self.path).map_err(|e| ArchiveError::io_error_at_path(&self.path, e))?;
        decode_documents(&bytes).map_err(|reason| {
            ArchiveError::decode_failed(format!("{}: {}", self.path.display(), reason))
        })
    }
}

fn decode_documents(bytes: &[u8]) -> Result<Vec<Document>, String> {
    let mut cursor = Cursor::new(bytes);
    let mut documents = Vec::new();
    while (cursor.position() as usize) < bytes.len() {
        let offset = cursor.position();
        let document = Document::from_reader(&mut cursor)
            .map_err(|e| format!("document at byte {}: {}", offset, e))?;
        documents.push(document);
    }
    Ok(documents)
}

/// Layout of an extracted archive
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    root: PathBuf,
    dump_dir: PathBuf,
}

impl ArchiveLayout {
    /// Locate the dump directory under `root`.
    ///
    /// `dump/` itself is used if it contains dump files; otherwise it must hold
    /// exactly one database subdirectory.
    pub fn open(root: &Path) -> ArchiveResult<Self> {
        let dump_root = root.join(DUMP_DIR);
        if !dump_root.is_dir() {
            return Err(ArchiveError::invalid_archive(format!(
                "Missing {}/ directory in {}",
                DUMP_DIR,
                root.display()
            )));
        }

        let entries = sorted_entries(&dump_root)?;
        let has_dumps = entries
            .iter()
            .any(|p| p.is_file() && file_name(p).map(is_dump_file_name).unwrap_or(false));

        let dump_dir = if has_dumps {
            dump_root
        } else {
            let mut databases: Vec<PathBuf> = entries.into_iter().filter(|p| p.is_dir()).collect();
            match databases.len() {
                1 => databases.remove(0),
                0 => {
                    return Err(ArchiveError::invalid_archive(format!(
                        "No dump files under {}",
                        dump_root.display()
                    )))
                }
                n => {
                    return Err(ArchiveError::invalid_archive(format!(
                        "Ambiguous dump: {} database directories under {}",
                        n,
                        dump_root.display()
                    )))
                }
            }
        };

        Ok(Self {
            root: root.to_path_buf(),
            dump_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dump_dir(&self) -> &Path {
        &self.dump_dir
    }

    /// Every dump file, sorted by collection name
    pub fn dump_files(&self) -> ArchiveResult<Vec<DumpFile>> {
        let mut dumps = Vec::new();
        for path in sorted_entries(&self.dump_dir)? {
            let Some(name) = file_name(&path) else { continue };
            if !path.is_file() || !is_dump_file_name(name) {
                continue;
            }
            let collection = name.trim_end_matches(".bson").to_string();
            dumps.push(DumpFile { collection, path });
        }
        Ok(dumps)
    }

    /// Asset payload files in the organization-scoped directory under
    /// `<root>/<assets_dir>/`. Empty if the assets directory or the
    /// organization-scoped subdirectory is absent.
    pub fn asset_files(&self, assets_dir: &str, org_marker: &str) -> ArchiveResult<Vec<PathBuf>> {
        let assets_root = self.root.join(assets_dir);
        if !assets_root.is_dir() {
            return Ok(Vec::new());
        }

        let org_dir = sorted_entries(&assets_root)?.into_iter().find(|p| {
            p.is_dir() && file_name(p).map(|n| is_org_scoped_dir(n, org_marker)).unwrap_or(false)
        });

        match org_dir {
            Some(dir) => Ok(sorted_entries(&dir)?
                .into_iter()
                .filter(|p| p.is_file())
                .collect()),
            None => Ok(Vec::new()),
        }
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn sorted_entries(dir: &Path) -> ArchiveResult<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| ArchiveError::io_error_at_path(dir, e))? {
        let entry = entry.map_err(|e| ArchiveError::io_error_at_path(dir, e))?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}
