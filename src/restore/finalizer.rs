//! Finalizer
//!
//! The one step that destroys rollback data. The driver only reaches it after
//! every earlier phase succeeded.

use std::path::PathBuf;

use crate::archive::remove_path;
use crate::observability::{log_event_with_fields, Event};
use crate::predicates::is_rotated_name;
use crate::store::DocumentSession;

use super::errors::{RestoreError, RestoreResult};
use super::restorer::drop_if_exists;

/// Remove the run's work files, then drop every rotated collection.
///
/// Returns the rotated collections dropped, sorted.
pub async fn finalize(
    session: &dyn DocumentSession,
    rotated_prefix: &str,
    work_paths: &[PathBuf],
) -> RestoreResult<Vec<String>> {
    for path in work_paths {
        let target = path.clone();
        tokio::task::spawn_blocking(move || remove_path(&target))
            .await
            .map_err(|e| RestoreError::internal(format!("removal task failed: {}", e)))?
            .map_err(|e| {
                RestoreError::io_error(format!("Failed to remove {}: {}", path.display(), e))
            })?;
        let shown = path.display().to_string();
        log_event_with_fields(Event::WorkDirRemoved, &[("path", shown.as_str())]);
    }

    let mut rotated: Vec<String> = session
        .list_collection_names()
        .await?
        .into_iter()
        .filter(|name| is_rotated_name(name, rotated_prefix))
        .collect();
    rotated.sort();

    let mut dropped = Vec::new();
    for name in rotated {
        if drop_if_exists(session, &name).await? {
            log_event_with_fields(Event::RotatedCollectionDropped, &[("collection", name.as_str())]);
            dropped.push(name);
        }
    }
    Ok(dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MemoryStore};
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_removes_work_files_and_rotated_collections() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("dump.tar.gz");
        let extracted = temp.path().join("extracted");
        fs::write(&archive, b"x").unwrap();
        fs::create_dir_all(extracted.join("dump")).unwrap();

        let store = MemoryStore::new();
        for name in ["back_users", "back_settings", "users", "jobs"] {
            store.seed(name, vec![]);
        }

        let session = store.connect().await.unwrap();
        let dropped = finalize(
            session.as_ref(),
            "back_",
            &[archive.clone(), extracted.clone(), temp.path().join("never-created")],
        )
        .await
        .unwrap();

        assert_eq!(dropped, vec!["back_settings", "back_users"]);
        assert_eq!(store.collection_names(), vec!["jobs", "users"]);
        assert!(!archive.exists());
        assert!(!extracted.exists());
    }
}
