//! Collection Restorer
//!
//! Clears the rotated baseline, then loads each dump file into the live
//! collection of the same name. Restore is a full replace per collection.

use std::collections::{BTreeMap, BTreeSet};

use crate::archive::DumpFile;
use crate::observability::{log_event_with_fields, Event};
use crate::predicates::{is_namespace_absent, is_rotated_name, rotated_name};
use crate::store::DocumentSession;
use mongodb::bson::Document;

use super::errors::{RestoreError, RestoreResult};

const INSERT_BATCH: usize = 1000;

/// Drop `name`, treating an absent namespace as success.
///
/// Returns whether a collection was actually dropped.
pub async fn drop_if_exists(session: &dyn DocumentSession, name: &str) -> RestoreResult<bool> {
    match session.drop_collection(name).await {
        Ok(()) => Ok(true),
        Err(err) if is_namespace_absent(&err) => {
            log_event_with_fields(Event::NamespaceAbsent, &[("collection", name)]);
            Ok(false)
        }
        Err(err) => Err(RestoreError::mutation(
            format!("Failed to drop '{}'", name),
            err,
        )),
    }
}

/// Drop every rotated collection already present, plus the rotated name of
/// every dump, so rotation starts from a clean baseline.
pub async fn clear_rotated(
    session: &dyn DocumentSession,
    prefix: &str,
    dumps: &[DumpFile],
) -> RestoreResult<Vec<String>> {
    let mut targets: BTreeSet<String> = session
        .list_collection_names()
        .await?
        .into_iter()
        .filter(|name| is_rotated_name(name, prefix))
        .collect();
    targets.extend(dumps.iter().map(|d| rotated_name(&d.collection, prefix)));

    let mut dropped = Vec::new();
    for name in targets {
        if drop_if_exists(session, &name).await? {
            log_event_with_fields(Event::RotatedCollectionDropped, &[("collection", name.as_str())]);
            dropped.push(name);
        }
    }
    Ok(dropped)
}

/// Load every dump into its live collection, returning documents per collection.
pub async fn restore(
    session: &dyn DocumentSession,
    dumps: &[DumpFile],
) -> RestoreResult<BTreeMap<String, u64>> {
    let mut restored = BTreeMap::new();
    for dump in dumps {
        let documents = read_dump(dump).await?;
        let name = dump.collection.as_str();

        // Excluded collections were not rotated away.
        drop_if_exists(session, name).await?;

        let count = documents.len() as u64;
        if documents.is_empty() {
            session
                .create_collection(name)
                .await
                .map_err(|e| RestoreError::mutation(format!("Failed to create '{}'", name), e))?;
        } else {
            let mut batch = Vec::with_capacity(INSERT_BATCH.min(documents.len()));
            for document in documents {
                batch.push(document);
                if batch.len() == INSERT_BATCH {
                    insert(session, name, std::mem::take(&mut batch)).await?;
                }
            }
            if !batch.is_empty() {
                insert(session, name, batch).await?;
            }
        }

        let count_str = count.to_string();
        log_event_with_fields(
            Event::CollectionRestored,
            &[("collection", name), ("documents", count_str.as_str())],
        );
        restored.insert(name.to_string(), count);
    }
    Ok(restored)
}

async fn read_dump(dump: &DumpFile) -> RestoreResult<Vec<Document>> {
    let owned = dump.clone();
    tokio::task::spawn_blocking(move || owned.read_documents())
        .await
        .map_err(|e| RestoreError::internal(format!("dump reader task failed: {}", e)))?
        .map_err(|e| {
            RestoreError::mutation(format!("Failed to decode dump '{}'", dump.collection), e)
        })
}

async fn insert(
    session: &dyn DocumentSession,
    collection: &str,
    batch: Vec<Document>,
) -> RestoreResult<()> {
    session
        .insert_many(collection, batch)
        .await
        .map(|_| ())
        .map_err(|e| RestoreError::mutation(format!("Failed to insert into '{}'", collection), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restore::errors::RestoreErrorCode;
    use crate::store::{DocumentStore, MemoryStore, StoreOp};
    use mongodb::bson::doc;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn dump(dir: &Path, collection: &str, documents: &[Document]) -> DumpFile {
        let path = dir.join(format!("{}.bson", collection));
        let mut bytes = Vec::new();
        for document in documents {
            document.to_writer(&mut bytes).unwrap();
        }
        fs::write(&path, bytes).unwrap();
        DumpFile {
            collection: collection.to_string(),
            path,
        }
    }

    #[tokio::test]
    async fn test_clear_rotated_treats_absent_as_success() {
        let temp = TempDir::new().unwrap();
        let dumps = vec![dump(temp.path(), "settings", &[])];
        let store = MemoryStore::new();
        store.seed("back_users", vec![]);
        store.seed("users", vec![]);

        let session = store.connect().await.unwrap();
        let dropped = clear_rotated(session.as_ref(), "back_", &dumps).await.unwrap();

        assert_eq!(dropped, vec!["back_users"]);
        assert_eq!(store.collection_names(), vec!["users"]);
        let drops: Vec<String> = store
            .journal()
            .into_iter()
            .filter(|c| c.op == StoreOp::Drop)
            .map(|c| c.collection)
            .collect();
        assert_eq!(drops, vec!["back_settings", "back_users"]);
    }

    #[tokio::test]
    async fn test_drop_failure_other_than_absent_is_fatal() {
        let store = MemoryStore::new();
        store.seed("back_users", vec![]);
        store.fail_on(StoreOp::Drop, "back_users");

        let session = store.connect().await.unwrap();
        let err = clear_rotated(session.as_ref(), "back_", &[]).await.unwrap_err();
        assert_eq!(err.code(), RestoreErrorCode::RestoreMutation);
    }

    #[tokio::test]
    async fn test_restore_replaces_each_dumped_collection() {
        let temp = TempDir::new().unwrap();
        let dumps = vec![
            dump(temp.path(), "jobs", &[doc! { "job": "from-dump" }]),
            dump(temp.path(), "settings", &[doc! { "settingKey": "a" }, doc! { "settingKey": "b" }]),
            dump(temp.path(), "tags", &[]),
        ];
        let store = MemoryStore::new();
        store.seed("jobs", vec![doc! { "job": "live" }]);
        store.seed("back_settings", vec![doc! { "settingKey": "old" }]);

        let session = store.connect().await.unwrap();
        let restored = restore(session.as_ref(), &dumps).await.unwrap();

        assert_eq!(restored.get("settings"), Some(&2));
        assert_eq!(restored.get("tags"), Some(&0));
        assert_eq!(store.documents("jobs").unwrap(), vec![doc! { "job": "from-dump" }]);
        assert_eq!(store.documents("tags").unwrap(), Vec::<Document>::new());
        assert_eq!(store.documents("back_settings").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_dump_is_fatal() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("users.bson");
        fs::write(&path, [0x10, 0x00, 0x00]).unwrap();
        let dumps = vec![DumpFile {
            collection: "users".into(),
            path,
        }];

        let store = MemoryStore::new();
        let session = store.connect().await.unwrap();
        let err = restore(session.as_ref(), &dumps).await.unwrap_err();
        assert!(err.message().contains("users"));
        assert!(store.documents("users").is_none());
    }
}
