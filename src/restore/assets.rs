//! Asset Relocator
//!
//! Two sub-steps, in order: re-key asset references written under another
//! tenant, then upload the archive's asset payloads under the current tenant.

use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use mongodb::bson::{doc, Bson, Document};
use sha2::{Digest, Sha256};

use crate::objects::{ObjectStore, ObjectStoreError};
use crate::observability::{log_event_with_fields, Event};
use crate::predicates::{is_foreign_tenant_key, is_tenant_scoped_key, tenant_scoped_key};
use crate::store::DocumentSession;

use super::errors::{RestoreError, RestoreResult};

/// Outcome of the upload sub-step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Keys uploaded, sorted
    pub uploaded: Vec<String>,
    /// Files that failed to upload, sorted
    pub failed: Vec<String>,
}

/// Point every foreign-tenant reference at `<tenant_id>/<basename>` in `bucket`.
///
/// References already scoped to `tenant_id` keep their key and only have
/// `bucket` set when it differs. Keys not of the `<tenant>/<file>` form are
/// left untouched. Returns the number of references updated.
pub async fn rewrite_references(
    session: &dyn DocumentSession,
    files_collection: &str,
    tenant_id: &str,
    bucket: &str,
) -> RestoreResult<u64> {
    let references = session
        .find(files_collection, doc! {})
        .await
        .map_err(|e| {
            RestoreError::mutation(format!("Failed to read '{}'", files_collection), e)
        })?;

    let mut rewritten = 0;
    for reference in references {
        let Some(key) = reference_key(&reference) else { continue };
        let (new_key, set) = if is_foreign_tenant_key(key, tenant_id) {
            let basename = key.rsplit('/').next().unwrap_or(key);
            let new_key = tenant_scoped_key(tenant_id, basename);
            let set = doc! { "key": new_key.as_str(), "bucket": bucket };
            (new_key, set)
        } else if is_tenant_scoped_key(key, tenant_id)
            && reference.get_str("bucket").ok() != Some(bucket)
        {
            (key.to_string(), doc! { "bucket": bucket })
        } else {
            continue;
        };

        let filter = match reference.get("_id") {
            Some(id) => doc! { "_id": id.clone() },
            None => doc! { "key": key },
        };
        session
            .update_many(files_collection, filter, doc! { "$set": set })
            .await
            .map_err(|e| {
                RestoreError::mutation(format!("Failed to rewrite reference '{}'", key), e)
            })?;

        log_event_with_fields(
            Event::AssetReferenceRewritten,
            &[("from", key), ("to", new_key.as_str()), ("bucket", bucket)],
        );
        rewritten += 1;
    }
    Ok(rewritten)
}

/// Upload each payload to `bucket` under `<tenant_id>/<basename>`, at most
/// `concurrency` at a time.
///
/// A failed upload is logged and skipped. Returns once every upload resolved.
pub async fn upload_assets(
    store: &dyn ObjectStore,
    files: &[PathBuf],
    tenant_id: &str,
    bucket: &str,
    concurrency: usize,
) -> UploadSummary {
    let results: Vec<(String, Result<String, ObjectStoreError>)> = stream::iter(files)
        .map(move |path| async move {
            let label = path.display().to_string();
            (label, upload_one(store, path, tenant_id, bucket).await)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut summary = UploadSummary::default();
    for (label, result) in results {
        match result {
            Ok(key) => summary.uploaded.push(key),
            Err(err) => {
                let reason = err.to_string();
                log_event_with_fields(
                    Event::AssetUploadFailed,
                    &[("file", label.as_str()), ("reason", reason.as_str())],
                );
                summary.failed.push(label);
            }
        }
    }
    summary.uploaded.sort();
    summary.failed.sort();
    summary
}

async fn upload_one(
    store: &dyn ObjectStore,
    path: &Path,
    tenant_id: &str,
    bucket: &str,
) -> Result<String, ObjectStoreError> {
    let basename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ObjectStoreError::InvalidKey(path.display().to_string()))?;
    let key = tenant_scoped_key(tenant_id, basename);

    let body = tokio::fs::read(path)
        .await
        .map_err(|e| ObjectStoreError::IoError(format!("{}: {}", path.display(), e)))?;
    let size = body.len().to_string();
    let checksum = checksum(&body);

    store.upload(bucket, &key, body).await?;
    log_event_with_fields(
        Event::AssetUploaded,
        &[
            ("bucket", bucket),
            ("key", key.as_str()),
            ("sha256", checksum.as_str()),
            ("size", size.as_str()),
        ],
    );
    Ok(key)
}

fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn reference_key(reference: &Document) -> Option<&str> {
    match reference.get("key") {
        Some(Bson::String(key)) => Some(key.as_str()),
        _ => None,
    }
}
