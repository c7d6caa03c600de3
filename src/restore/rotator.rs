//! Backup Rotator
//!
//! Renames every live collection into its rotated form so the pre-restore data
//! stays recoverable until the run finalizes.

use std::collections::BTreeSet;

use crate::observability::{log_event_with_fields, Event};
use crate::predicates::{is_rotated_name, rotated_name};
use crate::store::DocumentSession;

use super::errors::{RestoreError, RestoreResult};

/// Rename each collection that is neither rotated nor in `exclude`.
///
/// Returns the collections renamed, sorted. A second call finds nothing to do.
/// The first rename failure aborts the phase; renames already made stay.
pub async fn rotate(
    session: &dyn DocumentSession,
    prefix: &str,
    exclude: &BTreeSet<String>,
) -> RestoreResult<Vec<String>> {
    let mut names = session.list_collection_names().await?;
    names.sort();

    let mut rotated = Vec::new();
    for name in names {
        if is_rotated_name(&name, prefix) || exclude.contains(&name) {
            continue;
        }
        let target = rotated_name(&name, prefix);
        session
            .rename_collection(&name, &target)
            .await
            .map_err(|e| RestoreError::mutation(format!("Failed to rotate '{}'", name), e))?;
        log_event_with_fields(
            Event::CollectionRotated,
            &[("from", name.as_str()), ("to", target.as_str())],
        );
        rotated.push(name);
    }
    Ok(rotated)
}
