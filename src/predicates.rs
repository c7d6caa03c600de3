//! Named predicates for the "is this the thing we expect" checks of a restore.
//!
//! Each predicate states its exact condition. Nothing else in the crate matches
//! names, keys or messages by pattern.

use crate::store::StoreError;

/// Default prefix marking a collection as pre-restore snapshot data.
pub const DEFAULT_ROTATED_PREFIX: &str = "back_";

/// True iff `name` starts with `prefix` and has at least one character after it.
pub fn is_rotated_name(name: &str, prefix: &str) -> bool {
    name.len() > prefix.len() && name.starts_with(prefix)
}

/// Rotated form of a live collection name: `prefix` + `name`.
pub fn rotated_name(name: &str, prefix: &str) -> String {
    format!("{}{}", prefix, name)
}

/// True iff the store reported that the target namespace does not exist.
pub fn is_namespace_absent(err: &StoreError) -> bool {
    err.is_namespace_absent()
}

/// True iff a directory name marks the organization-scoped asset directory:
/// it contains `marker` (e.g. `org::`) as a substring. An empty marker never matches.
pub fn is_org_scoped_dir(name: &str, marker: &str) -> bool {
    !marker.is_empty() && name.contains(marker)
}

/// True iff `name` is a collection dump file: extension `bson`, non-empty stem,
/// and not a `system.` collection.
pub fn is_dump_file_name(name: &str) -> bool {
    match name.strip_suffix(".bson") {
        Some(stem) => !stem.is_empty() && !stem.starts_with("system."),
        None => false,
    }
}

/// True iff `key` is exactly `<segment>/<file>` with both parts non-empty and
/// `<segment>` different from `tenant_id`: an asset written under another tenant.
pub fn is_foreign_tenant_key(key: &str, tenant_id: &str) -> bool {
    let mut parts = key.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(file), None) => {
            !owner.is_empty() && !file.is_empty() && owner != tenant_id
        }
        _ => false,
    }
}

/// True iff `key` is exactly `<tenant_id>/<file>` with a non-empty `<file>`.
pub fn is_tenant_scoped_key(key: &str, tenant_id: &str) -> bool {
    match key.split_once('/') {
        Some((owner, file)) => owner == tenant_id && !file.is_empty() && !file.contains('/'),
        None => false,
    }
}

/// Object key for an asset owned by `tenant_id`: `<tenant_id>/<basename>`.
pub fn tenant_scoped_key(tenant_id: &str, basename: &str) -> String {
    format!("{}/{}", tenant_id, basename)
}
