//! Identity Merger
//!
//! Captures the Identity Field Set, the tenant identifier and the record id from
//! the pre-restore Organization Record, and writes the identity back over the
//! dump's values once the restore has run. Every other field keeps the dump's
//! value. Restored documents that point at an organization are re-parented to
//! the live record.

use std::collections::BTreeMap;

use mongodb::bson::{doc, Bson, Document};

use crate::observability::{log_event_with_fields, Event};
use crate::store::{DocumentSession, StoreResult};

use super::errors::{RestoreError, RestoreResult};
use super::options::IdentityField;

/// Identity values recorded before the restore began
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedIdentity {
    /// One entry per configured field; `None` when the live record lacked it
    pub values: Vec<(IdentityField, Option<Bson>)>,
    /// Tenant identifier of the live record
    pub tenant_id: String,
    /// `_id` of the live record
    pub organization_id: Option<Bson>,
}

impl CapturedIdentity {
    pub fn get(&self, field: &IdentityField) -> Option<&Bson> {
        self.values
            .iter()
            .find(|(f, _)| f == field)
            .and_then(|(_, value)| value.as_ref())
    }

    pub fn captured_count(&self) -> usize {
        self.values.iter().filter(|(_, v)| v.is_some()).count()
    }
}

/// The single Organization Record. Zero or several records is a precondition
/// failure.
pub async fn find_organization(
    session: &dyn DocumentSession,
    collection: &str,
) -> RestoreResult<Document> {
    let mut records = session
        .find(collection, doc! {})
        .await
        .map_err(|e| {
            RestoreError::precondition_with_source(
                format!("Failed to read '{}'", collection),
                e,
            )
        })?;
    match records.len() {
        1 => Ok(records.remove(0)),
        0 => Err(RestoreError::precondition(format!(
            "No organization record in '{}'",
            collection
        ))),
        n => Err(RestoreError::precondition(format!(
            "Ambiguous organization record: {} documents in '{}'",
            n, collection
        ))),
    }
}

/// Record the Identity Field Set and tenant identifier from `organization`
pub fn capture(
    organization: &Document,
    fields: &[IdentityField],
    tenant_id_field: &str,
) -> RestoreResult<CapturedIdentity> {
    let tenant_id = tenant_id(organization, tenant_id_field)?;
    let values = fields
        .iter()
        .map(|field| {
            let value = organization.get(&field.field).cloned();
            if value.is_none() {
                let path = field.path();
                log_event_with_fields(Event::IdentityFieldMissing, &[("field", path.as_str())]);
            }
            (field.clone(), value)
        })
        .collect::<Vec<_>>();

    let captured = CapturedIdentity {
        values,
        tenant_id,
        organization_id: organization.get("_id").cloned(),
    };
    let count = captured.captured_count().to_string();
    log_event_with_fields(
        Event::IdentityCaptured,
        &[("fields", count.as_str()), ("tenant_id", captured.tenant_id.as_str())],
    );
    Ok(captured)
}

/// Write captured values back onto the restored data.
///
/// The post-restore Organization Record must exist exactly once. Each captured
/// field is `$set` on every document of its collection. Fields that were
/// absent before the restore are left as the dump has them.
pub async fn merge_identity(
    session: &dyn DocumentSession,
    organizations_collection: &str,
    captured: &CapturedIdentity,
) -> RestoreResult<BTreeMap<String, u64>> {
    find_organization(session, organizations_collection).await?;

    let mut modified: BTreeMap<String, u64> = BTreeMap::new();
    for (field, value) in &captured.values {
        let Some(value) = value else { continue };
        let mut set = Document::new();
        set.insert(field.field.clone(), value.clone());

        let count = session
            .update_many(&field.collection, doc! {}, doc! { "$set": set })
            .await
            .map_err(|e| {
                RestoreError::mutation(format!("Failed to merge '{}'", field.path()), e)
            })?;
        *modified.entry(field.collection.clone()).or_default() += count;
    }

    for (collection, count) in &modified {
        let count = count.to_string();
        log_event_with_fields(
            Event::IdentityMerged,
            &[("collection", collection.as_str()), ("modified", count.as_str())],
        );
    }
    Ok(modified)
}

/// Move the restored Organization Record onto the live `_id` and point every
/// reference in `targets` at it.
///
/// Only documents that carry the target field are updated. Without a live
/// `_id` nothing is re-parented.
pub async fn reparent(
    session: &dyn DocumentSession,
    organizations_collection: &str,
    targets: &[IdentityField],
    captured: &CapturedIdentity,
) -> RestoreResult<BTreeMap<String, u64>> {
    let mut modified: BTreeMap<String, u64> = BTreeMap::new();
    let Some(organization_id) = &captured.organization_id else {
        log_event_with_fields(Event::IdentityFieldMissing, &[("field", "_id")]);
        return Ok(modified);
    };

    let mut organization = find_organization(session, organizations_collection).await?;
    if organization.get("_id") != Some(organization_id) {
        let mut filter = Document::new();
        if let Some(restored_id) = organization.get("_id") {
            filter.insert("_id", restored_id.clone());
        }
        organization.insert("_id", organization_id.clone());
        let rekey: StoreResult<u64> = async {
            session.delete_many(organizations_collection, filter).await?;
            session
                .insert_many(organizations_collection, vec![organization])
                .await
        }
        .await;
        let count = rekey.map_err(|e| {
            RestoreError::mutation(
                format!("Failed to re-key '{}'", organizations_collection),
                e,
            )
        })?;
        let path = format!("{}._id", organizations_collection);
        let rendered = count.to_string();
        log_event_with_fields(
            Event::OrganizationReparented,
            &[("field", path.as_str()), ("modified", rendered.as_str())],
        );
        modified.insert(organizations_collection.to_string(), count);
    }

    for target in targets {
        let mut filter = Document::new();
        filter.insert(target.field.clone(), doc! { "$exists": true });
        let mut set = Document::new();
        set.insert(target.field.clone(), organization_id.clone());

        let count = session
            .update_many(&target.collection, filter, doc! { "$set": set })
            .await
            .map_err(|e| {
                RestoreError::mutation(format!("Failed to re-parent '{}'", target.path()), e)
            })?;
        let path = target.path();
        let rendered = count.to_string();
        log_event_with_fields(
            Event::OrganizationReparented,
            &[("field", path.as_str()), ("modified", rendered.as_str())],
        );
        *modified.entry(target.collection.clone()).or_default() += count;
    }
    Ok(modified)
}

/// Tenant identifier of an organization record: `field` rendered as a string,
/// ObjectIds as hex.
pub fn tenant_id(organization: &Document, field: &str) -> RestoreResult<String> {
    let id = match organization.get(field) {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(s)) if !s.is_empty() => s.clone(),
        Some(Bson::Int32(n)) => n.to_string(),
        Some(Bson::Int64(n)) => n.to_string(),
        Some(other) => {
            return Err(RestoreError::precondition(format!(
                "Tenant id field '{}' has unusable value {}",
                field, other
            )))
        }
        None => {
            return Err(RestoreError::precondition(format!(
                "Organization record has no '{}'",
                field
            )))
        }
    };
    if id.contains('/') {
        return Err(RestoreError::precondition(format!(
            "Tenant id '{}' contains '/'",
            id
        )));
    }
    Ok(id)
}
