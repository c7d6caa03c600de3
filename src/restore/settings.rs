//! Settings Sanitizer

use mongodb::bson::doc;

use crate::observability::{log_event_with_fields, Event};
use crate::predicates::rotated_name;
use crate::store::DocumentSession;

use super::errors::{RestoreError, RestoreResult};
use super::options::SettingsPolicy;

/// What the sanitizer changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeSummary {
    /// Carry-forward keys found in rotated settings and copied
    pub carried: Vec<String>,
    /// Live rows deleted by key
    pub removed: u64,
    /// Connections whose validity flag was cleared
    pub invalidated: u64,
}

/// Carry forward, remove, invalidate.
///
/// A carry-forward key missing from the rotated settings is skipped, and
/// removing a key that is not present deletes nothing. Neither is an error.
pub async fn sanitize(
    session: &dyn DocumentSession,
    policy: &SettingsPolicy,
    rotated_prefix: &str,
) -> RestoreResult<SanitizeSummary> {
    let live = policy.collection.as_str();
    let rotated = rotated_name(live, rotated_prefix);
    let key_field = policy.key_field.as_str();
    let mut summary = SanitizeSummary::default();

    for key in &policy.carry_forward {
        let row = session
            .find_one(&rotated, doc! { key_field: key.as_str() })
            .await
            .map_err(|e| RestoreError::mutation(format!("Failed to read '{}'", rotated), e))?;
        let Some(mut row) = row else {
            log_event_with_fields(Event::SettingNotCarried, &[("key", key.as_str())]);
            continue;
        };
        row.remove("_id");

        session
            .delete_many(live, doc! { key_field: key.as_str() })
            .await
            .map_err(|e| RestoreError::mutation(format!("Failed to replace setting '{}'", key), e))?;
        session
            .insert_many(live, vec![row])
            .await
            .map_err(|e| RestoreError::mutation(format!("Failed to carry setting '{}'", key), e))?;

        log_event_with_fields(Event::SettingCarriedForward, &[("key", key.as_str())]);
        summary.carried.push(key.clone());
    }

    for key in &policy.remove {
        let deleted = session
            .delete_many(live, doc! { key_field: key.as_str() })
            .await
            .map_err(|e| RestoreError::mutation(format!("Failed to remove setting '{}'", key), e))?;
        let deleted_str = deleted.to_string();
        log_event_with_fields(
            Event::SettingRemoved,
            &[("deleted", deleted_str.as_str()), ("key", key.as_str())],
        );
        summary.removed += deleted;
    }

    let connections = policy.connections_collection.as_str();
    let validity_field = policy.validity_field.as_str();
    summary.invalidated = session
        .update_many(connections, doc! {}, doc! { "$set": { validity_field: false } })
        .await
        .map_err(|e| {
            RestoreError::mutation(format!("Failed to invalidate '{}'", connections), e)
        })?;
    let invalidated = summary.invalidated.to_string();
    log_event_with_fields(
        Event::ConnectionsInvalidated,
        &[("collection", connections), ("modified", invalidated.as_str())],
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MemoryStore};
    use mongodb::bson::Document;

    fn rows_with_key(store: &MemoryStore, key: &str) -> Vec<Document> {
        store
            .documents("settings")
            .unwrap_or_default()
            .into_iter()
            .filter(|d| d.get_str("settingKey").ok() == Some(key))
            .collect()
    }

    #[tokio::test]
    async fn test_carries_forward_removes_and_invalidates() {
        let store = MemoryStore::new();
        store.seed(
            "back_settings",
            vec![doc! { "_id": 9, "settingKey": "templateUrl", "value": "https://live/t" }],
        );
        store.seed(
            "settings",
            vec![
                doc! { "_id": 1, "settingKey": "templateUrl", "value": "https://dump/t" },
                doc! { "_id": 2, "settingKey": "sslDomain", "value": "dump.example.com" },
                doc! { "_id": 3, "settingKey": "locale", "value": "en" },
            ],
        );
        store.seed(
            "externalaccounts",
            vec![doc! { "isValid": true }, doc! { "isValid": true }, doc! { "isValid": false }],
        );

        let session = store.connect().await.unwrap();
        let summary = sanitize(session.as_ref(), &SettingsPolicy::default(), "back_")
            .await
            .unwrap();

        assert_eq!(summary.carried, vec!["templateUrl"]);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.invalidated, 2);

        let template = rows_with_key(&store, "templateUrl");
        assert_eq!(template.len(), 1);
        assert_eq!(template[0].get_str("value").unwrap(), "https://live/t");
        assert!(rows_with_key(&store, "sslDomain").is_empty());
        assert_eq!(rows_with_key(&store, "locale").len(), 1);
        assert!(store
            .documents("externalaccounts")
            .unwrap()
            .iter()
            .all(|d| d.get_bool("isValid").ok() == Some(false)));
    }

    #[tokio::test]
    async fn test_absent_rows_are_not_errors() {
        let store = MemoryStore::new();
        store.seed("settings", vec![doc! { "settingKey": "locale", "value": "en" }]);

        let session = store.connect().await.unwrap();
        let summary = sanitize(session.as_ref(), &SettingsPolicy::default(), "back_")
            .await
            .unwrap();

        assert!(summary.carried.is_empty());
        assert_eq!(summary.removed, 0);
        assert!(rows_with_key(&store, "templateUrl").is_empty());
        assert_eq!(store.documents("settings").unwrap().len(), 1);
    }
}
