//! # In-Memory Backend
//!
//! A process-local document store used for dry runs against fixtures and as the
//! substitute store in tests. Every call is journaled so callers can assert on
//! ordering, and individual operations can be made to fail.
//!
//! Filters support top-level equality only; updates support `$set` only.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};

use super::errors::{StoreError, StoreResult};
use super::session::{DocumentSession, DocumentStore};

/// Operation kinds recorded in the journal and targeted by failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Connect,
    List,
    Rename,
    Drop,
    Create,
    FindOne,
    Find,
    Insert,
    Update,
    Delete,
    Close,
}

/// One journaled call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub collection: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: BTreeMap<String, Vec<Document>>,
    journal: Vec<StoreCall>,
    open_sessions: usize,
    failures: Vec<StoreCall>,
}

/// In-memory document store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Internal("Lock poisoned".into()))
    }

    /// Replace the contents of a collection, creating it if needed
    pub fn seed(&self, collection: &str, documents: Vec<Document>) {
        if let Ok(mut state) = self.lock() {
            state.collections.insert(collection.to_string(), documents);
        }
    }

    /// Snapshot of a collection's documents, `None` if it does not exist
    pub fn documents(&self, collection: &str) -> Option<Vec<Document>> {
        self.lock().ok()?.collections.get(collection).cloned()
    }

    /// Names of existing collections, sorted
    pub fn collection_names(&self) -> Vec<String> {
        self.lock()
            .map(|s| s.collections.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every call made so far, in order
    pub fn journal(&self) -> Vec<StoreCall> {
        self.lock().map(|s| s.journal.clone()).unwrap_or_default()
    }

    /// Sessions opened and not yet closed
    pub fn open_sessions(&self) -> usize {
        self.lock().map(|s| s.open_sessions).unwrap_or_default()
    }

    /// Make every future `op` against `collection` fail. An empty collection
    /// name matches every collection.
    pub fn fail_on(&self, op: StoreOp, collection: &str) {
        if let Ok(mut state) = self.lock() {
            state.failures.push(StoreCall {
                op,
                collection: collection.to_string(),
            });
        }
    }

    fn record(&self, op: StoreOp, collection: &str) -> StoreResult<MutexGuard<'_, MemoryState>> {
        let mut state = self.lock()?;
        state.journal.push(StoreCall {
            op,
            collection: collection.to_string(),
        });
        let injected = state
            .failures
            .iter()
            .any(|f| f.op == op && (f.collection.is_empty() || f.collection == collection));
        if injected {
            return Err(StoreError::Command(format!(
                "injected failure: {:?} on {}",
                op, collection
            )));
        }
        Ok(state)
    }
}

/// Equality per field, plus `{"$exists": bool}`
fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| match expected {
        Bson::Document(op) if op.contains_key("$exists") => {
            let wanted = !matches!(op.get("$exists"), Some(Bson::Boolean(false)));
            document.contains_key(key) == wanted
        }
        _ => document.get(key) == Some(expected),
    })
}

fn apply_set(document: &mut Document, set: &Document) -> bool {
    let mut changed = false;
    for (key, value) in set {
        if document.get(key) != Some(value) {
            document.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

fn parse_update(update: &Document) -> StoreResult<&Document> {
    if update.len() != 1 {
        return Err(StoreError::Unsupported(
            "update must contain exactly one operator".into(),
        ));
    }
    match update.get("$set") {
        Some(Bson::Document(set)) => Ok(set),
        _ => Err(StoreError::Unsupported(format!(
            "only $set is supported, got {:?}",
            update.keys().collect::<Vec<_>>()
        ))),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn connect(&self) -> StoreResult<Box<dyn DocumentSession>> {
        let mut state = self.record(StoreOp::Connect, "")?;
        state.open_sessions += 1;
        drop(state);
        Ok(Box::new(MemorySession {
            store: self.clone(),
        }))
    }
}

struct MemorySession {
    store: MemoryStore,
}

#[async_trait]
impl DocumentSession for MemorySession {
    async fn list_collection_names(&self) -> StoreResult<Vec<String>> {
        let state = self.store.record(StoreOp::List, "")?;
        Ok(state.collections.keys().cloned().collect())
    }

    async fn rename_collection(&self, from: &str, to: &str) -> StoreResult<()> {
        let mut state = self.store.record(StoreOp::Rename, from)?;
        if state.collections.contains_key(to) {
            return Err(StoreError::NamespaceExists(to.to_string()));
        }
        let documents = state
            .collections
            .remove(from)
            .ok_or_else(|| StoreError::NamespaceNotFound(from.to_string()))?;
        state.collections.insert(to.to_string(), documents);
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        let mut state = self.store.record(StoreOp::Drop, name)?;
        state
            .collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NamespaceNotFound("ns not found".to_string()))
    }

    async fn create_collection(&self, name: &str) -> StoreResult<()> {
        let mut state = self.store.record(StoreOp::Create, name)?;
        if state.collections.contains_key(name) {
            return Err(StoreError::NamespaceExists(name.to_string()));
        }
        state.collections.insert(name.to_string(), Vec::new());
        Ok(())
    }

    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>> {
        let state = self.store.record(StoreOp::FindOne, collection)?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches(d, &filter)).cloned()))
    }

    async fn find(&self, collection: &str, filter: Document) -> StoreResult<Vec<Document>> {
        let state = self.store.record(StoreOp::Find, collection)?;
        Ok(state
            .collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| matches(d, &filter)).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> StoreResult<u64> {
        let mut state = self.store.record(StoreOp::Insert, collection)?;
        let count = documents.len() as u64;
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
        Ok(count)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<u64> {
        let set = parse_update(&update)?.clone();
        let mut state = self.store.record(StoreOp::Update, collection)?;
        let mut modified = 0;
        if let Some(docs) = state.collections.get_mut(collection) {
            for document in docs.iter_mut().filter(|d| matches(d, &filter)) {
                if apply_set(document, &set) {
                    modified += 1;
                }
            }
        }
        Ok(modified)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> StoreResult<u64> {
        let mut state = self.store.record(StoreOp::Delete, collection)?;
        let Some(docs) = state.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !matches(d, &filter));
        Ok((before - docs.len()) as u64)
    }

    async fn close(&self) -> StoreResult<()> {
        let mut state = self.store.record(StoreOp::Close, "")?;
        state.open_sessions = state.open_sessions.saturating_sub(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[tokio::test]
    async fn test_rename_and_drop() {
        let store = MemoryStore::new();
        store.seed("users", vec![doc! { "name": "a" }]);

        let session = store.connect().await.unwrap();
        session.rename_collection("users", "back_users").await.unwrap();
        assert_eq!(store.collection_names(), vec!["back_users".to_string()]);

        session.drop_collection("back_users").await.unwrap();
        let err = session.drop_collection("back_users").await.unwrap_err();
        assert!(err.is_namespace_absent());
        session.close().await.unwrap();
        assert_eq!(store.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_rename_onto_existing_target_fails() {
        let store = MemoryStore::new();
        store.seed("users", vec![]);
        store.seed("back_users", vec![]);

        let session = store.connect().await.unwrap();
        let err = session.rename_collection("users", "back_users").await.unwrap_err();
        assert!(matches!(err, StoreError::NamespaceExists(_)));
    }

    #[tokio::test]
    async fn test_update_counts_only_changed_documents() {
        let store = MemoryStore::new();
        store.seed(
            "settings",
            vec![
                doc! { "settingKey": "a", "value": 1 },
                doc! { "settingKey": "b", "value": 2 },
            ],
        );

        let session = store.connect().await.unwrap();
        let modified = session
            .update_many("settings", doc! {}, doc! { "$set": { "value": 2 } })
            .await
            .unwrap();
        assert_eq!(modified, 1);

        let err = session
            .update_many("settings", doc! {}, doc! { "$inc": { "value": 1 } })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_exists_filter() {
        let store = MemoryStore::new();
        store.seed(
            "users",
            vec![doc! { "name": "a", "organization": "o1" }, doc! { "name": "b" }],
        );

        let session = store.connect().await.unwrap();
        let found = session
            .find("users", doc! { "organization": { "$exists": true } })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("name").unwrap(), "a");

        let found = session
            .find("users", doc! { "organization": { "$exists": false } })
            .await
            .unwrap();
        assert_eq!(found[0].get_str("name").unwrap(), "b");
    }

    #[tokio::test]
    async fn test_injected_failure_is_journaled() {
        let store = MemoryStore::new();
        store.seed("users", vec![]);
        store.fail_on(StoreOp::Rename, "users");

        let session = store.connect().await.unwrap();
        assert!(session.rename_collection("users", "back_users").await.is_err());
        assert!(store
            .journal()
            .contains(&StoreCall { op: StoreOp::Rename, collection: "users".into() }));
        assert!(store.collection_names().contains(&"users".to_string()));
    }

    #[tokio::test]
    async fn test_delete_missing_collection_is_zero() {
        let store = MemoryStore::new();
        let session = store.connect().await.unwrap();
        let deleted = session
            .delete_many("settings", doc! { "settingKey": "sslDomain" })
            .await
            .unwrap();
        assert_eq!(deleted, 0);
    }
}
