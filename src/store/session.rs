//! # Document Store Contract
//!
//! The orchestrator needs only this narrow surface from the document store.
//! A `DocumentStore` hands out sessions; each phase opens one, uses it, and
//! closes it before the next phase begins.

use async_trait::async_trait;
use mongodb::bson::Document;

use super::errors::StoreResult;

/// Factory for document store sessions
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Open a new session against the configured database
    async fn connect(&self) -> StoreResult<Box<dyn DocumentSession>>;
}

/// An open connection to one database
#[async_trait]
pub trait DocumentSession: Send + Sync {
    /// Names of every collection in the database
    async fn list_collection_names(&self) -> StoreResult<Vec<String>>;

    /// Rename `from` to `to`. Fails if `to` already exists.
    async fn rename_collection(&self, from: &str, to: &str) -> StoreResult<()>;

    /// Drop a collection. Must report `StoreError::NamespaceNotFound`
    /// (or a message matching it) when the collection does not exist.
    async fn drop_collection(&self, name: &str) -> StoreResult<()>;

    /// Create an empty collection
    async fn create_collection(&self, name: &str) -> StoreResult<()>;

    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>>;

    async fn find(&self, collection: &str, filter: Document) -> StoreResult<Vec<Document>>;

    /// Insert documents, returning how many were inserted
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> StoreResult<u64>;

    /// Apply `update` to every match, returning the modified count
    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<u64>;

    /// Delete every match, returning the deleted count
    async fn delete_many(&self, collection: &str, filter: Document) -> StoreResult<u64>;

    /// Release the session
    async fn close(&self) -> StoreResult<()>;
}
