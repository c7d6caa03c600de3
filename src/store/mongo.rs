//! # MongoDB Backend

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::{Client, Database};

use super::errors::{is_namespace_absent_message, StoreError, StoreResult, NAMESPACE_NOT_FOUND_CODE};
use super::session::{DocumentSession, DocumentStore};

/// MongoDB-backed document store
#[derive(Debug, Clone)]
pub struct MongoStore {
    uri: String,
    database: String,
}

impl MongoStore {
    /// Create a store for `database` on the server at `uri`
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
        }
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn connect(&self) -> StoreResult<Box<dyn DocumentSession>> {
        let client = Client::with_uri_str(&self.uri)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let db = client.database(&self.database);

        Ok(Box::new(MongoSession { client, db }))
    }
}

/// One client connection scoped to a single phase
struct MongoSession {
    client: Client,
    db: Database,
}

impl MongoSession {
    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

fn map_error(err: MongoError) -> StoreError {
    if let ErrorKind::Command(ref command) = *err.kind {
        if command.code == NAMESPACE_NOT_FOUND_CODE || is_namespace_absent_message(&command.message) {
            return StoreError::NamespaceNotFound(command.message.clone());
        }
    }
    StoreError::Command(err.to_string())
}

#[async_trait]
impl DocumentSession for MongoSession {
    async fn list_collection_names(&self) -> StoreResult<Vec<String>> {
        self.db.list_collection_names(None).await.map_err(map_error)
    }

    async fn rename_collection(&self, from: &str, to: &str) -> StoreResult<()> {
        let db_name = self.db.name();
        let command = doc! {
            "renameCollection": format!("{}.{}", db_name, from),
            "to": format!("{}.{}", db_name, to),
            "dropTarget": false,
        };
        self.client
            .database("admin")
            .run_command(command, None)
            .await
            .map(|_| ())
            .map_err(map_error)
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.collection(name).drop(None).await.map_err(map_error)
    }

    async fn create_collection(&self, name: &str) -> StoreResult<()> {
        self.db.create_collection(name, None).await.map_err(map_error)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>> {
        self.collection(collection)
            .find_one(filter, None)
            .await
            .map_err(map_error)
    }

    async fn find(&self, collection: &str, filter: Document) -> StoreResult<Vec<Document>> {
        let cursor = self
            .collection(collection)
            .find(filter, None)
            .await
            .map_err(map_error)?;
        cursor.try_collect().await.map_err(map_error)
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> StoreResult<u64> {
        // The server rejects an empty batch.
        if documents.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection(collection)
            .insert_many(documents, None)
            .await
            .map_err(map_error)?;
        Ok(result.inserted_ids.len() as u64)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<u64> {
        let result = self
            .collection(collection)
            .update_many(filter, update, None)
            .await
            .map_err(map_error)?;
        Ok(result.modified_count)
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> StoreResult<u64> {
        let result = self
            .collection(collection)
            .delete_many(filter, None)
            .await
            .map_err(map_error)?;
        Ok(result.deleted_count)
    }

    async fn close(&self) -> StoreResult<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}
