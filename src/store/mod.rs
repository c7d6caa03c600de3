//! # Document Store
//!
//! Narrow contract over the deployment's document database plus two backends:
//! MongoDB for real runs and an in-memory store for fixtures and tests.

pub mod errors;
pub mod memory;
pub mod mongo;
pub mod session;

pub use errors::{is_namespace_absent_message, StoreError, StoreResult};
pub use memory::{MemoryStore, StoreCall, StoreOp};
pub use mongo::MongoStore;
pub use session::{DocumentSession, DocumentStore};
