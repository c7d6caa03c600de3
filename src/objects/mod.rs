//! # Object Store
//!
//! Blob uploads for tenant assets. S3 for real deployments, the local
//! filesystem for local mode, memory for tests.

pub mod backend;
pub mod errors;
pub mod local;
pub mod memory;
pub mod s3;

pub use backend::{validate_key, ObjectStore};
pub use errors::{ObjectResult, ObjectStoreError};
pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;
