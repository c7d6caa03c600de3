//! tenant-restore - restore a single tenant's documents and assets from a
//! backup archive into a live deployment

pub mod archive;
pub mod cli;
pub mod lifecycle;
pub mod objects;
pub mod observability;
pub mod predicates;
pub mod restore;
pub mod store;
