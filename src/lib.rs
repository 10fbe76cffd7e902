//! doc-vault - A document management backend for file storage, versioning, and search
//!
//! This crate provides the storage core of a hierarchical document system:
//! - Swappable blob storage with folder-scoped, collision-resistant paths
//! - redb embedded database for file, version, and share metadata (ACID, MVCC, crash-safe)
//! - An immutable version ledger enforcing a single active version per file
//! - Best-effort full-text indexing into Elasticsearch
//! - REST API with multipart upload support

pub mod access;
pub mod api;
pub mod blob_store;
pub mod config;
pub mod extract;
pub mod manager;
pub mod search_index;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use config::Config;
use manager::FileManager;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub manager: FileManager,
}
