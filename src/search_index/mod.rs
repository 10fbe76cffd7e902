mod elastic;

pub use elastic::ElasticIndex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchIndexError {
    #[error("Search backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Denormalized projection of a file pushed into the full-text index.
///
/// The index is derived state, never a source of truth: it may lag a write
/// or briefly survive a delete, and read paths re-check the metadata
/// database before trusting a hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub space_name: Option<String>,
    pub folder_name: Option<String>,
    pub project_name: Option<String>,
    pub filename: String,
    pub content: String,
    /// Exact-match field; not tokenized.
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

/// A ranked query hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub file_id: String,
    pub score: f64,
}

/// External full-text index over file metadata and extracted content.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Idempotent schema creation; "already exists" is success.
    async fn ensure_schema(&self) -> Result<(), SearchIndexError>;

    /// Insert or replace the document for a file.
    async fn upsert(&self, file_id: &str, doc: &IndexDocument) -> Result<(), SearchIndexError>;

    /// Drop a file's document; unknown ids are success.
    async fn remove(&self, file_id: &str) -> Result<(), SearchIndexError>;

    /// Multi-field free-text query, ranked by the engine's relevance scoring.
    async fn query(&self, text: &str) -> Result<Vec<SearchHit>, SearchIndexError>;
}
