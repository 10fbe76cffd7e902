use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::access::AccessList;
use crate::api::response::{ApiError, AppJson, JSend};
use crate::storage::models::FolderRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub files_deleted: u64,
    pub folders_deleted: u64,
    pub shares_deleted: u64,
    pub versions_deleted: u64,
}

#[derive(Debug, Deserialize)]
pub struct UpsertFolderRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub space_name: Option<String>,
    pub users: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Catalog data-entry for the folder/project/space CRUD that lives outside
/// this service.
/// Route: PUT /_internal/folders
pub async fn put_folder(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<UpsertFolderRequest>,
) -> Result<Json<JSend<()>>, ApiError> {
    if req.id.trim().is_empty() {
        return Err(ApiError::bad_request("id must not be empty"));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }

    let folder = FolderRecord {
        id: req.id,
        name: req.name,
        project_name: req.project_name,
        space_name: req.space_name,
        users: AccessList::new(req.users),
    };

    state
        .db
        .put_folder(&folder)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::debug!(folder_id = %folder.id, "registered folder");
    Ok(JSend::success(()))
}

pub async fn admin_purge(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<PurgeResponse>>, ApiError> {
    let stats = state
        .db
        .purge_all()
        .map_err(|e| ApiError::internal(e.to_string()))?;

    tracing::warn!(
        files = stats.files,
        versions = stats.versions,
        shares = stats.shares,
        folders = stats.folders,
        "Purged all data"
    );

    Ok(JSend::success(PurgeResponse {
        files_deleted: stats.files,
        folders_deleted: stats.folders,
        shares_deleted: stats.shares,
        versions_deleted: stats.versions,
    }))
}
