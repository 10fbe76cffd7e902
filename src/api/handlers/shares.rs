use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::files::{file_to_response, FileResponse};
use super::manager_error;
use crate::api::response::{ApiError, AppJson, CallerId, JSend};
use crate::manager::GrantShare;
use crate::storage::models::{FileShareRecord, ShareKind, ShareStatus};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GrantShareRequest {
    pub user_id: String,
    pub permissions: String,
    pub kind: ShareKind,
    #[serde(default)]
    pub expires_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub expires_on: Option<String>,
    pub file_id: String,
    pub id: String,
    pub kind: ShareKind,
    pub permissions: String,
    pub shared_on: String,
    pub shared_with: String,
    pub status: ShareStatus,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ShareAccessResponse {
    pub file: FileResponse,
    pub kind: ShareKind,
    pub permissions: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn grant_share(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    CallerId(caller_id): CallerId,
    AppJson(req): AppJson<GrantShareRequest>,
) -> Result<Json<JSend<ShareResponse>>, ApiError> {
    let share = state
        .manager
        .grant_share(
            &file_id,
            &caller_id,
            GrantShare {
                user_id: req.user_id,
                permissions: req.permissions,
                kind: req.kind,
                expires_on: req.expires_on,
            },
        )
        .map_err(manager_error)?;

    Ok(JSend::success(share_to_response(&share)))
}

pub async fn revoke_share(
    State(state): State<Arc<AppState>>,
    Path(share_id): Path<String>,
    CallerId(caller_id): CallerId,
) -> Result<Json<JSend<ShareResponse>>, ApiError> {
    let share = state
        .manager
        .revoke_share(&share_id, &caller_id)
        .map_err(manager_error)?;

    Ok(JSend::success(share_to_response(&share)))
}

pub async fn list_shares(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    CallerId(caller_id): CallerId,
) -> Result<Json<JSend<Vec<ShareResponse>>>, ApiError> {
    let shares = state
        .manager
        .list_shares(&file_id, &caller_id)
        .map_err(manager_error)?;

    Ok(JSend::success(
        shares.iter().map(share_to_response).collect(),
    ))
}

/// Resolve a capability token to its target file.
/// Route: GET /shares/token/:token
pub async fn share_access(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<JSend<ShareAccessResponse>>, ApiError> {
    let (share, file) = state.manager.share_access(&token).map_err(manager_error)?;

    Ok(JSend::success(ShareAccessResponse {
        file: file_to_response(&file),
        kind: share.kind,
        permissions: share.permissions,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn share_to_response(share: &FileShareRecord) -> ShareResponse {
    ShareResponse {
        expires_on: share.expires_on.map(|d| d.to_rfc3339()),
        file_id: share.file_id.clone(),
        id: share.id.clone(),
        kind: share.kind,
        permissions: share.permissions.clone(),
        shared_on: share.shared_on.to_rfc3339(),
        shared_with: share.shared_with.clone(),
        status: share.status,
        token: share.token.clone(),
    }
}
