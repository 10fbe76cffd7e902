use axum::extract::{Multipart, Path, State};
use axum::response::Response;
use axum::Json;
use bytes::BytesMut;
use serde::Serialize;
use std::sync::Arc;

use super::files::content_response;
use super::{manager_error, parse_bool_field};
use crate::api::response::{ApiError, CallerId, JSend};
use crate::manager::NewVersionUpload;
use crate::storage::models::FileVersionRecord;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub byte_size: u64,
    pub content_type: String,
    pub created_at: String,
    pub file_id: String,
    pub id: String,
    pub is_active: bool,
    pub is_final: bool,
    pub storage_path: String,
    pub uploaded_by: String,
    pub version_number: u32,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_version(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    CallerId(caller_id): CallerId,
    mut multipart: Multipart,
) -> Result<Json<JSend<VersionResponse>>, ApiError> {
    let mut file_data: Option<BytesMut> = None;
    let mut file_name: Option<String> = None;
    let mut is_final = false;
    let mut activate = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;

                let mut buf = BytesMut::with_capacity(data.len());
                buf.extend_from_slice(&data);
                file_data = Some(buf);
            }
            "is_final" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid is_final: {e}")))?;
                is_final = parse_bool_field(&text);
            }
            "activate" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid activate: {e}")))?;
                activate = parse_bool_field(&text);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let file_data = file_data.ok_or_else(|| ApiError::bad_request("file field is required"))?;
    let original_name =
        file_name.ok_or_else(|| ApiError::bad_request("file must carry a filename"))?;

    if file_data.len() as u64 > state.config.max_upload_size {
        return Err(ApiError::payload_too_large(format!(
            "File exceeds maximum upload size of {} bytes",
            state.config.max_upload_size
        )));
    }

    let version = state
        .manager
        .upload_version(
            &file_id,
            &caller_id,
            NewVersionUpload {
                original_name,
                data: file_data.freeze(),
                is_final,
                activate,
            },
        )
        .await
        .map_err(manager_error)?;

    Ok(JSend::success(version_to_response(&version)))
}

pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    CallerId(caller_id): CallerId,
) -> Result<Json<JSend<Vec<VersionResponse>>>, ApiError> {
    let versions = state
        .manager
        .list_versions(&file_id, &caller_id)
        .map_err(manager_error)?;

    Ok(JSend::success(
        versions.iter().map(version_to_response).collect(),
    ))
}

pub async fn restore_version(
    State(state): State<Arc<AppState>>,
    Path(version_id): Path<String>,
    CallerId(caller_id): CallerId,
) -> Result<Json<JSend<VersionResponse>>, ApiError> {
    let version = state
        .manager
        .restore_version(&version_id, &caller_id)
        .map_err(manager_error)?;

    Ok(JSend::success(version_to_response(&version)))
}

/// Serve the bytes of a specific version.
/// Route: GET /versions/:id/download
pub async fn download_version(
    State(state): State<Arc<AppState>>,
    Path(version_id): Path<String>,
) -> Result<Response, ApiError> {
    let (version, data) = state
        .manager
        .download_version(&version_id)
        .await
        .map_err(manager_error)?;

    let filename = format!(
        "version_{}.{}",
        version.version_number, version.content_type
    );
    Ok(content_response(
        data,
        "application/octet-stream",
        &filename,
    ))
}

// ============================================================================
// Helpers
// ============================================================================

fn version_to_response(version: &FileVersionRecord) -> VersionResponse {
    VersionResponse {
        byte_size: version.byte_size,
        content_type: version.content_type.clone(),
        created_at: version.created_at.to_rfc3339(),
        file_id: version.file_id.clone(),
        id: version.id.clone(),
        is_active: version.is_active,
        is_final: version.is_final,
        storage_path: version.storage_path.clone(),
        uploaded_by: version.uploaded_by.clone(),
        version_number: version.version_number,
    }
}
