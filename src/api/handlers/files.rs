use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

use super::{manager_error, parse_bool_field};
use crate::access::AccessList;
use crate::api::response::{
    ApiError, AppJson, AppQuery, CallerId, JSend, JSendPaginated, Pagination,
};
use crate::manager::{FilePatch, UploadRequest};
use crate::storage::models::{FileRecord, FileType, Patch};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub byte_size: u64,
    pub created_at: String,
    pub created_by: String,
    pub description: Option<String>,
    pub file_type: FileType,
    pub filename: String,
    pub folder_id: String,
    pub id: String,
    pub is_encrypted: bool,
    pub mime_type: String,
    pub storage_path: String,
    pub updated_at: String,
    pub users: AccessList,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateFileRequest {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub is_encrypted: Option<bool>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListFilesParams {
    pub folder_id: String,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    #[serde(default)]
    pub password: Option<String>,
}

fn default_limit() -> u32 {
    20
}

/// Distinguishes between a missing field (`None`) and an explicit `null` (`Some(None)`).
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: DeserializeOwned,
    D: Deserializer<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Path(folder_id): Path<String>,
    CallerId(caller_id): CallerId,
    mut multipart: Multipart,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let mut file_data: Option<BytesMut> = None;
    let mut file_name: Option<String> = None;
    let mut file_content_type: Option<String> = None;
    let mut is_encrypted = false;
    let mut password: Option<String> = None;
    let mut description: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                file_content_type = field.content_type().map(|s| s.to_string());

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;

                let mut buf = BytesMut::with_capacity(data.len());
                buf.extend_from_slice(&data);
                file_data = Some(buf);
            }
            "is_encrypted" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid is_encrypted: {e}")))?;
                is_encrypted = parse_bool_field(&text);
            }
            "password" => {
                password = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid password: {e}")))?,
                );
            }
            "description" => {
                description = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("Invalid description: {e}")))?,
                );
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

    let file = state
        .manager
        .upload_file(UploadRequest {
            folder_id,
            caller_id,
            original_name,
            mime_type: file_content_type,
            data: file_data.freeze(),
            encrypted: is_encrypted,
            password,
            description,
        })
        .await
        .map_err(manager_error)?;

    Ok(JSend::success(file_to_response(&file)))
}

pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let file = state.manager.get_file(&id).map_err(manager_error)?;
    Ok(JSend::success(file_to_response(&file)))
}

pub async fn update_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    CallerId(caller_id): CallerId,
    AppJson(req): AppJson<UpdateFileRequest>,
) -> Result<Json<JSend<FileResponse>>, ApiError> {
    let patch = FilePatch {
        filename: req.filename,
        description: Patch::from(req.description),
        encrypted: req.is_encrypted,
        password: req.password,
    };

    let file = state
        .manager
        .update_file(&id, &caller_id, patch)
        .map_err(manager_error)?;

    Ok(JSend::success(file_to_response(&file)))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    CallerId(caller_id): CallerId,
) -> Result<Json<JSend<()>>, ApiError> {
    state
        .manager
        .delete_file(&id, &caller_id)
        .await
        .map_err(manager_error)?;

    Ok(JSend::success(()))
}

pub async fn list_files(
    State(state): State<Arc<AppState>>,
    CallerId(caller_id): CallerId,
    AppQuery(params): AppQuery<ListFilesParams>,
) -> Result<Json<JSendPaginated<FileResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let files = state
        .manager
        .list_files(&params.folder_id, &caller_id, params.search.as_deref())
        .map_err(manager_error)?;

    let total = files.len() as u64;
    let items: Vec<FileResponse> = files
        .iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .map(file_to_response)
        .collect();

    Ok(JSendPaginated::success(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

/// Serve the bytes of a file's active version.
/// Route: GET /files/:id/download
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    AppQuery(params): AppQuery<DownloadParams>,
) -> Result<Response, ApiError> {
    // Password gate for encrypted files, checked before any bytes move
    let file = state.manager.get_file(&id).map_err(manager_error)?;
    if file.is_encrypted {
        let password = params
            .password
            .ok_or_else(|| ApiError::forbidden("This file is password-protected"))?;
        let verified = state
            .manager
            .verify_file_password(&id, &password)
            .map_err(manager_error)?;
        if !verified {
            return Err(ApiError::forbidden("Invalid file password"));
        }
    }

    let (file, data) = state
        .manager
        .download_active(&id)
        .await
        .map_err(manager_error)?;

    Ok(content_response(
        data,
        &file.mime_type,
        &file.filename,
    ))
}

// ============================================================================
// Helpers
// ============================================================================

pub(super) fn file_to_response(file: &FileRecord) -> FileResponse {
    FileResponse {
        byte_size: file.byte_size,
        created_at: file.created_at.to_rfc3339(),
        created_by: file.created_by.clone(),
        description: file.description.clone(),
        file_type: file.file_type,
        filename: file.filename.clone(),
        folder_id: file.folder_id.clone(),
        id: file.id.clone(),
        is_encrypted: file.is_encrypted,
        mime_type: file.mime_type.clone(),
        storage_path: file.storage_path.clone(),
        updated_at: file.updated_at.to_rfc3339(),
        users: file.users.clone(),
    }
}

/// Build a byte-stream response with download headers. No cache headers:
/// the served content moves whenever the active version does.
pub(super) fn content_response(data: bytes::Bytes, mime_type: &str, filename: &str) -> Response {
    let byte_size = data.len() as u64;
    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_TYPE,
        mime_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(byte_size));

    if let Ok(value) = format!("attachment; filename=\"{filename}\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    response
}
