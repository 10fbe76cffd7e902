mod admin;
mod files;
mod search;
mod shares;
mod versions;

use crate::api::response::ApiError;
use crate::manager::FileManagerError;

pub use admin::{admin_purge, health, put_folder};
pub use files::{delete_file, download_file, get_file, list_files, update_file, upload_file};
pub use search::search;
pub use shares::{grant_share, list_shares, revoke_share, share_access};
pub use versions::{download_version, list_versions, restore_version, upload_version};

/// Map an orchestrator error to a JSend response.
fn manager_error(e: FileManagerError) -> ApiError {
    match e {
        FileManagerError::Validation(msg) => ApiError::unprocessable(msg),
        FileManagerError::FolderNotFound => ApiError::not_found("Folder not found"),
        FileManagerError::FileNotFound => ApiError::not_found("File not found"),
        FileManagerError::VersionNotFound => ApiError::not_found("Version not found"),
        FileManagerError::ShareNotFound => ApiError::not_found("Share not found"),
        FileManagerError::Forbidden => {
            ApiError::forbidden("You do not have permission to access this resource")
        }
        // Metadata/storage divergence keeps a distinct message from a plain
        // 404 so clients and alerts can tell them apart
        FileManagerError::BlobMissing(_) => {
            ApiError::not_found("File content missing from storage")
        }
        FileManagerError::Database(e) => ApiError::internal(e.to_string()),
        FileManagerError::Blob(e) => ApiError::internal(e.to_string()),
        FileManagerError::Internal(msg) => ApiError::internal(msg),
    }
}

/// Lenient boolean for multipart text fields
fn parse_bool_field(text: &str) -> bool {
    matches!(text.trim(), "true" | "1")
}
