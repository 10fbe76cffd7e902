use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::AccessList;

/// Three-state patch value for partial updates that survives serialization round-trips.
/// Unlike `Option<Option<T>>`, each variant has a distinct wire representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Patch<T> {
    /// Field was not included in the request (no change).
    #[default]
    Absent,
    /// Field was explicitly set to null (clear it).
    Null,
    /// Field was set to a new value.
    Value(T),
}

impl<T> From<Option<Option<T>>> for Patch<T> {
    fn from(v: Option<Option<T>>) -> Self {
        match v {
            None => Patch::Absent,
            Some(None) => Patch::Null,
            Some(Some(v)) => Patch::Value(v),
        }
    }
}

impl<T> Patch<T> {
    /// Convert to the `Option<Option<&T>>` form that storage operations expect.
    pub fn as_option(&self) -> Option<Option<&T>> {
        match self {
            Patch::Absent => None,
            Patch::Null => Some(None),
            Patch::Value(v) => Some(Some(v)),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }
}

/// Classification of a file derived from its MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Audio,
    Binary,
    Document,
    Image,
    Video,
}

impl FileType {
    /// Derive a file type classification from a MIME type string.
    pub fn from_mime(mime_type: &str) -> Self {
        let primary = mime_type.split('/').next().unwrap_or("");
        match primary {
            "audio" => FileType::Audio,
            "image" => FileType::Image,
            "video" => FileType::Video,
            "text" | "application" => {
                let sub = mime_type.split('/').nth(1).unwrap_or("");
                match sub {
                    "pdf"
                    | "msword"
                    | "rtf"
                    | "csv"
                    | "vnd.openxmlformats-officedocument.wordprocessingml.document"
                    | "vnd.openxmlformats-officedocument.spreadsheetml.sheet"
                    | "vnd.openxmlformats-officedocument.presentationml.presentation"
                    | "vnd.ms-excel"
                    | "vnd.ms-powerpoint" => FileType::Document,
                    _ if primary == "text" => FileType::Document,
                    _ => FileType::Binary,
                }
            }
            _ => FileType::Binary,
        }
    }
}

/// A logical document stored in redb.
///
/// `byte_size` and `storage_path` mirror the currently active version and are
/// rewritten whenever the active flag moves; the full history lives in
/// [`FileVersionRecord`] rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub file_type: FileType,
    pub byte_size: u64,
    /// Blob store key of the active version. Unique, never recycled.
    pub storage_path: String,
    pub folder_id: String,
    pub is_encrypted: bool,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub created_by: String,
    pub users: AccessList,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An immutable snapshot of a file's content at a point in time.
///
/// Version numbers are 1-based and strictly increasing per file; they are
/// computed as max+1 inside the creating write transaction so a deleted
/// middle version is never renumbered or reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileVersionRecord {
    pub id: String,
    pub file_id: String,
    pub version_number: u32,
    /// Extension tag of the uploaded content, e.g. "pdf".
    pub content_type: String,
    pub storage_path: String,
    pub byte_size: u64,
    pub uploaded_by: String,
    /// Marks a released (non-draft) version.
    pub is_final: bool,
    /// Exactly one version per file carries this flag at any time.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareKind {
    Direct,
    Link,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareStatus {
    Active,
    Expired,
    Revoked,
}

/// A capability grant on a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileShareRecord {
    pub id: String,
    /// Globally unique capability token handed to the grantee.
    pub token: String,
    pub file_id: String,
    pub shared_with: String,
    pub permissions: String,
    pub kind: ShareKind,
    pub status: ShareStatus,
    pub shared_on: DateTime<Utc>,
    #[serde(default)]
    pub expires_on: Option<DateTime<Utc>>,
}

impl FileShareRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_on.is_some_and(|deadline| deadline <= now)
    }

    /// Whether this share authorizes access at `now`. Status and expiration
    /// are both checked at access time, not just at grant time.
    pub fn authorizes(&self, now: DateTime<Utc>) -> bool {
        self.status == ShareStatus::Active && !self.is_expired(now)
    }
}

/// Catalog entry for the folder hierarchy surrounding a file.
///
/// The space/project/folder CRUD lives outside this crate; its layer writes
/// these records so uploads can be authorized and index documents can carry
/// the containing names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub space_name: Option<String>,
    pub users: AccessList,
}
