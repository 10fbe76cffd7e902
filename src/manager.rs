//! Orchestration of uploads, versions, deletes, shares, and search across
//! the blob store, the metadata database, and the search index.
//!
//! Ordering discipline: validation and authorization run before any side
//! effect; the blob is written before metadata so a failure leaves at worst
//! an orphan blob (reclaimable garbage), never a record pointing at missing
//! content; indexing is handed off to a detached task after the metadata
//! transaction commits and can never fail the primary operation.

use std::sync::Arc;
use std::time::Duration;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::access::AccessList;
use crate::blob_store::{file_extension, unique_blob_path, BlobStore, BlobStoreError};
use crate::config::Config;
use crate::extract::extract_text;
use crate::search_index::{IndexDocument, SearchHit, SearchIndex};
use crate::storage::models::{
    FileRecord, FileShareRecord, FileType, FileVersionRecord, FolderRecord, Patch, ShareKind,
    ShareStatus,
};
use crate::storage::{Database, DatabaseError, NewVersion};

/// Minimum length for file passwords
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum FileManagerError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Folder not found")]
    FolderNotFound,
    #[error("File not found")]
    FileNotFound,
    #[error("Version not found")]
    VersionNotFound,
    #[error("Share not found")]
    ShareNotFound,
    #[error("Caller is not in the resource's access list")]
    Forbidden,
    #[error("Metadata references a blob missing from storage: {0}")]
    BlobMissing(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Blob storage error: {0}")]
    Blob(#[from] BlobStoreError),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Input for [`FileManager::upload_file`].
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub folder_id: String,
    pub caller_id: String,
    pub original_name: String,
    /// Declared MIME type; `application/octet-stream` is treated as absent
    /// and re-guessed from the filename.
    pub mime_type: Option<String>,
    pub data: Bytes,
    pub encrypted: bool,
    pub password: Option<String>,
    pub description: Option<String>,
}

/// Partial metadata update for [`FileManager::update_file`].
#[derive(Debug, Clone, Default)]
pub struct FilePatch {
    pub filename: Option<String>,
    pub description: Patch<String>,
    pub encrypted: Option<bool>,
    pub password: Option<String>,
}

impl FilePatch {
    fn is_empty(&self) -> bool {
        self.filename.is_none()
            && self.description.is_absent()
            && self.encrypted.is_none()
            && self.password.is_none()
    }
}

/// Input for [`FileManager::upload_version`].
#[derive(Debug, Clone)]
pub struct NewVersionUpload {
    pub original_name: String,
    pub data: Bytes,
    pub is_final: bool,
    /// Activate the new version atomically instead of leaving it a draft.
    pub activate: bool,
}

/// Input for [`FileManager::grant_share`].
#[derive(Debug, Clone)]
pub struct GrantShare {
    pub user_id: String,
    pub permissions: String,
    pub kind: ShareKind,
    pub expires_on: Option<DateTime<Utc>>,
}

/// What the background indexing task should extract text from.
enum IndexContent {
    /// Bytes already in hand from the triggering upload.
    Inline(Bytes),
    /// Fetch the active version's bytes from the blob store.
    Fetch,
}

pub struct FileManager {
    db: Database,
    blobs: Arc<dyn BlobStore>,
    index: Option<Arc<dyn SearchIndex>>,
    index_timeout: Duration,
    max_upload_size: u64,
}

impl FileManager {
    pub fn new(
        db: Database,
        blobs: Arc<dyn BlobStore>,
        index: Option<Arc<dyn SearchIndex>>,
        config: &Config,
    ) -> Self {
        let index_timeout = Duration::from_millis(
            config.search.as_ref().map(|s| s.timeout_ms).unwrap_or(2000),
        );
        Self {
            db,
            blobs,
            index,
            index_timeout,
            max_upload_size: config.max_upload_size,
        }
    }

    // ========================================================================
    // Uploads and metadata
    // ========================================================================

    /// Upload a new file into a folder: blob write, file row plus active
    /// version 1 in one transaction, then best-effort indexing.
    pub async fn upload_file(&self, req: UploadRequest) -> Result<FileRecord, FileManagerError> {
        // Every check runs before the first side effect
        if req.original_name.trim().is_empty() {
            return Err(FileManagerError::Validation(
                "filename must not be empty".to_string(),
            ));
        }
        if req.data.len() as u64 > self.max_upload_size {
            return Err(FileManagerError::Validation(format!(
                "file exceeds maximum upload size of {} bytes",
                self.max_upload_size
            )));
        }
        if req.encrypted || req.password.is_some() {
            validate_password(req.password.as_deref())?;
        }

        let folder = self
            .db
            .get_folder(&req.folder_id)?
            .ok_or(FileManagerError::FolderNotFound)?;
        if !folder.users.contains(&req.caller_id) {
            return Err(FileManagerError::Forbidden);
        }

        let password_hash = req.password.as_deref().map(hash_password).transpose()?;

        // Declared MIME type, or guess from the filename, or fallback
        let mime_type = req
            .mime_type
            .clone()
            .filter(|ct| ct != "application/octet-stream")
            .or_else(|| {
                mime_guess::from_path(&req.original_name)
                    .first()
                    .map(|m| m.to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let byte_size = req.data.len() as u64;
        let storage_path = unique_blob_path(&folder.id, &req.original_name, &req.data);
        let now = Utc::now();

        // Phase 1: write the blob. Metadata creation below is the commit
        // point; until it lands this blob is unreferenced.
        self.blobs.put(&storage_path, req.data.clone()).await?;

        let file = FileRecord {
            id: uuid::Uuid::new_v4().to_string(),
            filename: req.original_name.clone(),
            mime_type: mime_type.clone(),
            file_type: FileType::from_mime(&mime_type),
            byte_size,
            storage_path: storage_path.clone(),
            folder_id: folder.id.clone(),
            is_encrypted: req.encrypted,
            password_hash,
            description: req.description.clone(),
            created_by: req.caller_id.clone(),
            users: AccessList::single(&req.caller_id),
            created_at: now,
            updated_at: now,
        };
        let version = FileVersionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            file_id: file.id.clone(),
            version_number: 1,
            content_type: file_extension(&req.original_name).unwrap_or_else(|| "bin".to_string()),
            storage_path,
            byte_size,
            uploaded_by: req.caller_id.clone(),
            is_final: false,
            is_active: true,
            created_at: now,
        };

        // Phase 2: metadata
        if let Err(e) = self.db.create_file_with_initial_version(&file, &version) {
            self.cleanup_blob(&file.storage_path).await;
            return Err(e.into());
        }

        tracing::debug!(file_id = %file.id, folder_id = %folder.id, "uploaded file");
        self.spawn_index_upsert(file.clone(), folder, IndexContent::Inline(req.data));
        Ok(file)
    }

    /// Get a file's metadata by id
    pub fn get_file(&self, file_id: &str) -> Result<FileRecord, FileManagerError> {
        self.db
            .get_file(file_id)?
            .ok_or(FileManagerError::FileNotFound)
    }

    /// List a folder's files for a member, newest first, optionally filtered
    /// by a filename substring. Files the caller is not a member of are
    /// excluded from the listing, not surfaced as Forbidden.
    pub fn list_files(
        &self,
        folder_id: &str,
        caller_id: &str,
        filename_filter: Option<&str>,
    ) -> Result<Vec<FileRecord>, FileManagerError> {
        let folder = self
            .db
            .get_folder(folder_id)?
            .ok_or(FileManagerError::FolderNotFound)?;
        if !folder.users.contains(caller_id) {
            return Err(FileManagerError::Forbidden);
        }

        let mut files = self.db.list_files(folder_id, filename_filter)?;
        files.retain(|f| f.users.contains(caller_id));
        Ok(files)
    }

    /// Partial update of a file's metadata. Enabling encryption without a
    /// stored or supplied password is rejected before anything is written.
    pub fn update_file(
        &self,
        file_id: &str,
        caller_id: &str,
        patch: FilePatch,
    ) -> Result<FileRecord, FileManagerError> {
        if patch.is_empty() {
            return Err(FileManagerError::Validation(
                "at least one field (filename, description, is_encrypted, password) must be provided"
                    .to_string(),
            ));
        }
        if let Some(ref name) = patch.filename {
            if name.trim().is_empty() {
                return Err(FileManagerError::Validation(
                    "filename must not be empty".to_string(),
                ));
            }
        }

        let file = self
            .db
            .get_file(file_id)?
            .ok_or(FileManagerError::FileNotFound)?;
        if !file.users.contains(caller_id) {
            return Err(FileManagerError::Forbidden);
        }

        if let Some(ref password) = patch.password {
            validate_password(Some(password))?;
        }
        if patch.encrypted == Some(true) && file.password_hash.is_none() && patch.password.is_none()
        {
            return Err(FileManagerError::Validation(
                "enabling encryption requires a password".to_string(),
            ));
        }

        let password_hash = patch.password.as_deref().map(hash_password).transpose()?;
        let filename_changed = patch
            .filename
            .as_deref()
            .is_some_and(|name| name != file.filename);

        let updated = self
            .db
            .update_file(
                file_id,
                patch.filename.as_deref(),
                patch.description.as_option().map(|d| d.map(String::as_str)),
                patch.encrypted,
                // A new password only ever replaces the hash, never clears it
                password_hash.as_deref().map(Some),
            )?
            .ok_or(FileManagerError::FileNotFound)?;

        tracing::debug!(file_id = %file_id, "updated file");
        if filename_changed {
            self.reindex(&updated);
        }
        Ok(updated)
    }

    /// Delete a file, cascading to its versions, blobs, shares, and search
    /// entry. Authorization precedes every destructive effect.
    pub async fn delete_file(
        &self,
        file_id: &str,
        caller_id: &str,
    ) -> Result<(), FileManagerError> {
        let file = self
            .db
            .get_file(file_id)?
            .ok_or(FileManagerError::FileNotFound)?;
        if !file.users.contains(caller_id) {
            return Err(FileManagerError::Forbidden);
        }

        let Some((file, versions)) = self.db.delete_file_cascade(file_id)? else {
            return Err(FileManagerError::FileNotFound);
        };

        // Once the metadata is gone a leftover blob is reclaimable garbage
        // and a stale index entry is filtered out at read time, so both
        // removals are best-effort
        let mut paths: Vec<&str> = versions.iter().map(|v| v.storage_path.as_str()).collect();
        if !paths.contains(&file.storage_path.as_str()) {
            paths.push(file.storage_path.as_str());
        }
        for path in paths {
            if let Err(e) = self.blobs.delete(path).await {
                tracing::warn!(path = %path, error = %e, "failed to delete blob");
            }
        }

        self.spawn_index_remove(file.id.clone());
        tracing::debug!(file_id = %file_id, "deleted file");
        Ok(())
    }

    // ========================================================================
    // Versions
    // ========================================================================

    /// Append a version to a file's ledger. The new version is a draft
    /// unless `activate` is set, in which case the active flag moves to it
    /// within the ledger's write transaction.
    pub async fn upload_version(
        &self,
        file_id: &str,
        caller_id: &str,
        upload: NewVersionUpload,
    ) -> Result<FileVersionRecord, FileManagerError> {
        if upload.original_name.trim().is_empty() {
            return Err(FileManagerError::Validation(
                "filename must not be empty".to_string(),
            ));
        }
        if upload.data.len() as u64 > self.max_upload_size {
            return Err(FileManagerError::Validation(format!(
                "file exceeds maximum upload size of {} bytes",
                self.max_upload_size
            )));
        }

        let file = self
            .db
            .get_file(file_id)?
            .ok_or(FileManagerError::FileNotFound)?;
        if !file.users.contains(caller_id) {
            return Err(FileManagerError::Forbidden);
        }

        let storage_path = unique_blob_path(&file.folder_id, &upload.original_name, &upload.data);
        self.blobs.put(&storage_path, upload.data.clone()).await?;

        let new = NewVersion {
            content_type: file_extension(&upload.original_name)
                .unwrap_or_else(|| "bin".to_string()),
            storage_path: storage_path.clone(),
            byte_size: upload.data.len() as u64,
            uploaded_by: caller_id.to_string(),
            is_final: upload.is_final,
            activate: upload.activate,
        };

        let version = match self.db.create_version(file_id, new) {
            Ok(Some(version)) => version,
            Ok(None) => {
                // File vanished between the check and the write
                self.cleanup_blob(&storage_path).await;
                return Err(FileManagerError::FileNotFound);
            }
            Err(e) => {
                self.cleanup_blob(&storage_path).await;
                return Err(e.into());
            }
        };

        tracing::debug!(
            file_id = %file_id,
            version = version.version_number,
            active = version.is_active,
            "uploaded version"
        );

        // The index mirrors the active content; drafts leave it untouched
        if version.is_active {
            if let Ok(Some(updated)) = self.db.get_file(file_id) {
                self.reindex(&updated);
            }
        }
        Ok(version)
    }

    /// Make a version the file's servable content. Sibling deactivation and
    /// target activation commit as one unit.
    pub fn restore_version(
        &self,
        version_id: &str,
        caller_id: &str,
    ) -> Result<FileVersionRecord, FileManagerError> {
        let version = self
            .db
            .get_version(version_id)?
            .ok_or(FileManagerError::VersionNotFound)?;
        let file = self
            .db
            .get_file(&version.file_id)?
            .ok_or(FileManagerError::FileNotFound)?;
        if !file.users.contains(caller_id) {
            return Err(FileManagerError::Forbidden);
        }

        let restored = self
            .db
            .restore_version(version_id)?
            .ok_or(FileManagerError::VersionNotFound)?;

        tracing::debug!(
            file_id = %restored.file_id,
            version = restored.version_number,
            "restored version"
        );

        if let Ok(Some(updated)) = self.db.get_file(&restored.file_id) {
            self.reindex(&updated);
        }
        Ok(restored)
    }

    /// List a file's versions for a member, newest version number first
    pub fn list_versions(
        &self,
        file_id: &str,
        caller_id: &str,
    ) -> Result<Vec<FileVersionRecord>, FileManagerError> {
        let file = self
            .db
            .get_file(file_id)?
            .ok_or(FileManagerError::FileNotFound)?;
        if !file.users.contains(caller_id) {
            return Err(FileManagerError::Forbidden);
        }
        Ok(self.db.list_versions(file_id)?)
    }

    // ========================================================================
    // Downloads
    // ========================================================================

    /// Fetch the bytes of a specific version
    pub async fn download_version(
        &self,
        version_id: &str,
    ) -> Result<(FileVersionRecord, Bytes), FileManagerError> {
        let version = self
            .db
            .get_version(version_id)?
            .ok_or(FileManagerError::VersionNotFound)?;
        let data = self.fetch_blob(&version.storage_path).await?;
        Ok((version, data))
    }

    /// Fetch the bytes of a file's active version -- the single authoritative
    /// pointer for serving content ("latest version number" is informational
    /// ordering only)
    pub async fn download_active(
        &self,
        file_id: &str,
    ) -> Result<(FileRecord, Bytes), FileManagerError> {
        let file = self
            .db
            .get_file(file_id)?
            .ok_or(FileManagerError::FileNotFound)?;
        let active = self.db.active_version(file_id)?.ok_or_else(|| {
            FileManagerError::Internal(format!("file {file_id} has no active version"))
        })?;
        let data = self.fetch_blob(&active.storage_path).await?;
        Ok((file, data))
    }

    /// Check a plaintext password against an encrypted file's stored hash
    pub fn verify_file_password(
        &self,
        file_id: &str,
        password: &str,
    ) -> Result<bool, FileManagerError> {
        let file = self
            .db
            .get_file(file_id)?
            .ok_or(FileManagerError::FileNotFound)?;
        let Some(ref hash) = file.password_hash else {
            return Ok(false);
        };

        let parsed = PasswordHash::new(hash).map_err(|e| {
            FileManagerError::Internal(format!("stored password hash is invalid: {e}"))
        })?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(FileManagerError::Internal(format!(
                "password verification failed: {e}"
            ))),
        }
    }

    // ========================================================================
    // Shares
    // ========================================================================

    /// Grant a capability on a file to another user
    pub fn grant_share(
        &self,
        file_id: &str,
        caller_id: &str,
        grant: GrantShare,
    ) -> Result<FileShareRecord, FileManagerError> {
        if grant.user_id.trim().is_empty() {
            return Err(FileManagerError::Validation(
                "user_id must not be empty".to_string(),
            ));
        }
        if grant.permissions.trim().is_empty() {
            return Err(FileManagerError::Validation(
                "permissions must not be empty".to_string(),
            ));
        }

        let file = self
            .db
            .get_file(file_id)?
            .ok_or(FileManagerError::FileNotFound)?;
        if !file.users.contains(caller_id) {
            return Err(FileManagerError::Forbidden);
        }

        let now = Utc::now();
        if grant.expires_on.is_some_and(|deadline| deadline <= now) {
            return Err(FileManagerError::Validation(
                "expiration date must be in the future".to_string(),
            ));
        }

        let share = FileShareRecord {
            id: uuid::Uuid::new_v4().to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            file_id: file.id.clone(),
            shared_with: grant.user_id,
            permissions: grant.permissions,
            kind: grant.kind,
            status: ShareStatus::Active,
            shared_on: now,
            expires_on: grant.expires_on,
        };
        self.db.put_share(&share)?;

        tracing::debug!(share_id = %share.id, file_id = %file.id, "granted share");
        Ok(share)
    }

    /// Revoke a share. The row survives with revoked status so the token can
    /// never authorize again.
    pub fn revoke_share(
        &self,
        share_id: &str,
        caller_id: &str,
    ) -> Result<FileShareRecord, FileManagerError> {
        let share = self
            .db
            .get_share(share_id)?
            .ok_or(FileManagerError::ShareNotFound)?;
        let file = self
            .db
            .get_file(&share.file_id)?
            .ok_or(FileManagerError::FileNotFound)?;
        if !file.users.contains(caller_id) {
            return Err(FileManagerError::Forbidden);
        }

        let updated = self
            .db
            .update_share_status(share_id, ShareStatus::Revoked)?
            .ok_or(FileManagerError::ShareNotFound)?;

        tracing::debug!(share_id = %share_id, "revoked share");
        Ok(updated)
    }

    /// List the shares granted on a file
    pub fn list_shares(
        &self,
        file_id: &str,
        caller_id: &str,
    ) -> Result<Vec<FileShareRecord>, FileManagerError> {
        let file = self
            .db
            .get_file(file_id)?
            .ok_or(FileManagerError::FileNotFound)?;
        if !file.users.contains(caller_id) {
            return Err(FileManagerError::Forbidden);
        }
        Ok(self.db.list_shares_for_file(file_id)?)
    }

    /// Resolve a capability token to its target file. Status and expiry are
    /// checked now, at access time: a share that expired since it was
    /// granted is flipped to expired on observation and denied.
    pub fn share_access(
        &self,
        token: &str,
    ) -> Result<(FileShareRecord, FileRecord), FileManagerError> {
        let share = self
            .db
            .get_share_by_token(token)?
            .ok_or(FileManagerError::ShareNotFound)?;

        let now = Utc::now();
        if share.status == ShareStatus::Active && share.is_expired(now) {
            self.db.update_share_status(&share.id, ShareStatus::Expired)?;
            tracing::debug!(share_id = %share.id, "share lazily expired");
            return Err(FileManagerError::Forbidden);
        }
        if !share.authorizes(now) {
            return Err(FileManagerError::Forbidden);
        }

        let file = self
            .db
            .get_file(&share.file_id)?
            .ok_or(FileManagerError::FileNotFound)?;
        Ok((share, file))
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Free-text search over indexed documents, filtered down to files the
    /// caller can access. Hits for deleted files are dropped the same way:
    /// the index is never trusted as a source of truth.
    pub async fn search(
        &self,
        caller_id: &str,
        text: &str,
    ) -> Result<Vec<SearchHit>, FileManagerError> {
        let Some(index) = self.index.as_ref() else {
            tracing::debug!("search requested but no search backend is configured");
            return Ok(Vec::new());
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let hits = match index.query(text).await {
            Ok(hits) => hits,
            Err(e) => {
                // A down engine degrades search freshness, never availability
                tracing::warn!(error = %e, "search query failed");
                return Ok(Vec::new());
            }
        };

        let mut results = Vec::new();
        for hit in hits {
            match self.db.get_file(&hit.file_id)? {
                Some(file) if file.users.contains(caller_id) => results.push(hit),
                _ => {}
            }
        }
        Ok(results)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Fetch a blob that metadata says should exist. Absence here is
    /// storage/metadata divergence, surfaced distinctly from not-found.
    async fn fetch_blob(&self, path: &str) -> Result<Bytes, FileManagerError> {
        if !self.blobs.exists(path).await? {
            tracing::warn!(path = %path, "metadata references a blob missing from storage");
            return Err(FileManagerError::BlobMissing(path.to_string()));
        }
        match self.blobs.get(path).await {
            Ok(data) => Ok(data),
            Err(BlobStoreError::NotFound(path)) => Err(FileManagerError::BlobMissing(path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal of a blob whose metadata write failed
    async fn cleanup_blob(&self, path: &str) {
        if let Err(e) = self.blobs.delete(path).await {
            tracing::warn!(path = %path, error = %e, "failed to clean up orphan blob");
        }
    }

    /// Re-project a file into the search index from its current active
    /// content (used after metadata edits and active-version moves)
    fn reindex(&self, file: &FileRecord) {
        match self.db.get_folder(&file.folder_id) {
            Ok(Some(folder)) => {
                self.spawn_index_upsert(file.clone(), folder, IndexContent::Fetch)
            }
            Ok(None) => {
                tracing::debug!(file_id = %file.id, "containing folder missing; skipping re-index")
            }
            Err(e) => {
                tracing::warn!(file_id = %file.id, error = %e, "failed to load folder for re-index")
            }
        }
    }

    /// Hand the index write to a detached task. The primary operation has
    /// already committed; whatever happens here is logged and dropped.
    fn spawn_index_upsert(&self, file: FileRecord, folder: FolderRecord, content: IndexContent) {
        let Some(index) = self.index.clone() else {
            return;
        };
        let blobs = Arc::clone(&self.blobs);
        let timeout = self.index_timeout;

        tokio::spawn(async move {
            let data = match content {
                IndexContent::Inline(data) => Some(data),
                IndexContent::Fetch => match blobs.get(&file.storage_path).await {
                    Ok(data) => Some(data),
                    Err(e) => {
                        tracing::debug!(
                            file_id = %file.id,
                            error = %e,
                            "blob unavailable for extraction; indexing metadata only"
                        );
                        None
                    }
                },
            };

            let content = match data {
                Some(data) => {
                    let extension = file_extension(&file.storage_path).unwrap_or_default();
                    tokio::task::spawn_blocking(move || extract_text(&data, &extension))
                        .await
                        .unwrap_or_default()
                }
                None => String::new(),
            };

            let doc = IndexDocument {
                space_name: folder.space_name,
                folder_name: Some(folder.name),
                project_name: folder.project_name,
                filename: file.filename.clone(),
                content,
                file_path: file.storage_path.clone(),
                created_at: file.created_at,
            };

            match tokio::time::timeout(timeout, index.upsert(&file.id, &doc)).await {
                Ok(Ok(())) => tracing::debug!(file_id = %file.id, "search index updated"),
                Ok(Err(e)) => {
                    tracing::warn!(file_id = %file.id, error = %e, "search indexing failed")
                }
                Err(_) => tracing::warn!(file_id = %file.id, "search indexing timed out"),
            }
        });
    }

    /// Detached best-effort removal of a file's search entry after delete
    fn spawn_index_remove(&self, file_id: String) {
        let Some(index) = self.index.clone() else {
            return;
        };
        let timeout = self.index_timeout;

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, index.remove(&file_id)).await {
                Ok(Ok(())) => tracing::debug!(file_id = %file_id, "search entry removed"),
                Ok(Err(e)) => {
                    tracing::warn!(file_id = %file_id, error = %e, "search entry removal failed")
                }
                Err(_) => tracing::warn!(file_id = %file_id, "search entry removal timed out"),
            }
        });
    }
}

fn validate_password(password: Option<&str>) -> Result<(), FileManagerError> {
    match password {
        Some(password) if password.len() >= MIN_PASSWORD_LEN => Ok(()),
        Some(_) => Err(FileManagerError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        ))),
        None => Err(FileManagerError::Validation(
            "encryption requires a password".to_string(),
        )),
    }
}

fn hash_password(password: &str) -> Result<String, FileManagerError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| FileManagerError::Internal(format!("password hashing failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[tokio::test]
    async fn encrypted_upload_without_password_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let (db, manager) = testutil::test_manager(&dir);
        db.put_folder(&testutil::test_folder("folder-1", &["u1"]))
            .unwrap();

        let err = manager
            .upload_file(UploadRequest {
                folder_id: "folder-1".to_string(),
                caller_id: "u1".to_string(),
                original_name: "secret.pdf".to_string(),
                mime_type: Some("application/pdf".to_string()),
                data: Bytes::from_static(b"content"),
                encrypted: true,
                password: None,
                description: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FileManagerError::Validation(_)));
        assert!(db.list_files("folder-1", None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (db, manager) = testutil::test_manager(&dir);
        db.put_folder(&testutil::test_folder("folder-1", &["u1"]))
            .unwrap();

        let err = manager
            .upload_file(UploadRequest {
                folder_id: "folder-1".to_string(),
                caller_id: "u1".to_string(),
                original_name: "secret.pdf".to_string(),
                mime_type: None,
                data: Bytes::from_static(b"content"),
                encrypted: true,
                password: Some("abc".to_string()),
                description: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FileManagerError::Validation(_)));
    }

    #[tokio::test]
    async fn password_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (db, manager) = testutil::test_manager(&dir);
        db.put_folder(&testutil::test_folder("folder-1", &["u1"]))
            .unwrap();

        let file = manager
            .upload_file(UploadRequest {
                folder_id: "folder-1".to_string(),
                caller_id: "u1".to_string(),
                original_name: "secret.pdf".to_string(),
                mime_type: None,
                data: Bytes::from_static(b"content"),
                encrypted: true,
                password: Some("hunter2-long".to_string()),
                description: None,
            })
            .await
            .unwrap();

        assert!(manager
            .verify_file_password(&file.id, "hunter2-long")
            .unwrap());
        assert!(!manager.verify_file_password(&file.id, "wrong").unwrap());
    }

    #[tokio::test]
    async fn upload_over_size_ceiling_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (db, manager) = testutil::test_manager(&dir);
        db.put_folder(&testutil::test_folder("folder-1", &["u1"]))
            .unwrap();

        let err = manager
            .upload_file(UploadRequest {
                folder_id: "folder-1".to_string(),
                caller_id: "u1".to_string(),
                original_name: "big.bin".to_string(),
                mime_type: None,
                data: Bytes::from(vec![0u8; (testutil::TEST_MAX_UPLOAD + 1) as usize]),
                encrypted: false,
                password: None,
                description: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, FileManagerError::Validation(_)));
    }
}
