use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;

use doc_vault::access::AccessList;
use doc_vault::blob_store::LocalBlobStore;
use doc_vault::config::{Config, StorageConfig};
use doc_vault::manager::{
    FileManager, FileManagerError, FilePatch, GrantShare, NewVersionUpload, UploadRequest,
};
use doc_vault::search_index::{IndexDocument, SearchHit, SearchIndex, SearchIndexError};
use doc_vault::storage::models::{
    FileRecord, FileShareRecord, FolderRecord, Patch, ShareKind, ShareStatus,
};
use doc_vault::storage::Database;

// ============================================================================
// Fixtures
// ============================================================================

fn test_config(dir: &tempfile::TempDir) -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        data_dir: dir.path().join("data").to_string_lossy().to_string(),
        storage: StorageConfig {
            root: dir.path().join("blobs").to_string_lossy().to_string(),
        },
        search: None,
        test_mode: true,
        max_upload_size: 1024 * 1024,
    }
}

fn manager_with_index(
    dir: &tempfile::TempDir,
    index: Option<Arc<dyn SearchIndex>>,
) -> (Database, FileManager) {
    let config = test_config(dir);
    let db = Database::open(&config.data_dir).unwrap();
    let blobs = LocalBlobStore::new(&config.storage.root).unwrap();
    let manager = FileManager::new(db.clone(), Arc::new(blobs), index, &config);
    (db, manager)
}

fn test_manager(dir: &tempfile::TempDir) -> (Database, FileManager) {
    manager_with_index(dir, None)
}

fn folder(id: &str, users: &[&str]) -> FolderRecord {
    FolderRecord {
        id: id.to_string(),
        name: format!("Folder {id}"),
        project_name: Some("Apollo".to_string()),
        space_name: Some("Engineering".to_string()),
        users: AccessList::new(users.iter().copied()),
    }
}

fn upload_request(folder_id: &str, caller: &str, name: &str, data: &'static [u8]) -> UploadRequest {
    UploadRequest {
        folder_id: folder_id.to_string(),
        caller_id: caller.to_string(),
        original_name: name.to_string(),
        mime_type: None,
        data: Bytes::from_static(data),
        encrypted: false,
        password: None,
        description: None,
    }
}

async fn upload(
    manager: &FileManager,
    folder_id: &str,
    caller: &str,
    name: &str,
    data: &'static [u8],
) -> FileRecord {
    manager
        .upload_file(upload_request(folder_id, caller, name, data))
        .await
        .unwrap()
}

/// In-memory index double that records every call.
#[derive(Default)]
struct RecordingIndex {
    upserts: Mutex<Vec<(String, IndexDocument)>>,
    removals: Mutex<Vec<String>>,
    hits: Mutex<Vec<SearchHit>>,
}

impl RecordingIndex {
    fn preset_hits(&self, hits: Vec<SearchHit>) {
        *self.hits.lock().unwrap() = hits;
    }
}

#[async_trait]
impl SearchIndex for RecordingIndex {
    async fn ensure_schema(&self) -> Result<(), SearchIndexError> {
        Ok(())
    }

    async fn upsert(&self, file_id: &str, doc: &IndexDocument) -> Result<(), SearchIndexError> {
        self.upserts
            .lock()
            .unwrap()
            .push((file_id.to_string(), doc.clone()));
        Ok(())
    }

    async fn remove(&self, file_id: &str) -> Result<(), SearchIndexError> {
        self.removals.lock().unwrap().push(file_id.to_string());
        Ok(())
    }

    async fn query(&self, _text: &str) -> Result<Vec<SearchHit>, SearchIndexError> {
        Ok(self
            .hits
            .lock()
            .unwrap()
            .iter()
            .map(|h| SearchHit {
                file_id: h.file_id.clone(),
                score: h.score,
            })
            .collect())
    }
}

/// Index double standing in for an unreachable engine.
struct FailingIndex;

#[async_trait]
impl SearchIndex for FailingIndex {
    async fn ensure_schema(&self) -> Result<(), SearchIndexError> {
        Err(SearchIndexError::Backend("engine unreachable".to_string()))
    }

    async fn upsert(&self, _file_id: &str, _doc: &IndexDocument) -> Result<(), SearchIndexError> {
        Err(SearchIndexError::Backend("engine unreachable".to_string()))
    }

    async fn remove(&self, _file_id: &str) -> Result<(), SearchIndexError> {
        Err(SearchIndexError::Backend("engine unreachable".to_string()))
    }

    async fn query(&self, _text: &str) -> Result<Vec<SearchHit>, SearchIndexError> {
        Err(SearchIndexError::Backend("engine unreachable".to_string()))
    }
}

/// Wait for the detached indexing task to land its calls.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..80 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("condition not reached within timeout");
}

// ============================================================================
// Upload and download
// ============================================================================

#[tokio::test]
async fn test_upload_download_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1"])).unwrap();

    let file = upload(&manager, "f1", "u1", "report.pdf", b"%PDF-1.4 body").await;
    assert_eq!(file.byte_size, 13);
    assert_eq!(file.mime_type, "application/pdf");
    assert!(file.users.contains("u1"));

    let (served, data) = manager.download_active(&file.id).await.unwrap();
    assert_eq!(served.id, file.id);
    assert_eq!(data, Bytes::from_static(b"%PDF-1.4 body"));

    let versions = manager.list_versions(&file.id, "u1").unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version_number, 1);
    assert!(versions[0].is_active);
}

#[tokio::test]
async fn test_upload_to_missing_folder() {
    let dir = tempfile::tempdir().unwrap();
    let (_db, manager) = test_manager(&dir);

    let err = manager
        .upload_file(upload_request("ghost", "u1", "a.txt", b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, FileManagerError::FolderNotFound));
}

#[tokio::test]
async fn test_upload_by_non_member_is_forbidden() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1"])).unwrap();

    let err = manager
        .upload_file(upload_request("f1", "intruder", "a.txt", b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, FileManagerError::Forbidden));
}

#[tokio::test]
async fn test_encrypted_upload_without_password_has_no_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1"])).unwrap();

    let mut req = upload_request("f1", "u1", "secret.pdf", b"classified");
    req.encrypted = true;
    let err = manager.upload_file(req).await.unwrap_err();

    assert!(matches!(err, FileManagerError::Validation(_)));
    assert!(db.list_files("f1", None).unwrap().is_empty());
    // Rejected before phase 1: the folder's blob scope was never created
    assert!(!dir.path().join("blobs/files/f1").exists());
}

#[tokio::test]
async fn test_blob_missing_is_distinct_from_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1"])).unwrap();

    let file = upload(&manager, "f1", "u1", "doc.txt", b"contents").await;

    // Induce storage/metadata divergence by removing the blob behind the
    // database's back
    std::fs::remove_file(dir.path().join("blobs").join(&file.storage_path)).unwrap();

    let err = manager.download_active(&file.id).await.unwrap_err();
    assert!(matches!(err, FileManagerError::BlobMissing(_)));

    let err = manager.download_active("no-such-file").await.unwrap_err();
    assert!(matches!(err, FileManagerError::FileNotFound));
}

// ============================================================================
// Metadata updates
// ============================================================================

#[tokio::test]
async fn test_update_file_patch_semantics() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1"])).unwrap();

    let mut req = upload_request("f1", "u1", "draft.txt", b"words");
    req.description = Some("first draft".to_string());
    let file = manager.upload_file(req).await.unwrap();

    // Enabling encryption with no password anywhere is rejected
    let err = manager
        .update_file(
            &file.id,
            "u1",
            FilePatch {
                encrypted: Some(true),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, FileManagerError::Validation(_)));

    // Rename, clear the description, and protect with a password
    let updated = manager
        .update_file(
            &file.id,
            "u1",
            FilePatch {
                filename: Some("final.txt".to_string()),
                description: Patch::Null,
                encrypted: Some(true),
                password: Some("correct-horse".to_string()),
            },
        )
        .unwrap();
    assert_eq!(updated.filename, "final.txt");
    assert_eq!(updated.description, None);
    assert!(updated.is_encrypted);

    assert!(manager
        .verify_file_password(&file.id, "correct-horse")
        .unwrap());
    assert!(!manager.verify_file_password(&file.id, "nope").unwrap());

    // An empty patch is a validation error
    let err = manager
        .update_file(&file.id, "u1", FilePatch::default())
        .unwrap_err();
    assert!(matches!(err, FileManagerError::Validation(_)));
}

#[tokio::test]
async fn test_update_by_non_member_is_forbidden() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1"])).unwrap();
    let file = upload(&manager, "f1", "u1", "a.txt", b"x").await;

    let err = manager
        .update_file(
            &file.id,
            "u2",
            FilePatch {
                filename: Some("taken.txt".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, FileManagerError::Forbidden));
}

// ============================================================================
// Version lifecycle (the full scenario)
// ============================================================================

#[tokio::test]
async fn test_version_lifecycle_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1"])).unwrap();

    // Upload "report.pdf" (5 bytes): version 1 active
    let file = upload(&manager, "f1", "u1", "report.pdf", b"12345").await;
    assert_eq!(file.byte_size, 5);

    // Upload a new version (8 bytes): created inactive, version 1 untouched
    let v2 = manager
        .upload_version(
            &file.id,
            "u1",
            NewVersionUpload {
                original_name: "report.pdf".to_string(),
                data: Bytes::from_static(b"12345678"),
                is_final: false,
                activate: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(v2.version_number, 2);
    assert!(!v2.is_active);

    let versions = manager.list_versions(&file.id, "u1").unwrap();
    let v1 = versions.iter().find(|v| v.version_number == 1).unwrap();
    assert!(v1.is_active);

    // Old content still served
    let (_, data) = manager.download_active(&file.id).await.unwrap();
    assert_eq!(data.len(), 5);

    // Restore version 2: active flag moves atomically
    let restored = manager.restore_version(&v2.id, "u1").unwrap();
    assert!(restored.is_active);
    let versions = manager.list_versions(&file.id, "u1").unwrap();
    assert_eq!(versions.iter().filter(|v| v.is_active).count(), 1);
    assert!(!versions
        .iter()
        .find(|v| v.version_number == 1)
        .unwrap()
        .is_active);

    let (served, data) = manager.download_active(&file.id).await.unwrap();
    assert_eq!(data.len(), 8);
    assert_eq!(served.byte_size, 8);

    // Both version blobs exist on disk before the delete
    let v1_path = dir.path().join("blobs").join(&v1.storage_path);
    let v2_path = dir.path().join("blobs").join(&v2.storage_path);
    assert!(v1_path.exists());
    assert!(v2_path.exists());

    // Delete: all rows and all blobs go away
    manager.delete_file(&file.id, "u1").await.unwrap();
    assert!(!v1_path.exists());
    assert!(!v2_path.exists());
    assert!(matches!(
        manager.download_version(&v2.id).await.unwrap_err(),
        FileManagerError::VersionNotFound
    ));
    assert!(matches!(
        manager.download_active(&file.id).await.unwrap_err(),
        FileManagerError::FileNotFound
    ));
}

#[tokio::test]
async fn test_upload_version_with_activation_updates_mirror() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1"])).unwrap();
    let file = upload(&manager, "f1", "u1", "spec.txt", b"v1 text").await;

    let v2 = manager
        .upload_version(
            &file.id,
            "u1",
            NewVersionUpload {
                original_name: "spec.txt".to_string(),
                data: Bytes::from_static(b"version two text"),
                is_final: true,
                activate: true,
            },
        )
        .await
        .unwrap();
    assert!(v2.is_active);
    assert!(v2.is_final);

    let (served, data) = manager.download_active(&file.id).await.unwrap();
    assert_eq!(data, Bytes::from_static(b"version two text"));
    assert_eq!(served.byte_size, 16);
    assert_eq!(served.storage_path, v2.storage_path);
}

#[tokio::test]
async fn test_version_numbers_strictly_increase() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1"])).unwrap();
    let file = upload(&manager, "f1", "u1", "log.txt", b"one").await;

    for expected in 2..=4u32 {
        let version = manager
            .upload_version(
                &file.id,
                "u1",
                NewVersionUpload {
                    original_name: "log.txt".to_string(),
                    data: Bytes::from_static(b"more"),
                    is_final: false,
                    activate: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(version.version_number, expected);
    }
}

#[tokio::test]
async fn test_restore_by_non_member_is_forbidden() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1"])).unwrap();
    let file = upload(&manager, "f1", "u1", "a.txt", b"x").await;
    let versions = manager.list_versions(&file.id, "u1").unwrap();

    let err = manager.restore_version(&versions[0].id, "u2").unwrap_err();
    assert!(matches!(err, FileManagerError::Forbidden));
}

#[tokio::test]
async fn test_listing_excludes_files_caller_is_not_member_of() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1", "u2"])).unwrap();

    let mine = upload(&manager, "f1", "u1", "mine.txt", b"a").await;
    upload(&manager, "f1", "u2", "theirs.txt", b"b").await;

    // Both users share the folder; each file's access list holds only its
    // uploader, and listings drop the rest rather than erroring
    let listed = manager.list_files("f1", "u1", None).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, mine.id);

    let err = manager.list_files("f1", "outsider", None).unwrap_err();
    assert!(matches!(err, FileManagerError::Forbidden));
}

// ============================================================================
// Delete authorization
// ============================================================================

#[tokio::test]
async fn test_forbidden_delete_leaves_file_intact() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1", "u2"])).unwrap();

    // u2 can see the folder but is not on the file's access list
    let file = upload(&manager, "f1", "u1", "mine.txt", b"private").await;

    let err = manager.delete_file(&file.id, "u2").await.unwrap_err();
    assert!(matches!(err, FileManagerError::Forbidden));

    // Fully intact: metadata, version, and blob
    let (_, data) = manager.download_active(&file.id).await.unwrap();
    assert_eq!(data, Bytes::from_static(b"private"));
    assert_eq!(manager.list_versions(&file.id, "u1").unwrap().len(), 1);
}

// ============================================================================
// Indexing behavior
// ============================================================================

#[tokio::test]
async fn test_failing_index_never_blocks_primary_operations() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = manager_with_index(&dir, Some(Arc::new(FailingIndex)));
    db.put_folder(&folder("f1", &["u1"])).unwrap();

    // Upload succeeds even though every index call errors
    let file = upload(&manager, "f1", "u1", "resilient.txt", b"still here").await;

    // The file is fully retrievable and listable
    let (_, data) = manager.download_active(&file.id).await.unwrap();
    assert_eq!(data, Bytes::from_static(b"still here"));
    assert_eq!(manager.list_files("f1", "u1", None).unwrap().len(), 1);

    // Search degrades to empty rather than erroring
    let hits = manager.search("u1", "resilient").await.unwrap();
    assert!(hits.is_empty());

    // Delete also completes despite the failing removal
    manager.delete_file(&file.id, "u1").await.unwrap();
    assert!(db.get_file(&file.id).unwrap().is_none());
}

#[tokio::test]
async fn test_upload_projects_document_into_index() {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(RecordingIndex::default());
    let (db, manager) = manager_with_index(&dir, Some(index.clone()));
    db.put_folder(&folder("f1", &["u1"])).unwrap();

    let file = upload(&manager, "f1", "u1", "notes.txt", b"plain words").await;

    wait_until(|| !index.upserts.lock().unwrap().is_empty()).await;

    let upserts = index.upserts.lock().unwrap();
    let (indexed_id, doc) = &upserts[0];
    assert_eq!(indexed_id, &file.id);
    assert_eq!(doc.filename, "notes.txt");
    assert_eq!(doc.folder_name, Some("Folder f1".to_string()));
    assert_eq!(doc.space_name, Some("Engineering".to_string()));
    assert_eq!(doc.project_name, Some("Apollo".to_string()));
    assert_eq!(doc.file_path, file.storage_path);
    // Plain text is not an extractable format
    assert_eq!(doc.content, "");
}

#[tokio::test]
async fn test_delete_removes_index_entry() {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(RecordingIndex::default());
    let (db, manager) = manager_with_index(&dir, Some(index.clone()));
    db.put_folder(&folder("f1", &["u1"])).unwrap();

    let file = upload(&manager, "f1", "u1", "gone.txt", b"soon").await;
    manager.delete_file(&file.id, "u1").await.unwrap();

    wait_until(|| !index.removals.lock().unwrap().is_empty()).await;
    assert_eq!(index.removals.lock().unwrap()[0], file.id);
}

#[tokio::test]
async fn test_search_filters_hits_by_membership_and_existence() {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(RecordingIndex::default());
    let (db, manager) = manager_with_index(&dir, Some(index.clone()));
    db.put_folder(&folder("f1", &["u1", "u2"])).unwrap();

    let mine = upload(&manager, "f1", "u1", "mine.txt", b"alpha").await;
    let theirs = upload(&manager, "f1", "u2", "theirs.txt", b"beta").await;

    // The engine ranks all three; membership and existence are re-checked
    // against the metadata database afterwards
    index.preset_hits(vec![
        SearchHit {
            file_id: mine.id.clone(),
            score: 3.2,
        },
        SearchHit {
            file_id: theirs.id.clone(),
            score: 2.5,
        },
        SearchHit {
            file_id: "deleted-file".to_string(),
            score: 1.0,
        },
    ]);

    let hits = manager.search("u1", "alpha").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].file_id, mine.id);

    // Blank queries short-circuit
    assert!(manager.search("u1", "   ").await.unwrap().is_empty());
}

// ============================================================================
// Shares
// ============================================================================

#[tokio::test]
async fn test_share_grant_access_revoke() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1"])).unwrap();
    let file = upload(&manager, "f1", "u1", "shared.txt", b"payload").await;

    let share = manager
        .grant_share(
            &file.id,
            "u1",
            GrantShare {
                user_id: "u2".to_string(),
                permissions: "read".to_string(),
                kind: ShareKind::Direct,
                expires_on: None,
            },
        )
        .unwrap();
    assert_eq!(share.status, ShareStatus::Active);

    let (resolved, target) = manager.share_access(&share.token).unwrap();
    assert_eq!(resolved.id, share.id);
    assert_eq!(target.id, file.id);

    // Revocation is a status transition, checked on the next access
    manager.revoke_share(&share.id, "u1").unwrap();
    let err = manager.share_access(&share.token).unwrap_err();
    assert!(matches!(err, FileManagerError::Forbidden));
}

#[tokio::test]
async fn test_share_expiry_is_lazy() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1"])).unwrap();
    let file = upload(&manager, "f1", "u1", "timed.txt", b"payload").await;

    // A share whose deadline has already passed but whose status was never
    // updated: expiry must be enforced at access time
    let stale = FileShareRecord {
        id: "stale-share".to_string(),
        token: "stale-token".to_string(),
        file_id: file.id.clone(),
        shared_with: "u2".to_string(),
        permissions: "read".to_string(),
        kind: ShareKind::Link,
        status: ShareStatus::Active,
        shared_on: Utc::now() - chrono::Duration::days(10),
        expires_on: Some(Utc::now() - chrono::Duration::days(1)),
    };
    db.put_share(&stale).unwrap();

    let err = manager.share_access("stale-token").unwrap_err();
    assert!(matches!(err, FileManagerError::Forbidden));

    // Observation flipped the stored status
    let share = db.get_share("stale-share").unwrap().unwrap();
    assert_eq!(share.status, ShareStatus::Expired);
}

#[tokio::test]
async fn test_grant_share_requires_membership() {
    let dir = tempfile::tempdir().unwrap();
    let (db, manager) = test_manager(&dir);
    db.put_folder(&folder("f1", &["u1"])).unwrap();
    let file = upload(&manager, "f1", "u1", "a.txt", b"x").await;

    let err = manager
        .grant_share(
            &file.id,
            "intruder",
            GrantShare {
                user_id: "u3".to_string(),
                permissions: "read".to_string(),
                kind: ShareKind::Direct,
                expires_on: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, FileManagerError::Forbidden));
}
