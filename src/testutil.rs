//! Shared test helpers for doc-vault unit tests.

use std::sync::Arc;

use crate::access::AccessList;
use crate::blob_store::LocalBlobStore;
use crate::config::{Config, StorageConfig};
use crate::manager::FileManager;
use crate::storage::models::FolderRecord;
use crate::storage::Database;

pub const TEST_MAX_UPLOAD: u64 = 1024 * 1024;

/// Config pointing at a temporary directory, with no search backend.
pub fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        data_dir: temp_dir.path().join("data").to_string_lossy().to_string(),
        storage: StorageConfig {
            root: temp_dir.path().join("blobs").to_string_lossy().to_string(),
        },
        search: None,
        test_mode: true,
        max_upload_size: TEST_MAX_UPLOAD,
    }
}

/// A manager over a temporary database and local blob store, no indexing.
pub fn test_manager(temp_dir: &tempfile::TempDir) -> (Database, FileManager) {
    let config = test_config(temp_dir);
    let db = Database::open(&config.data_dir).expect("Failed to open test database");
    let blobs =
        LocalBlobStore::new(&config.storage.root).expect("Failed to create test blob store");
    let manager = FileManager::new(db.clone(), Arc::new(blobs), None, &config);
    (db, manager)
}

/// A folder catalog record with the given members.
pub fn test_folder(id: &str, users: &[&str]) -> FolderRecord {
    FolderRecord {
        id: id.to_string(),
        name: format!("Folder {id}"),
        project_name: Some("Test Project".to_string()),
        space_name: Some("Test Space".to_string()),
        users: AccessList::new(users.iter().copied()),
    }
}
