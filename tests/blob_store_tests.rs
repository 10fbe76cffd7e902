use bytes::Bytes;
use doc_vault::blob_store::{unique_blob_path, BlobStore, BlobStoreError, LocalBlobStore};

#[tokio::test]
async fn test_local_store_put_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path()).unwrap();

    let data = Bytes::from("hello world");
    store.put("test-key", data.clone()).await.unwrap();

    let retrieved = store.get("test-key").await.unwrap();
    assert_eq!(retrieved, data);
}

#[tokio::test]
async fn test_local_store_scoped_keys_create_parents() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path()).unwrap();

    // Folder-scoped keys are nested paths; intermediate directories appear
    // on first write
    let key = "files/folder-1/report-123-abc.pdf";
    store.put(key, Bytes::from("%PDF-")).await.unwrap();

    assert!(store.exists(key).await.unwrap());
    assert!(dir.path().join("files/folder-1").is_dir());
}

#[tokio::test]
async fn test_local_store_exists() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path()).unwrap();

    assert!(!store.exists("missing").await.unwrap());

    store.put("present", Bytes::from("data")).await.unwrap();
    assert!(store.exists("present").await.unwrap());
}

#[tokio::test]
async fn test_local_store_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path()).unwrap();

    store.put("to-delete", Bytes::from("data")).await.unwrap();
    assert!(store.exists("to-delete").await.unwrap());

    store.delete("to-delete").await.unwrap();
    assert!(!store.exists("to-delete").await.unwrap());
}

#[tokio::test]
async fn test_local_store_delete_nonexistent() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path()).unwrap();

    // Deleting a nonexistent key should not error
    store.delete("nonexistent").await.unwrap();
}

#[tokio::test]
async fn test_local_store_get_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path()).unwrap();

    let result = store.get("missing").await;
    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), BlobStoreError::NotFound(_)));
}

#[tokio::test]
async fn test_round_trip_through_unique_path() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path()).unwrap();

    let data = Bytes::from_static(b"spreadsheet bytes");
    let path = unique_blob_path("folder-9", "Budget 2025.xlsx", &data);
    assert!(path.starts_with("files/folder-9/budget-2025-"));
    assert!(path.ends_with(".xlsx"));

    store.put(&path, data.clone()).await.unwrap();
    assert_eq!(store.get(&path).await.unwrap(), data);
}
