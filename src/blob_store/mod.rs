mod local;

pub use local::LocalBlobStore;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Blob not found: {0}")]
    NotFound(String),
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Abstraction over blob storage backends.
/// Paths are folder-scoped keys produced by [`unique_blob_path`] -- the raw
/// blobs are meaningless without the metadata database.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, data: Bytes) -> Result<(), BlobStoreError>;
    async fn get(&self, path: &str) -> Result<Bytes, BlobStoreError>;
    async fn delete(&self, path: &str) -> Result<(), BlobStoreError>;
    async fn exists(&self, path: &str) -> Result<bool, BlobStoreError>;
}

/// Derive a collision-resistant storage path for a new blob.
///
/// The name combines the slugified filename stem, the current millisecond
/// timestamp, and a token from the content digest, preserving the original
/// extension. Paths live under a folder-scoped prefix so one folder's blobs
/// can be enumerated in a single pass, and a path is never reused after
/// deletion: every stored blob gets a fresh name.
pub fn unique_blob_path(folder_id: &str, original_name: &str, data: &[u8]) -> String {
    let (stem, extension) = split_filename(original_name);
    let digest = ring::digest::digest(&ring::digest::SHA256, data);
    let token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&digest.as_ref()[..6]);
    let millis = chrono::Utc::now().timestamp_millis();
    let slug = slugify(stem);

    match extension {
        Some(ext) => format!("files/{folder_id}/{slug}-{millis}-{token}.{ext}"),
        None => format!("files/{folder_id}/{slug}-{millis}-{token}"),
    }
}

/// The extension tag of a filename, lowercased ("report.PDF" -> "pdf").
pub fn file_extension(name: &str) -> Option<String> {
    split_filename(name).1.map(|ext| ext.to_ascii_lowercase())
}

/// Split a filename into stem and extension. A leading dot is part of the
/// stem (".env" has no extension).
fn split_filename(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Reduce a filename stem to lowercase ASCII alphanumerics and dashes.
fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut last_dash = true;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("file");
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes() {
        assert_eq!(slugify("Quarterly Report (v2)"), "quarterly-report-v2");
        assert_eq!(slugify("___"), "file");
        assert_eq!(slugify("déjà vu"), "d-j-vu");
    }

    #[test]
    fn split_keeps_leading_dot_in_stem() {
        assert_eq!(split_filename(".env"), (".env", None));
        assert_eq!(split_filename("report.pdf"), ("report", Some("pdf")));
        assert_eq!(split_filename("archive.tar.gz"), ("archive.tar", Some("gz")));
    }

    #[test]
    fn unique_path_is_scoped_and_keeps_extension() {
        let path = unique_blob_path("folder-1", "My Report.pdf", b"content");
        assert!(path.starts_with("files/folder-1/my-report-"));
        assert!(path.ends_with(".pdf"));
    }

    #[test]
    fn unique_path_differs_for_same_name() {
        let a = unique_blob_path("f", "report.pdf", b"alpha");
        let b = unique_blob_path("f", "report.pdf", b"beta");
        assert_ne!(a, b);
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(file_extension("Report.PDF"), Some("pdf".to_string()));
        assert_eq!(file_extension("notes"), None);
    }
}
