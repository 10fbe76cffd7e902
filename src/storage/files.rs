use chrono::Utc;
use redb::ReadableTable;

use super::db::{index_add, index_remove, read_index, Database, DatabaseError};
use super::models::{FileRecord, FileShareRecord, FileVersionRecord};
use super::tables::*;

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Store a file record together with its initial version, atomically.
    ///
    /// Metadata creation is the commit point of an upload: the caller writes
    /// the blob first, and a failure here leaves only an orphan blob, never a
    /// dangling record pointing at missing content.
    pub fn create_file_with_initial_version(
        &self,
        file: &FileRecord,
        version: &FileVersionRecord,
    ) -> Result<(), DatabaseError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");
        debug_assert_eq!(version.file_id, file.id, "version must reference the file");
        debug_assert!(version.is_active, "initial version must be active");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(FILES)?;
            let data = rmp_serde::to_vec_named(file)?;
            table.insert(file.id.as_str(), data.as_slice())?;
        }
        index_add(&write_txn, FOLDER_FILES, &file.folder_id, &file.id)?;
        {
            let mut table = write_txn.open_table(VERSIONS)?;
            let data = rmp_serde::to_vec_named(version)?;
            table.insert(version.id.as_str(), data.as_slice())?;
        }
        index_add(&write_txn, FILE_VERSIONS, &file.id, &version.id)?;
        write_txn.commit()?;
        Ok(())
    }

    /// Get a file by its UUID
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(id)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get all files in a folder
    pub fn get_files_by_folder(&self, folder_id: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index = read_txn.open_table(FOLDER_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let file_ids = read_index(&index, folder_id)?;

        let mut files = Vec::new();
        for file_id in file_ids {
            if let Some(data) = files_table.get(file_id.as_str())? {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                files.push(file);
            }
        }

        Ok(files)
    }

    /// List a folder's files, optionally filtered by a filename substring
    pub fn list_files(
        &self,
        folder_id: &str,
        filename_filter: Option<&str>,
    ) -> Result<Vec<FileRecord>, DatabaseError> {
        let mut files = self.get_files_by_folder(folder_id)?;

        if let Some(needle) = filename_filter {
            let needle = needle.to_lowercase();
            files.retain(|f| f.filename.to_lowercase().contains(&needle));
        }

        // Newest first, matching the listing order of the API
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(files)
    }

    /// Update a file's mutable metadata fields, returning the updated record
    pub fn update_file(
        &self,
        id: &str,
        filename: Option<&str>,
        description: Option<Option<&str>>,
        is_encrypted: Option<bool>,
        password_hash: Option<Option<&str>>,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let existing = {
            let table = write_txn.open_table(FILES)?;
            let result = match table.get(id)? {
                Some(data) => {
                    let file: FileRecord = rmp_serde::from_slice(data.value())?;
                    Some(file)
                }
                None => None,
            };
            result
        };

        let updated = match existing {
            Some(mut file) => {
                if let Some(name) = filename {
                    file.filename = name.to_string();
                }
                if let Some(d) = description {
                    file.description = d.map(|s| s.to_string());
                }
                if let Some(encrypted) = is_encrypted {
                    file.is_encrypted = encrypted;
                }
                if let Some(hash) = password_hash {
                    file.password_hash = hash.map(|s| s.to_string());
                }
                file.updated_at = Utc::now();

                let serialized = rmp_serde::to_vec_named(&file)?;
                let mut table = write_txn.open_table(FILES)?;
                table.insert(id, serialized.as_slice())?;
                Some(file)
            }
            None => None,
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// Delete a file and everything it owns: version rows, share rows, and
    /// the folder/token index entries. Returns the removed records so the
    /// caller can clean up blobs and the search index.
    pub fn delete_file_cascade(
        &self,
        id: &str,
    ) -> Result<Option<(FileRecord, Vec<FileVersionRecord>)>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let file: Option<FileRecord> = {
            let table = write_txn.open_table(FILES)?;
            let result = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };

        let Some(file) = file else {
            write_txn.commit()?;
            return Ok(None);
        };

        // Collect owned versions before touching any table
        let version_ids = {
            let index = write_txn.open_table(FILE_VERSIONS)?;
            read_index(&index, id)?
        };
        let mut versions = Vec::new();
        {
            let table = write_txn.open_table(VERSIONS)?;
            for version_id in &version_ids {
                if let Some(data) = table.get(version_id.as_str())? {
                    let version: FileVersionRecord = rmp_serde::from_slice(data.value())?;
                    versions.push(version);
                }
            }
        }

        // Collect owned shares (tokens are needed for index cleanup)
        let share_ids = {
            let index = write_txn.open_table(FILE_SHARES)?;
            read_index(&index, id)?
        };
        let mut share_tokens = Vec::new();
        {
            let table = write_txn.open_table(SHARES)?;
            for share_id in &share_ids {
                if let Some(data) = table.get(share_id.as_str())? {
                    let share: FileShareRecord = rmp_serde::from_slice(data.value())?;
                    share_tokens.push(share.token);
                }
            }
        }

        // Remove the file row and its folder index entry
        {
            let mut table = write_txn.open_table(FILES)?;
            table.remove(id)?;
        }
        index_remove(&write_txn, FOLDER_FILES, &file.folder_id, id)?;

        // Cascade to versions
        {
            let mut table = write_txn.open_table(VERSIONS)?;
            for version_id in &version_ids {
                table.remove(version_id.as_str())?;
            }
        }
        {
            let mut index = write_txn.open_table(FILE_VERSIONS)?;
            index.remove(id)?;
        }

        // Cascade to shares
        {
            let mut table = write_txn.open_table(SHARES)?;
            for share_id in &share_ids {
                table.remove(share_id.as_str())?;
            }
        }
        {
            let mut index = write_txn.open_table(FILE_SHARES)?;
            index.remove(id)?;
        }
        {
            let mut tokens = write_txn.open_table(SHARE_TOKENS)?;
            for token in &share_tokens {
                tokens.remove(token.as_str())?;
            }
        }

        write_txn.commit()?;
        Ok(Some((file, versions)))
    }
}
