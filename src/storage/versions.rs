use chrono::Utc;
use redb::ReadableTable;

use super::db::{index_add, index_remove, read_index, Database, DatabaseError};
use super::models::{FileRecord, FileVersionRecord};
use super::tables::*;

/// Input for appending a version to a file's ledger.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub content_type: String,
    pub storage_path: String,
    pub byte_size: u64,
    pub uploaded_by: String,
    pub is_final: bool,
    /// When set, all sibling versions are deactivated and the new version
    /// activated within the same write transaction.
    pub activate: bool,
}

impl Database {
    // ========================================================================
    // Version ledger
    // ========================================================================
    //
    // All mutations here run inside a single redb write transaction. redb
    // serializes writers, so concurrent restores on the same file cannot
    // interleave: after each commit exactly one version carries is_active.

    /// Append a version to a file's ledger.
    ///
    /// The version number is computed as max+1 over the surviving versions,
    /// never as a count, so deleting a middle version cannot cause a number
    /// to be reused. Returns `None` when the file does not exist.
    pub fn create_version(
        &self,
        file_id: &str,
        new: NewVersion,
    ) -> Result<Option<FileVersionRecord>, DatabaseError> {
        let now = Utc::now();
        let write_txn = self.begin_write()?;

        let file: Option<FileRecord> = {
            let table = write_txn.open_table(FILES)?;
            let result = match table.get(file_id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };
        let Some(mut file) = file else {
            return Ok(None);
        };

        let mut siblings = self.load_versions(&write_txn, file_id)?;
        let next_number = siblings
            .iter()
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
            + 1;

        let record = FileVersionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            file_id: file_id.to_string(),
            version_number: next_number,
            content_type: new.content_type,
            storage_path: new.storage_path,
            byte_size: new.byte_size,
            uploaded_by: new.uploaded_by,
            is_final: new.is_final,
            is_active: new.activate,
            created_at: now,
        };

        {
            let mut table = write_txn.open_table(VERSIONS)?;
            if record.is_active {
                for sibling in &mut siblings {
                    if sibling.is_active {
                        sibling.is_active = false;
                        let data = rmp_serde::to_vec_named(sibling)?;
                        table.insert(sibling.id.as_str(), data.as_slice())?;
                    }
                }
            }
            let data = rmp_serde::to_vec_named(&record)?;
            table.insert(record.id.as_str(), data.as_slice())?;
        }
        index_add(&write_txn, FILE_VERSIONS, file_id, &record.id)?;

        // The file row mirrors the active version's content fields
        if record.is_active {
            file.storage_path = record.storage_path.clone();
            file.byte_size = record.byte_size;
            file.updated_at = now;
            let serialized = rmp_serde::to_vec_named(&file)?;
            let mut table = write_txn.open_table(FILES)?;
            table.insert(file_id, serialized.as_slice())?;
        }

        write_txn.commit()?;
        Ok(Some(record))
    }

    /// Make the given version the file's active version, deactivating every
    /// sibling in the same write transaction. Returns `None` when the
    /// version does not exist.
    pub fn restore_version(
        &self,
        version_id: &str,
    ) -> Result<Option<FileVersionRecord>, DatabaseError> {
        let now = Utc::now();
        let write_txn = self.begin_write()?;

        let target: Option<FileVersionRecord> = {
            let table = write_txn.open_table(VERSIONS)?;
            let result = match table.get(version_id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };
        let Some(mut target) = target else {
            return Ok(None);
        };

        let mut siblings = self.load_versions(&write_txn, &target.file_id)?;
        {
            let mut table = write_txn.open_table(VERSIONS)?;
            for sibling in &mut siblings {
                if sibling.id != target.id && sibling.is_active {
                    sibling.is_active = false;
                    let data = rmp_serde::to_vec_named(sibling)?;
                    table.insert(sibling.id.as_str(), data.as_slice())?;
                }
            }
            target.is_active = true;
            let data = rmp_serde::to_vec_named(&target)?;
            table.insert(target.id.as_str(), data.as_slice())?;
        }

        let file: Option<FileRecord> = {
            let table = write_txn.open_table(FILES)?;
            let result = match table.get(target.file_id.as_str())? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };
        debug_assert!(file.is_some(), "version must belong to an existing file");
        if let Some(mut file) = file {
            file.storage_path = target.storage_path.clone();
            file.byte_size = target.byte_size;
            file.updated_at = now;
            let serialized = rmp_serde::to_vec_named(&file)?;
            let mut table = write_txn.open_table(FILES)?;
            table.insert(target.file_id.as_str(), serialized.as_slice())?;
        }

        write_txn.commit()?;
        Ok(Some(target))
    }

    /// Get a version by its UUID
    pub fn get_version(&self, id: &str) -> Result<Option<FileVersionRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(VERSIONS)?;

        match table.get(id)? {
            Some(data) => {
                let version: FileVersionRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(version))
            }
            None => Ok(None),
        }
    }

    /// List a file's versions, newest version number first
    pub fn list_versions(&self, file_id: &str) -> Result<Vec<FileVersionRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index = read_txn.open_table(FILE_VERSIONS)?;
        let table = read_txn.open_table(VERSIONS)?;

        let version_ids = read_index(&index, file_id)?;

        let mut versions = Vec::new();
        for version_id in version_ids {
            if let Some(data) = table.get(version_id.as_str())? {
                let version: FileVersionRecord = rmp_serde::from_slice(data.value())?;
                versions.push(version);
            }
        }

        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(versions)
    }

    /// The version currently designated as the file's servable content
    pub fn active_version(
        &self,
        file_id: &str,
    ) -> Result<Option<FileVersionRecord>, DatabaseError> {
        let versions = self.list_versions(file_id)?;
        Ok(versions.into_iter().find(|v| v.is_active))
    }

    /// Remove a version row from the ledger. The active version is refused;
    /// survivors keep their numbers (numbering is max+1, not count-based).
    /// Returns false when nothing was deleted.
    pub fn delete_version(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let version: Option<FileVersionRecord> = {
            let table = write_txn.open_table(VERSIONS)?;
            let result = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };

        let deleted = match version {
            Some(version) if !version.is_active => {
                {
                    let mut table = write_txn.open_table(VERSIONS)?;
                    table.remove(id)?;
                }
                index_remove(&write_txn, FILE_VERSIONS, &version.file_id, id)?;
                true
            }
            _ => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }

    /// Load every version of a file inside an open write transaction.
    fn load_versions(
        &self,
        write_txn: &redb::WriteTransaction,
        file_id: &str,
    ) -> Result<Vec<FileVersionRecord>, DatabaseError> {
        let version_ids = {
            let index = write_txn.open_table(FILE_VERSIONS)?;
            read_index(&index, file_id)?
        };

        let table = write_txn.open_table(VERSIONS)?;
        let mut versions = Vec::new();
        for version_id in &version_ids {
            if let Some(data) = table.get(version_id.as_str())? {
                versions.push(rmp_serde::from_slice::<FileVersionRecord>(data.value())?);
            }
        }
        Ok(versions)
    }
}
