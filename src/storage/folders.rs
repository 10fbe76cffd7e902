use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::FolderRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // Folder catalog
    // ========================================================================
    //
    // Folder/project/space CRUD is owned by the surrounding application; it
    // pushes catalog entries here so uploads can be authorized against the
    // folder's membership list and index documents can carry the containing
    // hierarchy names.

    /// Insert or replace a folder catalog record
    pub fn put_folder(&self, folder: &FolderRecord) -> Result<(), DatabaseError> {
        debug_assert!(!folder.id.is_empty(), "folder id must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(FOLDERS)?;
            let data = rmp_serde::to_vec_named(folder)?;
            table.insert(folder.id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a folder catalog record by its UUID
    pub fn get_folder(&self, id: &str) -> Result<Option<FolderRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FOLDERS)?;

        match table.get(id)? {
            Some(data) => {
                let folder: FolderRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(folder))
            }
            None => Ok(None),
        }
    }
}
