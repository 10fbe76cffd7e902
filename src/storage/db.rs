use redb::{
    Database as RedbDatabase, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::tables::*;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("Database error: {0}")]
    Redb(Box<redb::Error>),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
}

impl From<redb::CommitError> for DatabaseError {
    fn from(e: redb::CommitError) -> Self {
        DatabaseError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for DatabaseError {
    fn from(e: redb::DatabaseError) -> Self {
        DatabaseError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::Error> for DatabaseError {
    fn from(e: redb::Error) -> Self {
        DatabaseError::Redb(Box::new(e))
    }
}

impl From<redb::StorageError> for DatabaseError {
    fn from(e: redb::StorageError) -> Self {
        DatabaseError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for DatabaseError {
    fn from(e: redb::TableError) -> Self {
        DatabaseError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for DatabaseError {
    fn from(e: redb::TransactionError) -> Self {
        DatabaseError::Transaction(Box::new(e))
    }
}

pub struct Database {
    db: Arc<RedbDatabase>,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

/// Statistics from a purge operation
#[derive(Debug, Default)]
pub struct PurgeStats {
    pub files: u64,
    pub versions: u64,
    pub shares: u64,
    pub folders: u64,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("doc-vault.redb");
        let db = Arc::new(RedbDatabase::create(db_path)?);

        // Initialize application tables
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(FILES)?;
            let _ = write_txn.open_table(FOLDERS)?;
            let _ = write_txn.open_table(FOLDER_FILES)?;
            let _ = write_txn.open_table(VERSIONS)?;
            let _ = write_txn.open_table(FILE_VERSIONS)?;
            let _ = write_txn.open_table(SHARES)?;
            let _ = write_txn.open_table(FILE_SHARES)?;
            let _ = write_txn.open_table(SHARE_TOKENS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    // ========================================================================
    // Admin operations
    // ========================================================================

    /// Purge all data - for testing only
    pub fn purge_all(&self) -> Result<PurgeStats, DatabaseError> {
        let write_txn = self.begin_write()?;

        let stats = PurgeStats {
            files: clear_record_table(&write_txn, FILES)?,
            versions: clear_record_table(&write_txn, VERSIONS)?,
            shares: clear_record_table(&write_txn, SHARES)?,
            folders: clear_record_table(&write_txn, FOLDERS)?,
        };

        clear_record_table(&write_txn, FOLDER_FILES)?;
        clear_record_table(&write_txn, FILE_VERSIONS)?;
        clear_record_table(&write_txn, FILE_SHARES)?;

        // Token index has string values, handled separately
        {
            let table = write_txn.open_table(SHARE_TOKENS)?;
            let keys: Vec<String> = table
                .iter()?
                .map(|r| r.map(|(k, _)| k.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            drop(table);

            let mut table = write_txn.open_table(SHARE_TOKENS)?;
            for key in keys {
                table.remove(key.as_str())?;
            }
        }

        write_txn.commit()?;
        Ok(stats)
    }
}

// ============================================================================
// Index helpers shared by the storage submodules
// ============================================================================

/// Read a msgpack Vec-of-ids index entry; missing keys yield an empty list.
pub(super) fn read_index<T>(table: &T, key: &str) -> Result<Vec<String>, DatabaseError>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    Ok(table
        .get(key)?
        .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
        .unwrap_or_default())
}

/// Append an id to a Vec-of-ids index entry if not already present.
pub(super) fn index_add(
    write_txn: &WriteTransaction,
    definition: TableDefinition<&str, &[u8]>,
    key: &str,
    id: &str,
) -> Result<(), DatabaseError> {
    let mut table = write_txn.open_table(definition)?;
    let mut ids: Vec<String> = table
        .get(key)?
        .map(|v| rmp_serde::from_slice(v.value()).unwrap_or_default())
        .unwrap_or_default();

    if !ids.iter().any(|existing| existing == id) {
        ids.push(id.to_string());
        let data = rmp_serde::to_vec_named(&ids)?;
        table.insert(key, data.as_slice())?;
    }
    Ok(())
}

/// Drop an id from a Vec-of-ids index entry, removing the entry when empty.
pub(super) fn index_remove(
    write_txn: &WriteTransaction,
    definition: TableDefinition<&str, &[u8]>,
    key: &str,
    id: &str,
) -> Result<(), DatabaseError> {
    let mut table = write_txn.open_table(definition)?;
    let ids: Option<Vec<String>> = match table.get(key)? {
        Some(data) => Some(rmp_serde::from_slice(data.value())?),
        None => None,
    };

    if let Some(mut ids) = ids {
        ids.retain(|existing| existing != id);
        if ids.is_empty() {
            table.remove(key)?;
        } else {
            let data = rmp_serde::to_vec_named(&ids)?;
            table.insert(key, data.as_slice())?;
        }
    }
    Ok(())
}

/// Remove every entry of a msgpack-valued table, returning the count.
fn clear_record_table(
    write_txn: &WriteTransaction,
    definition: TableDefinition<&str, &[u8]>,
) -> Result<u64, DatabaseError> {
    let table = write_txn.open_table(definition)?;
    let keys: Vec<String> = table
        .iter()?
        .map(|r| r.map(|(k, _)| k.value().to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    drop(table);

    let mut table = write_txn.open_table(definition)?;
    let mut removed = 0;
    for key in keys {
        table.remove(key.as_str())?;
        removed += 1;
    }
    Ok(removed)
}
