use redb::ReadableTable;

use super::db::{index_add, index_remove, read_index, Database, DatabaseError};
use super::models::{FileShareRecord, ShareStatus};
use super::tables::*;

impl Database {
    // ========================================================================
    // Share grants
    // ========================================================================

    /// Store a share grant and update the token and per-file indexes
    pub fn put_share(&self, share: &FileShareRecord) -> Result<(), DatabaseError> {
        debug_assert!(!share.token.is_empty(), "share token must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(SHARES)?;
            let data = rmp_serde::to_vec_named(share)?;
            table.insert(share.id.as_str(), data.as_slice())?;

            let mut tokens = write_txn.open_table(SHARE_TOKENS)?;
            tokens.insert(share.token.as_str(), share.id.as_str())?;
        }
        index_add(&write_txn, FILE_SHARES, &share.file_id, &share.id)?;
        write_txn.commit()?;
        Ok(())
    }

    /// Get a share by its UUID
    pub fn get_share(&self, id: &str) -> Result<Option<FileShareRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SHARES)?;

        match table.get(id)? {
            Some(data) => {
                let share: FileShareRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(share))
            }
            None => Ok(None),
        }
    }

    /// Get a share by its capability token (resolves token -> uuid -> share)
    pub fn get_share_by_token(
        &self,
        token: &str,
    ) -> Result<Option<FileShareRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let tokens = read_txn.open_table(SHARE_TOKENS)?;

        let id = match tokens.get(token)? {
            Some(data) => data.value().to_string(),
            None => return Ok(None),
        };

        let table = read_txn.open_table(SHARES)?;
        match table.get(id.as_str())? {
            Some(data) => {
                let share: FileShareRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(share))
            }
            None => Ok(None),
        }
    }

    /// List all shares granted on a file
    pub fn list_shares_for_file(
        &self,
        file_id: &str,
    ) -> Result<Vec<FileShareRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let index = read_txn.open_table(FILE_SHARES)?;
        let table = read_txn.open_table(SHARES)?;

        let share_ids = read_index(&index, file_id)?;

        let mut shares = Vec::new();
        for share_id in share_ids {
            if let Some(data) = table.get(share_id.as_str())? {
                let share: FileShareRecord = rmp_serde::from_slice(data.value())?;
                shares.push(share);
            }
        }

        Ok(shares)
    }

    /// Transition a share's status (active -> revoked, or lazy active ->
    /// expired at read time). Returns the updated share, or None if absent.
    pub fn update_share_status(
        &self,
        id: &str,
        status: ShareStatus,
    ) -> Result<Option<FileShareRecord>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let existing: Option<FileShareRecord> = {
            let table = write_txn.open_table(SHARES)?;
            let result = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };

        let updated = match existing {
            Some(mut share) => {
                share.status = status;
                let data = rmp_serde::to_vec_named(&share)?;
                let mut table = write_txn.open_table(SHARES)?;
                table.insert(id, data.as_slice())?;
                Some(share)
            }
            None => None,
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// Hard-delete a share row and its index entries (cleanup only; normal
    /// revocation is a status transition)
    pub fn delete_share(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let share: Option<FileShareRecord> = {
            let table = write_txn.open_table(SHARES)?;
            let result = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };

        let deleted = match share {
            Some(share) => {
                {
                    let mut table = write_txn.open_table(SHARES)?;
                    table.remove(id)?;
                }
                {
                    let mut tokens = write_txn.open_table(SHARE_TOKENS)?;
                    tokens.remove(share.token.as_str())?;
                }
                index_remove(&write_txn, FILE_SHARES, &share.file_id, id)?;
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }
}
