use redb::TableDefinition;

/// File records: uuid -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Folder catalog records: uuid -> FolderRecord (msgpack).
/// Written by the surrounding CRUD layer; consumed for authorization and
/// for the hierarchy names carried into index documents.
pub const FOLDERS: TableDefinition<&str, &[u8]> = TableDefinition::new("folders");

/// Folder index: folder_id -> msgpack Vec of file UUIDs
pub const FOLDER_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("folder_files");

/// Version records: uuid -> FileVersionRecord (msgpack)
pub const VERSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("versions");

/// Version index: file_id -> msgpack Vec of version UUIDs
pub const FILE_VERSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("file_versions");

/// Share records: uuid -> FileShareRecord (msgpack)
pub const SHARES: TableDefinition<&str, &[u8]> = TableDefinition::new("shares");

/// Share index: file_id -> msgpack Vec of share UUIDs
pub const FILE_SHARES: TableDefinition<&str, &[u8]> = TableDefinition::new("file_shares");

/// Share token index: token -> share uuid
pub const SHARE_TOKENS: TableDefinition<&str, &str> = TableDefinition::new("share_tokens");
