//! Errors from the user, group and taste store.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// Opened with a descriptor list that lacks this column family
    #[error("Missing column family: {0}")]
    MissingColumnFamily(String),

    #[error("Malformed index key: {0}")]
    MalformedKey(String),

    /// Stored record no longer matches its type
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// A unique index (such as a group's external id) is already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::CorruptRecord(err.to_string())
    }
}
