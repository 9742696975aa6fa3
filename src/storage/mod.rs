pub mod memory;
pub mod sqlite;

pub use memory::{MemoryAuditLog, MemoryLedger};
pub use sqlite::{open_database, open_memory_database, sqlite_stores, SqliteAuditLog, SqliteLedger};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditEntry;
use crate::ledger::LedgerSnapshot;
use crate::models::BillRecord;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Record not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Corrupt stored value for {field}: {reason}")]
    CorruptValue { field: String, reason: String },

    #[error("Storage connection lock poisoned")]
    LockPoisoned,
}

/// Opaque identifier a backend assigns to a persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageId(pub String);

impl std::fmt::Display for StorageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append-only store of approved bill records.
///
/// `append` is keyed by the confirmation session id: retrying a failed
/// persistence with the same session returns the already-stored id instead of
/// writing a second row. That property is what makes pending-persist retries
/// safe.
pub trait BillStore {
    fn append(&mut self, record: &BillRecord, session_id: Uuid) -> Result<StorageId, StorageError>;

    /// Point-in-time copy of every stored record, in insertion order.
    fn snapshot(&self) -> Result<LedgerSnapshot, StorageError>;

    fn len(&self) -> Result<usize, StorageError>;

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

/// Append-only sink for audit entries.
pub trait AuditStore {
    fn append(&mut self, entry: &AuditEntry) -> Result<(), StorageError>;

    /// Highest sequence number persisted so far; 0 when the log is empty.
    fn last_sequence(&self) -> Result<u64, StorageError>;

    /// All entries in sequence order.
    fn entries(&self) -> Result<Vec<AuditEntry>, StorageError>;
}
