//! In-memory backends, used by tests and by callers that want a scratch
//! ledger without touching disk. Same contracts as the SQLite backends.

use uuid::Uuid;

use super::{AuditStore, BillStore, StorageError, StorageId};
use crate::audit::AuditEntry;
use crate::ledger::LedgerSnapshot;
use crate::models::BillRecord;

#[derive(Debug, Clone)]
struct StoredBill {
    record: BillRecord,
    session_id: Uuid,
    storage_id: StorageId,
}

/// Vec-backed [`BillStore`] with the same session-keyed idempotency as the
/// SQLite backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    rows: Vec<StoredBill>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BillStore for MemoryLedger {
    fn append(&mut self, record: &BillRecord, session_id: Uuid) -> Result<StorageId, StorageError> {
        if let Some(existing) = self.rows.iter().find(|row| row.session_id == session_id) {
            return Ok(existing.storage_id.clone());
        }
        let storage_id = StorageId(record.id.to_string());
        self.rows.push(StoredBill {
            record: record.clone(),
            session_id,
            storage_id: storage_id.clone(),
        });
        Ok(storage_id)
    }

    fn snapshot(&self) -> Result<LedgerSnapshot, StorageError> {
        Ok(LedgerSnapshot::new(
            self.rows.iter().map(|row| row.record.clone()).collect(),
        ))
    }

    fn len(&self) -> Result<usize, StorageError> {
        Ok(self.rows.len())
    }
}

/// Vec-backed [`AuditStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLog {
    entries: Vec<AuditEntry>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for MemoryAuditLog {
    fn append(&mut self, entry: &AuditEntry) -> Result<(), StorageError> {
        self.entries.push(entry.clone());
        Ok(())
    }

    fn last_sequence(&self) -> Result<u64, StorageError> {
        Ok(self.entries.last().map(|entry| entry.sequence).unwrap_or(0))
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, StorageError> {
        Ok(self.entries.clone())
    }
}
