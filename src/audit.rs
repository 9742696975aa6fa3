//! Append-only audit log of every state transition and query execution.
//!
//! Every mutation of a confirmation session and every answered or rejected
//! question produces an entry here. The sequence number is the sole ordering
//! key: it is assigned at write time, advances only when the sink accepts the
//! entry, and is never reused or skipped, so a gap in stored sequence numbers
//! can only mean tampering or data loss, never normal operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Actor, AuditAction};
use crate::storage::{AuditStore, StorageError};

#[derive(Error, Debug)]
pub enum AuditWriteError {
    #[error("audit log is unwritable: {0}")]
    Unwritable(#[from] StorageError),
}

// ---------------------------------------------------------------------------
// Draft and entry
// ---------------------------------------------------------------------------

/// An audit entry before it has a sequence number or timestamp.
///
/// Produced by the components that cause auditable events; only the
/// [`AuditLog`] turns a draft into a numbered [`AuditEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditDraft {
    pub actor: Actor,
    pub action: AuditAction,
    /// What the entry is about, usually a record id.
    pub subject: String,
    /// Groups entries of one session or one query exchange.
    pub correlation_id: Uuid,
    pub before_state: Option<String>,
    pub after_state: Option<String>,
    pub detail: serde_json::Value,
}

impl AuditDraft {
    pub fn system(action: AuditAction, subject: impl Into<String>, correlation_id: Uuid) -> Self {
        Self {
            actor: Actor::System,
            action,
            subject: subject.into(),
            correlation_id,
            before_state: None,
            after_state: None,
            detail: serde_json::Value::Null,
        }
    }

    pub fn human(action: AuditAction, subject: impl Into<String>, correlation_id: Uuid) -> Self {
        Self {
            actor: Actor::Human,
            ..Self::system(action, subject, correlation_id)
        }
    }

    pub fn with_states(
        mut self,
        before: impl Into<String>,
        after: impl Into<String>,
    ) -> Self {
        self.before_state = Some(before.into());
        self.after_state = Some(after.into());
        self
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// One committed line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub action: AuditAction,
    pub subject: String,
    pub correlation_id: Uuid,
    pub before_state: Option<String>,
    pub after_state: Option<String>,
    pub detail: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Sequencing writer over an [`AuditStore`] sink.
pub struct AuditLog {
    sink: Box<dyn AuditStore>,
    next_sequence: u64,
}

impl AuditLog {
    /// Opens the log, resuming numbering after whatever the sink last stored.
    pub fn new(sink: Box<dyn AuditStore>) -> Result<Self, AuditWriteError> {
        let next_sequence = sink.last_sequence()? + 1;
        Ok(Self {
            sink,
            next_sequence,
        })
    }

    /// Stamp a draft with the next sequence number and append it.
    ///
    /// The counter advances only after the sink accepts the entry, so a
    /// failed append leaves the numbering untouched and a retry produces a
    /// gap-free log.
    pub fn record(&mut self, draft: AuditDraft) -> Result<AuditEntry, AuditWriteError> {
        let entry = AuditEntry {
            sequence: self.next_sequence,
            timestamp: Utc::now(),
            actor: draft.actor,
            action: draft.action,
            subject: draft.subject,
            correlation_id: draft.correlation_id,
            before_state: draft.before_state,
            after_state: draft.after_state,
            detail: draft.detail,
        };
        self.sink.append(&entry)?;
        self.next_sequence += 1;

        tracing::info!(
            sequence = entry.sequence,
            actor = entry.actor.as_str(),
            action = entry.action.as_str(),
            subject = %entry.subject,
            correlation_id = %entry.correlation_id,
            "Audit entry recorded"
        );
        Ok(entry)
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn entries(&self) -> Result<Vec<AuditEntry>, AuditWriteError> {
        Ok(self.sink.entries()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
