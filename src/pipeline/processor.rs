//! Intake orchestrator: one raw extraction in, one audited session out.
//!
//! [`IntakeProcessor`] owns the store and the audit writer and drives the
//! whole journey: normalize, Stage-1, Stage-2 against a snapshot, present,
//! human decision, persist. Every transition lands in the audit log before
//! the caller sees the new session; persistence of an approved session is
//! idempotent by session id, so a failed save can be retried without ever
//! double-writing.

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use super::normalize::{normalize, NormalizationError, RawExtraction};
use super::semantic::validate_semantics;
use super::structural::validate_structure;
use crate::audit::{AuditDraft, AuditLog, AuditWriteError};
use crate::ledger::LedgerSnapshot;
use crate::models::{AuditAction, BillRecord};
use crate::query::{self, QueryIntent, QueryResult, UnsupportedQueryError};
use crate::review::{
    ConfirmationSession, ConflictError, SessionEvent, SessionState, Transition,
};
use crate::storage::{AuditStore, BillStore, StorageError, StorageId};

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    UnsupportedQuery(#[from] UnsupportedQueryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Audit(#[from] AuditWriteError),

    /// The approved session could not be persisted. It rides along in the
    /// error so the caller can hold it and retry [`IntakeProcessor::finalize`].
    #[error("persisting approved session {} failed: {reason}", .session.id())]
    PersistenceFailure {
        session: Box<ConfirmationSession>,
        reason: String,
    },
}

/// The human's verdict on a session awaiting review.
#[derive(Debug, Clone)]
pub enum Decision {
    Approve,
    Reject { reason: Option<String> },
    Edit { record: BillRecord },
}

/// What a decision produced: the successor session, and the storage id when
/// the decision ended in a persisted bill.
#[derive(Debug)]
pub struct DecisionOutcome {
    pub session: ConfirmationSession,
    pub storage_id: Option<StorageId>,
}

pub struct IntakeProcessor {
    store: Box<dyn BillStore>,
    audit: AuditLog,
}

impl IntakeProcessor {
    pub fn new(store: Box<dyn BillStore>, sink: Box<dyn AuditStore>) -> Result<Self, IntakeError> {
        Ok(Self {
            store,
            audit: AuditLog::new(sink)?,
        })
    }

    /// Take one raw extraction through normalization and both validation
    /// stages. The returned session is `AwaitingHuman` when everything
    /// advanced, or halted in place with the failed Stage-1 result attached.
    ///
    /// `source` names the scanned image when the extraction itself carries no
    /// reference.
    pub fn ingest(
        &mut self,
        raw: &RawExtraction,
        source: Option<String>,
    ) -> Result<ConfirmationSession, IntakeError> {
        // Normalization failure means no record could be formed; there is no
        // session to audit against, the error is the whole story.
        let mut record = normalize(raw)?;
        if record.source_image.is_none() {
            record.source_image = source;
        }

        let session = ConfirmationSession::open(record, Utc::now());
        self.audit.record(
            AuditDraft::system(
                AuditAction::ExtractionNormalized,
                session.record().id.to_string(),
                session.id(),
            )
            .with_detail(json!({
                "vendor": session.record().vendor_name,
                "confidence": session.record().confidence,
            })),
        )?;
        tracing::info!(
            session_id = %session.id(),
            vendor = %session.record().vendor_name,
            "Extraction normalized, session opened"
        );

        self.run_validations(session)
    }

    /// Apply the human's verdict. Approval persists the bill; an edit
    /// re-enters validation with the corrected record, per the mandatory
    /// re-validation rule.
    pub fn decide(
        &mut self,
        session: ConfirmationSession,
        decision: Decision,
    ) -> Result<DecisionOutcome, IntakeError> {
        match decision {
            Decision::Approve => {
                let session = self.apply_audited(session, SessionEvent::HumanApproved)?;
                self.finalize(session)
            }
            Decision::Reject { reason } => {
                let session =
                    self.apply_audited(session, SessionEvent::HumanRejected { reason })?;
                Ok(DecisionOutcome {
                    session,
                    storage_id: None,
                })
            }
            Decision::Edit { record } => {
                let session = self.apply_audited(session, SessionEvent::HumanEdited { record })?;
                let session = self.run_validations(session)?;
                Ok(DecisionOutcome {
                    session,
                    storage_id: None,
                })
            }
        }
    }

    /// Persist an approved session and audit the save. Retry-safe: the store
    /// keys rows by session id, so a second call after a failure can never
    /// double-write.
    pub fn finalize(
        &mut self,
        session: ConfirmationSession,
    ) -> Result<DecisionOutcome, IntakeError> {
        if session.state() != SessionState::Approved {
            return Err(ConflictError::EventNotApplicable {
                session_id: session.id(),
                state: session.state().as_str(),
                event: "finalize",
            }
            .into());
        }

        match self.store.append(session.record(), session.id()) {
            Ok(storage_id) => {
                self.audit.record(
                    AuditDraft::system(
                        AuditAction::BillSaved,
                        session.record().id.to_string(),
                        session.id(),
                    )
                    .with_detail(json!({ "storage_id": storage_id.to_string() })),
                )?;
                tracing::info!(
                    session_id = %session.id(),
                    storage_id = %storage_id,
                    "Approved bill persisted"
                );
                Ok(DecisionOutcome {
                    session,
                    storage_id: Some(storage_id),
                })
            }
            Err(e) => {
                let reason = e.to_string();
                self.audit.record(
                    AuditDraft::system(
                        AuditAction::SaveFailed,
                        session.record().id.to_string(),
                        session.id(),
                    )
                    .with_detail(json!({ "reason": reason })),
                )?;
                tracing::error!(
                    session_id = %session.id(),
                    reason = %reason,
                    "Persisting approved bill failed; session held for retry"
                );
                Err(IntakeError::PersistenceFailure {
                    session: Box::new(session),
                    reason,
                })
            }
        }
    }

    /// Answer a query intent against the current ledger. Planning and
    /// execution are audited under one correlation id.
    pub fn answer(&mut self, intent: &QueryIntent) -> Result<QueryResult, IntakeError> {
        let correlation_id = Uuid::new_v4();
        let snapshot = self.store.snapshot()?;

        let plan = match query::plan(intent, &snapshot) {
            Ok(plan) => {
                self.audit.record(
                    AuditDraft::system(
                        AuditAction::QueryPlanned,
                        intent.operation.clone(),
                        correlation_id,
                    )
                    .with_detail(json!({
                        "operation": plan.operation().as_str(),
                        "filters": plan.filters().len(),
                        "group_by": plan.group_by().map(|g| g.as_str()),
                    })),
                )?;
                plan
            }
            Err(e) => {
                self.audit.record(
                    AuditDraft::system(
                        AuditAction::QueryRejected,
                        intent.operation.clone(),
                        correlation_id,
                    )
                    .with_detail(json!({ "reason": e.to_string() })),
                )?;
                tracing::warn!(operation = %intent.operation, error = %e, "Query intent refused");
                return Err(e.into());
            }
        };

        let result = query::execute(&plan, &snapshot);
        self.audit.record(
            AuditDraft::system(
                AuditAction::QueryExecuted,
                intent.operation.clone(),
                correlation_id,
            )
            .with_detail(json!({ "matched": result.matched() })),
        )?;
        Ok(result)
    }

    /// Point-in-time view of the ledger.
    pub fn snapshot(&self) -> Result<LedgerSnapshot, IntakeError> {
        Ok(self.store.snapshot()?)
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    // -----------------------------------------------------------------------

    /// Stage-1, then Stage-2 against one snapshot, then presentation. A
    /// Stage-1 FAIL halts with the result attached; a Stage-2 FAIL still
    /// reaches the human.
    fn run_validations(
        &mut self,
        session: ConfirmationSession,
    ) -> Result<ConfirmationSession, IntakeError> {
        let today = Utc::now().date_naive();
        let result = validate_structure(session.record(), today);
        let halted = !result.passed();
        let session = self.apply_audited(session, SessionEvent::StructuralChecked(result))?;
        if halted {
            return Ok(session);
        }

        let snapshot = self.store.snapshot()?;
        let result = validate_semantics(session.record(), &snapshot);
        let session = self.apply_audited(session, SessionEvent::SemanticChecked(result))?;
        self.apply_audited(session, SessionEvent::Presented)
    }

    fn apply_audited(
        &mut self,
        session: ConfirmationSession,
        event: SessionEvent,
    ) -> Result<ConfirmationSession, IntakeError> {
        let Transition { session, audit } = session.apply(event, Utc::now())?;
        self.audit.record(audit)?;
        Ok(session)
    }
}
