//! Confirmation state machine: one bill's journey from extraction to the
//! human verdict.
//!
//! A [`ConfirmationSession`] owns its record and validation history; nothing
//! outside [`ConfirmationSession::apply`] mutates either. Each applied event
//! consumes the session and returns the successor session plus the audit
//! draft describing the transition, so every state change is auditable by
//! construction. `Approved` and `Rejected` are terminal: replaying any event
//! against a terminal session is a [`ConflictError`], never a silent no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditDraft;
use crate::models::{AuditAction, BillRecord};
use crate::pipeline::types::{ValidationResult, ValidationStage};

// ---------------------------------------------------------------------------
// States, decisions, events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Extracted,
    StructurallyValidated,
    SemanticallyValidated,
    AwaitingHuman,
    Approved,
    Rejected,
    Edited,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Approved | SessionState::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Extracted => "extracted",
            SessionState::StructurallyValidated => "structurally_validated",
            SessionState::SemanticallyValidated => "semantically_validated",
            SessionState::AwaitingHuman => "awaiting_human",
            SessionState::Approved => "approved",
            SessionState::Rejected => "rejected",
            SessionState::Edited => "edited",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumanDecision {
    Pending,
    Approved,
    Rejected,
    EditedAndResubmitted,
}

/// Everything that can happen to a session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StructuralChecked(ValidationResult),
    SemanticChecked(ValidationResult),
    Presented,
    HumanApproved,
    HumanRejected { reason: Option<String> },
    HumanEdited { record: BillRecord },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::StructuralChecked(_) => "structural_checked",
            SessionEvent::SemanticChecked(_) => "semantic_checked",
            SessionEvent::Presented => "presented",
            SessionEvent::HumanApproved => "human_approved",
            SessionEvent::HumanRejected { .. } => "human_rejected",
            SessionEvent::HumanEdited { .. } => "human_edited",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConflictError {
    #[error("session {session_id} is terminal in state {state}; event {event} rejected")]
    TerminalSession {
        session_id: Uuid,
        state: &'static str,
        event: &'static str,
    },

    #[error("event {event} does not apply to session {session_id} in state {state}")]
    EventNotApplicable {
        session_id: Uuid,
        state: &'static str,
        event: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A successful transition: the successor session and its audit draft.
#[derive(Debug)]
pub struct Transition {
    pub session: ConfirmationSession,
    pub audit: AuditDraft,
}

/// Tracks one record's journey. Fields are private: the only way to change a
/// session is [`ConfirmationSession::apply`], and the validation history only
/// ever grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationSession {
    id: Uuid,
    record: BillRecord,
    state: SessionState,
    history: Vec<ValidationResult>,
    decision: HumanDecision,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConfirmationSession {
    pub fn open(record: BillRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            record,
            state: SessionState::Extracted,
            history: Vec::new(),
            decision: HumanDecision::Pending,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn record(&self) -> &BillRecord {
        &self.record
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &[ValidationResult] {
        &self.history
    }

    pub fn decision(&self) -> HumanDecision {
        self.decision
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Latest result for a stage, covering the current round of validation.
    pub fn stage_result(&self, stage: ValidationStage) -> Option<&ValidationResult> {
        self.history.iter().rev().find(|r| r.stage() == stage)
    }

    /// Apply one event, yielding the successor session and an audit draft.
    ///
    /// The transition table, in order of evaluation:
    /// - any event on a terminal session is a conflict;
    /// - `StructuralChecked` from `Extracted`/`Edited` advances on PASS and
    ///   halts in place on FAIL (the FAIL is recorded either way, and the
    ///   human may still edit or reject from the halt);
    /// - `SemanticChecked` from `StructurallyValidated` always advances, a
    ///   FAIL travels with the session for the human to see;
    /// - `Presented` moves `SemanticallyValidated` to `AwaitingHuman`;
    /// - `HumanApproved` only from `AwaitingHuman`;
    /// - `HumanRejected` from any non-terminal state;
    /// - `HumanEdited` from `Extracted`, `Edited` or `AwaitingHuman`, after
    ///   which re-validation is mandatory.
    pub fn apply(
        mut self,
        event: SessionEvent,
        now: DateTime<Utc>,
    ) -> Result<Transition, ConflictError> {
        if self.state.is_terminal() {
            return Err(ConflictError::TerminalSession {
                session_id: self.id,
                state: self.state.as_str(),
                event: event.name(),
            });
        }

        let before = self.state;
        let audit = match (self.state, event) {
            (
                SessionState::Extracted | SessionState::Edited,
                SessionEvent::StructuralChecked(result),
            ) => {
                self.accept_result(&result, ValidationStage::Structural)?;
                let action = if result.passed() {
                    self.state = SessionState::StructurallyValidated;
                    AuditAction::StructuralValidationPassed
                } else {
                    // Halt: the session keeps its state with the FAIL attached.
                    AuditAction::StructuralValidationFailed
                };
                let detail = issue_summary(&result);
                self.history.push(result);
                self.system_audit(action, before).with_detail(detail)
            }

            (SessionState::StructurallyValidated, SessionEvent::SemanticChecked(result)) => {
                self.accept_result(&result, ValidationStage::Semantic)?;
                let action = if result.passed() {
                    AuditAction::SemanticValidationPassed
                } else {
                    AuditAction::SemanticValidationFailed
                };
                self.state = SessionState::SemanticallyValidated;
                let detail = issue_summary(&result);
                self.history.push(result);
                self.system_audit(action, before).with_detail(detail)
            }

            (SessionState::SemanticallyValidated, SessionEvent::Presented) => {
                self.state = SessionState::AwaitingHuman;
                self.system_audit(AuditAction::ReviewPresented, before)
            }

            (SessionState::AwaitingHuman, SessionEvent::HumanApproved) => {
                self.state = SessionState::Approved;
                self.decision = HumanDecision::Approved;
                self.human_audit(AuditAction::UserConfirmed, before)
            }

            (_, SessionEvent::HumanRejected { reason }) => {
                self.state = SessionState::Rejected;
                self.decision = HumanDecision::Rejected;
                self.rejection_reason = reason.clone();
                self.human_audit(AuditAction::UserRejected, before)
                    .with_detail(serde_json::json!({ "reason": reason }))
            }

            (
                SessionState::Extracted | SessionState::Edited | SessionState::AwaitingHuman,
                SessionEvent::HumanEdited { mut record },
            ) => {
                // The edit replaces the fields, not the identity: the session
                // keeps tracking the same bill.
                record.id = self.record.id;
                let detail = serde_json::json!({
                    "before": &self.record,
                    "after": &record,
                });
                self.record = record;
                self.state = SessionState::Edited;
                self.decision = HumanDecision::EditedAndResubmitted;
                self.human_audit(AuditAction::UserEdited, before)
                    .with_detail(detail)
            }

            (_, event) => {
                return Err(ConflictError::EventNotApplicable {
                    session_id: self.id,
                    state: self.state.as_str(),
                    event: event.name(),
                })
            }
        };

        self.updated_at = now;
        Ok(Transition {
            session: self,
            audit,
        })
    }

    /// A validation result must describe this session's record.
    fn accept_result(
        &self,
        result: &ValidationResult,
        stage: ValidationStage,
    ) -> Result<(), ConflictError> {
        if result.record().id != self.record.id || result.stage() != stage {
            return Err(ConflictError::EventNotApplicable {
                session_id: self.id,
                state: self.state.as_str(),
                event: match stage {
                    ValidationStage::Structural => "structural_checked",
                    ValidationStage::Semantic => "semantic_checked",
                },
            });
        }
        Ok(())
    }

    fn system_audit(&self, action: AuditAction, before: SessionState) -> AuditDraft {
        AuditDraft::system(action, self.record.id.to_string(), self.id)
            .with_states(before.as_str(), self.state.as_str())
    }

    fn human_audit(&self, action: AuditAction, before: SessionState) -> AuditDraft {
        AuditDraft::human(action, self.record.id.to_string(), self.id)
            .with_states(before.as_str(), self.state.as_str())
    }
}

fn issue_summary(result: &ValidationResult) -> serde_json::Value {
    serde_json::json!({
        "verdict": result.verdict(),
        "blocking": result.blocking_issues().count(),
        "warnings": result.warnings().count(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Currency, LineItem, PaymentStatus};
    use crate::pipeline::types::{IssueKind, ValidationIssue};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn make_record() -> BillRecord {
        BillRecord {
            id: Uuid::new_v4(),
            vendor_name: "ABC Store".to_string(),
            issue_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1),
            due_date: None,
            currency: Currency::Inr,
            line_items: vec![LineItem {
                description: "Milk".to_string(),
                amount: Decimal::from_str("450.00").unwrap(),
            }],
            total_amount: Some(Decimal::from_str("450.00").unwrap()),
            subtotal: None,
            tax_amount: None,
            category: Category::Groceries,
            bill_number: None,
            payment_status: PaymentStatus::Unpaid,
            notes: None,
            source_image: None,
            confidence: 0.9,
            created_at: Utc::now(),
        }
    }

    fn pass(record: &BillRecord, stage: ValidationStage) -> ValidationResult {
        ValidationResult::new(record.clone(), stage, vec![])
    }

    fn fail(record: &BillRecord, stage: ValidationStage) -> ValidationResult {
        ValidationResult::new(
            record.clone(),
            stage,
            vec![ValidationIssue::blocking(
                "total_amount",
                IssueKind::Inconsistent,
                "does not add up",
            )],
        )
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    /// Drive a fresh session to `AwaitingHuman` through clean validations.
    fn session_awaiting_human() -> ConfirmationSession {
        let record = make_record();
        let session = ConfirmationSession::open(record.clone(), now());
        let session = session
            .apply(
                SessionEvent::StructuralChecked(pass(&record, ValidationStage::Structural)),
                now(),
            )
            .unwrap()
            .session;
        let session = session
            .apply(
                SessionEvent::SemanticChecked(pass(&record, ValidationStage::Semantic)),
                now(),
            )
            .unwrap()
            .session;
        session.apply(SessionEvent::Presented, now()).unwrap().session
    }

    // ── Happy path ──────────────────────────────────────────────────

    #[test]
    fn clean_validations_reach_awaiting_human() {
        let session = session_awaiting_human();
        assert_eq!(session.state(), SessionState::AwaitingHuman);
        assert_eq!(session.decision(), HumanDecision::Pending);
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn transitions_carry_state_labels_into_the_audit_draft() {
        let record = make_record();
        let session = ConfirmationSession::open(record.clone(), now());
        let transition = session
            .apply(
                SessionEvent::StructuralChecked(pass(&record, ValidationStage::Structural)),
                now(),
            )
            .unwrap();
        assert_eq!(
            transition.audit.action,
            AuditAction::StructuralValidationPassed
        );
        assert_eq!(transition.audit.before_state.as_deref(), Some("extracted"));
        assert_eq!(
            transition.audit.after_state.as_deref(),
            Some("structurally_validated")
        );
        assert_eq!(transition.audit.subject, record.id.to_string());
    }

    #[test]
    fn approval_is_terminal_and_records_the_decision() {
        let session = session_awaiting_human();
        let transition = session.apply(SessionEvent::HumanApproved, now()).unwrap();
        assert_eq!(transition.session.state(), SessionState::Approved);
        assert_eq!(transition.session.decision(), HumanDecision::Approved);
        assert_eq!(transition.audit.action, AuditAction::UserConfirmed);
    }

    // ── Stage-1 halt ────────────────────────────────────────────────

    #[test]
    fn structural_fail_halts_in_place_with_the_fail_recorded() {
        let record = make_record();
        let session = ConfirmationSession::open(record.clone(), now());
        let transition = session
            .apply(
                SessionEvent::StructuralChecked(fail(&record, ValidationStage::Structural)),
                now(),
            )
            .unwrap();
        assert_eq!(transition.session.state(), SessionState::Extracted);
        assert_eq!(transition.session.history().len(), 1);
        assert_eq!(
            transition.audit.action,
            AuditAction::StructuralValidationFailed
        );
    }

    #[test]
    fn halted_session_cannot_take_the_semantic_step() {
        let record = make_record();
        let session = ConfirmationSession::open(record.clone(), now());
        let session = session
            .apply(
                SessionEvent::StructuralChecked(fail(&record, ValidationStage::Structural)),
                now(),
            )
            .unwrap()
            .session;
        let err = session
            .apply(
                SessionEvent::SemanticChecked(pass(&record, ValidationStage::Semantic)),
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, ConflictError::EventNotApplicable { .. }));
    }

    // ── Stage-2 FAIL still reaches the human ────────────────────────

    #[test]
    fn semantic_fail_still_reaches_awaiting_human() {
        let record = make_record();
        let session = ConfirmationSession::open(record.clone(), now());
        let session = session
            .apply(
                SessionEvent::StructuralChecked(pass(&record, ValidationStage::Structural)),
                now(),
            )
            .unwrap()
            .session;
        let transition = session
            .apply(
                SessionEvent::SemanticChecked(fail(&record, ValidationStage::Semantic)),
                now(),
            )
            .unwrap();
        assert_eq!(
            transition.session.state(),
            SessionState::SemanticallyValidated
        );
        assert_eq!(
            transition.audit.action,
            AuditAction::SemanticValidationFailed
        );

        let session = transition
            .session
            .apply(SessionEvent::Presented, now())
            .unwrap()
            .session;
        assert_eq!(session.state(), SessionState::AwaitingHuman);
        assert!(!session
            .stage_result(ValidationStage::Semantic)
            .unwrap()
            .passed());
    }

    // ── Rejection ───────────────────────────────────────────────────

    #[test]
    fn rejection_works_from_any_non_terminal_state() {
        let builders: [fn() -> ConfirmationSession; 2] = [
            || ConfirmationSession::open(make_record(), now()),
            session_awaiting_human,
        ];
        for build in builders {
            let session = build();
            let transition = session
                .apply(
                    SessionEvent::HumanRejected {
                        reason: Some("wrong vendor".to_string()),
                    },
                    now(),
                )
                .unwrap();
            assert_eq!(transition.session.state(), SessionState::Rejected);
            assert_eq!(transition.session.decision(), HumanDecision::Rejected);
            assert_eq!(transition.session.rejection_reason(), Some("wrong vendor"));
            assert_eq!(transition.audit.action, AuditAction::UserRejected);
        }
    }

    // ── Terminal replay ─────────────────────────────────────────────

    #[test]
    fn every_event_conflicts_on_a_terminal_session() {
        let record = make_record();
        let approved = session_awaiting_human()
            .apply(SessionEvent::HumanApproved, now())
            .unwrap()
            .session;
        let rejected = ConfirmationSession::open(make_record(), now())
            .apply(SessionEvent::HumanRejected { reason: None }, now())
            .unwrap()
            .session;

        for terminal in [approved, rejected] {
            let events = vec![
                SessionEvent::StructuralChecked(pass(&record, ValidationStage::Structural)),
                SessionEvent::SemanticChecked(pass(&record, ValidationStage::Semantic)),
                SessionEvent::Presented,
                SessionEvent::HumanApproved,
                SessionEvent::HumanRejected { reason: None },
                SessionEvent::HumanEdited {
                    record: make_record(),
                },
            ];
            for event in events {
                let err = terminal.clone().apply(event, now()).unwrap_err();
                assert!(
                    matches!(err, ConflictError::TerminalSession { .. }),
                    "expected terminal conflict, got {err:?}"
                );
            }
        }
    }

    // ── Edit loop ───────────────────────────────────────────────────

    #[test]
    fn edit_from_awaiting_human_replaces_fields_but_keeps_identity() {
        let session = session_awaiting_human();
        let original_id = session.record().id;

        let mut edited = session.record().clone();
        edited.id = Uuid::new_v4(); // callers may hand over a fresh id
        edited.vendor_name = "ABC Stores Pvt Ltd".to_string();

        let transition = session
            .apply(SessionEvent::HumanEdited { record: edited }, now())
            .unwrap();
        assert_eq!(transition.session.state(), SessionState::Edited);
        assert_eq!(
            transition.session.decision(),
            HumanDecision::EditedAndResubmitted
        );
        assert_eq!(transition.session.record().id, original_id);
        assert_eq!(
            transition.session.record().vendor_name,
            "ABC Stores Pvt Ltd"
        );
        assert_eq!(transition.audit.action, AuditAction::UserEdited);
        assert!(transition.audit.detail["before"].is_object());
        assert!(transition.audit.detail["after"].is_object());
    }

    #[test]
    fn edited_session_revalidates_and_history_accumulates() {
        let session = session_awaiting_human();
        let edited = session.record().clone();
        let session = session
            .apply(SessionEvent::HumanEdited { record: edited }, now())
            .unwrap()
            .session;

        let record = session.record().clone();
        let session = session
            .apply(
                SessionEvent::StructuralChecked(pass(&record, ValidationStage::Structural)),
                now(),
            )
            .unwrap()
            .session;
        assert_eq!(session.state(), SessionState::StructurallyValidated);
        // Two from the first round, one from the rerun.
        assert_eq!(session.history().len(), 3);
    }

    #[test]
    fn edit_is_allowed_from_a_structural_halt() {
        let record = make_record();
        let session = ConfirmationSession::open(record.clone(), now());
        let session = session
            .apply(
                SessionEvent::StructuralChecked(fail(&record, ValidationStage::Structural)),
                now(),
            )
            .unwrap()
            .session;

        let mut fixed = session.record().clone();
        fixed.total_amount = Some(Decimal::from_str("450.00").unwrap());
        let transition = session
            .apply(SessionEvent::HumanEdited { record: fixed }, now())
            .unwrap();
        assert_eq!(transition.session.state(), SessionState::Edited);
    }

    // ── Out-of-order and mismatched events ──────────────────────────

    #[test]
    fn events_out_of_order_are_conflicts() {
        let record = make_record();
        let session = ConfirmationSession::open(record.clone(), now());
        for event in [
            SessionEvent::SemanticChecked(pass(&record, ValidationStage::Semantic)),
            SessionEvent::Presented,
            SessionEvent::HumanApproved,
        ] {
            let err = session.clone().apply(event, now()).unwrap_err();
            assert!(matches!(err, ConflictError::EventNotApplicable { .. }));
        }
    }

    #[test]
    fn a_result_for_another_record_is_rejected() {
        let record = make_record();
        let stranger = make_record();
        let session = ConfirmationSession::open(record, now());
        let err = session
            .apply(
                SessionEvent::StructuralChecked(pass(&stranger, ValidationStage::Structural)),
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, ConflictError::EventNotApplicable { .. }));
    }

    #[test]
    fn a_result_for_the_wrong_stage_is_rejected() {
        let record = make_record();
        let session = ConfirmationSession::open(record.clone(), now());
        let err = session
            .apply(
                SessionEvent::StructuralChecked(pass(&record, ValidationStage::Semantic)),
                now(),
            )
            .unwrap_err();
        assert!(matches!(err, ConflictError::EventNotApplicable { .. }));
    }

    // ── History is append-only ──────────────────────────────────────

    #[test]
    fn stage_result_returns_the_latest_round() {
        let session = session_awaiting_human();
        let edited = session.record().clone();
        let session = session
            .apply(SessionEvent::HumanEdited { record: edited }, now())
            .unwrap()
            .session;
        let record = session.record().clone();
        let session = session
            .apply(
                SessionEvent::StructuralChecked(fail(&record, ValidationStage::Structural)),
                now(),
            )
            .unwrap()
            .session;

        // The latest structural result is the FAIL from the rerun, while the
        // original PASS is still in the history.
        assert!(!session
            .stage_result(ValidationStage::Structural)
            .unwrap()
            .passed());
        assert_eq!(session.history().len(), 3);
        assert!(session.history()[0].passed());
    }
}
