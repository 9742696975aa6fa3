//! The two-stage intake pipeline: normalize, validate, orchestrate.

pub mod normalize;
pub mod processor;
pub mod semantic;
pub mod structural;
pub mod types;

pub use normalize::{normalize, NormalizationError, RawExtraction};
pub use processor::{Decision, DecisionOutcome, IntakeError, IntakeProcessor};
pub use semantic::validate_semantics;
pub use structural::validate_structure;
pub use types::{
    IssueKind, Severity, ValidationIssue, ValidationResult, ValidationStage, Verdict,
};
