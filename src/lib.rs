//! Hisab: a private household bill ledger with human-confirmed intake.
//!
//! Nothing enters the ledger without passing a two-stage validation pipeline
//! and an explicit human verdict, and nothing leaves it except through the
//! deterministic query engine. Every state change lands in a gap-free audit
//! trail.
//!
//! The flow, end to end:
//!
//! - [`pipeline::normalize`] turns a raw OCR extraction into a typed
//!   [`models::BillRecord`] without inventing data;
//! - [`pipeline::structural`] (Stage-1) checks the record in isolation and
//!   halts on blocking issues;
//! - [`pipeline::semantic`] (Stage-2) checks arithmetic honesty and duplicate
//!   suspects against a [`ledger::LedgerSnapshot`];
//! - [`review`] tracks the session through the human's verdict;
//! - [`pipeline::processor`] orchestrates all of it, persisting approved
//!   bills through [`storage`] and auditing every step via [`audit`];
//! - [`query`] plans and executes ledger questions, refusing anything it
//!   cannot answer faithfully.

pub mod audit;
pub mod config;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod review;
pub mod storage;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries and integration tests. Respects
/// `RUST_LOG`, with the crate default as fallback.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);
}
