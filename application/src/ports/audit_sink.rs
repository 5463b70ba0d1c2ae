//! Port for the append-only decision ledger.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while the ledger records every agent call,
//! vote, transition and escalation in a machine-readable form (JSONL).
//!
//! Unlike operation logs, ledger writes are fallible and callers propagate
//! the error.

use gatekeeper_domain::{AuditEvent, SessionSummary};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger write failed after {attempts} attempts: {message}")]
    Write { attempts: u32, message: String },

    #[error("Failed to encode event: {0}")]
    Encode(String),

    #[error("Ledger index error: {0}")]
    Index(String),
}

pub trait AuditSink: Send + Sync {
    fn session_id(&self) -> &str;

    fn project_id(&self) -> &str;

    /// Append one event and fold it into the running summary.
    fn append(&self, event: AuditEvent) -> Result<(), LedgerError>;

    /// Snapshot of the running summary.
    fn summary(&self) -> SessionSummary;

    /// Write the session end marker and final index statistics.
    fn finalize(&self) -> Result<SessionSummary, LedgerError>;
}
