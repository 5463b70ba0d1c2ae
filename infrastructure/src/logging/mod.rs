//! Decision ledger: one JSONL file per session plus a per-project index.
//!
//! Provides [`JsonlLedger`], which implements the
//! [`AuditSink`](gatekeeper_application::AuditSink) port, and the readers
//! used by `status` to find and replay the latest session.

mod jsonl_ledger;
mod session_index;

pub use jsonl_ledger::{JsonlLedger, WRITE_ATTEMPTS};
pub use session_index::{
    SessionIndex, SessionIndexEntry, audit_dir, latest_session, read_session_events,
    session_path,
};
