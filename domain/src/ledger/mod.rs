//! Decision ledger domain: audit events, pricing and session summaries.
//!
//! Every append updates a [`SessionSummary`]; [`SessionSummary::replay`]
//! over the same events yields the same summary.

pub mod event;
pub mod pricing;
pub mod summary;

pub use event::{AuditEvent, EventKind, EventStatus, SUMMARY_MAX_BYTES};
pub use pricing::{DEFAULT_RATES, ModelRates, PricingTable};
pub use summary::SessionSummary;
