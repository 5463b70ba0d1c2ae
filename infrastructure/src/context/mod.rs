//! Source tree scanning for the ingest workflow.
//!
//! [`SourceScanner`] walks a codebase once and turns what it finds into an
//! [`AssessmentContext`](gatekeeper_domain::AssessmentContext): facts that
//! gate conditional rules (`has_tests`, `has_database`, ...) and a short
//! summary handed to every assessor agent.

mod scanner;

pub use scanner::{ScanError, SourceScan, SourceScanner};
