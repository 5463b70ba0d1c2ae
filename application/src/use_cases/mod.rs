//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod assess_steps;
pub mod feedback_collector;
pub mod ledger_recorder;
pub mod quorum_gate;
pub mod run_workflow;
