//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure and presentation adapters
//! must implement.

pub mod agent_invoker;
pub mod audit_sink;
pub mod escalation;
pub mod lessons_repository;
pub mod progress;
pub mod rule_engine;
pub mod state_store;
