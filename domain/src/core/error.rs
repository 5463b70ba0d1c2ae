//! Domain error types

use crate::workflow::WorkflowPhase;
use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("phase {0} is terminal and cannot advance")]
    TerminalPhase(WorkflowPhase),

    #[error("unknown phase: {0}")]
    UnknownPhase(String),

    #[error("gate {0} has no voters configured")]
    NoVoters(String),

    #[error("invalid quorum rule: {0}")]
    InvalidRule(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}
