//! Escalation port for gates that exhausted their revisions.
//!
//! # Flow
//!
//! ```text
//! Gate REJECTED (attempt 1) -> revise
//!        ↓
//! Gate REJECTED (attempt N+1)
//!        ↓
//! workflow moves to `escalated`
//!        ↓
//! EscalationHandler::escalate()
//! ```
//!
//! The workflow stays resumable: a human looks at the feedback and resumes
//! the project, which re-runs the gate.
//!
//! # Built-in Implementations
//!
//! - [`LogEscalation`] - emits a `warn!` and returns
//!
//! For interactive use, see `ConsoleEscalation` in the presentation layer.

use async_trait::async_trait;
use gatekeeper_domain::WorkflowPhase;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone)]
pub enum EscalationError {
    #[error("Escalation delivery failed: {0}")]
    Delivery(String),
}

/// Everything a human needs to pick up an escalated gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationRequest {
    pub project_id: String,
    pub phase: WorkflowPhase,
    pub gate_id: String,
    pub attempts: u32,
    pub reason: String,
    /// Aggregated feedback of the last attempt (markdown).
    pub feedback: String,
}

#[async_trait]
pub trait EscalationHandler: Send + Sync {
    async fn escalate(&self, request: &EscalationRequest) -> Result<(), EscalationError>;
}

pub struct LogEscalation;

#[async_trait]
impl EscalationHandler for LogEscalation {
    async fn escalate(&self, request: &EscalationRequest) -> Result<(), EscalationError> {
        warn!(
            project = %request.project_id,
            phase = %request.phase,
            gate = %request.gate_id,
            attempts = request.attempts,
            "Escalated to human review: {}",
            request.reason
        );
        Ok(())
    }
}
