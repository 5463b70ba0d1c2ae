//! Progress notification port
//!
//! Defines the interface for reporting progress while a workflow runs.

use super::escalation::EscalationRequest;
use gatekeeper_domain::{Abstention, GateResult, StepReport, Vote, WorkflowPhase};

/// Callback for progress updates during a workflow run
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (spinners, plain lines, etc.)
pub trait WorkflowProgressNotifier: Send + Sync {
    /// Called when a phase starts
    fn on_phase_start(&self, _phase: WorkflowPhase) {}

    /// Called when a phase ends, whatever the outcome
    fn on_phase_complete(&self, _phase: WorkflowPhase, _success: bool) {}

    // ==================== Gate Callbacks ====================

    /// Called before a gate collects votes. `attempt` is 1-based.
    fn on_gate_attempt(&self, _gate_id: &str, _attempt: u32, _max_attempts: u32) {}

    fn on_vote_cast(&self, _gate_id: &str, _vote: &Vote) {}

    fn on_abstention(&self, _gate_id: &str, _abstention: &Abstention) {}

    fn on_gate_result(&self, _result: &GateResult) {}

    fn on_escalation(&self, _request: &EscalationRequest) {}

    // ==================== Assessment Callbacks ====================

    fn on_step_start(&self, _step: &str) {}

    fn on_step_complete(&self, _report: &StepReport) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl WorkflowProgressNotifier for NoProgress {}
