//! Application layer for gatekeeper
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{ASSESSMENT_STEP_GATE, AssessmentMode, EngineParams, GateCatalog};
pub use ports::{
    agent_invoker::{AgentInvoker, AgentRequest, AgentResponse, InvocationError},
    audit_sink::{AuditSink, LedgerError},
    escalation::{EscalationError, EscalationHandler, EscalationRequest, LogEscalation},
    lessons_repository::{LessonsRepository, RepositoryError},
    progress::{NoProgress, WorkflowProgressNotifier},
    rule_engine::{NoRuleEngine, RuleEngine},
    state_store::{StateStoreError, WorkflowStateStore},
};
pub use use_cases::assess_steps::{AssessError, AssessStepsUseCase};
pub use use_cases::feedback_collector::{CollectReport, FeedbackCollector};
pub use use_cases::ledger_recorder::{CallSite, LedgerRecorder, Usage};
pub use use_cases::quorum_gate::{
    ArtifactReviser, GateError, GateOutcome, GateRequest, QuorumGate, RevisionError,
};
pub use use_cases::run_workflow::{PhaseOutcome, WorkflowEngine, WorkflowError};
