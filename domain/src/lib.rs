//! Domain layer for gatekeeper
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Workflow
//!
//! A project moves through a fixed graph of [`WorkflowPhase`]s. Every phase
//! has a [`PhaseKind`]: production phases ask one agent for an artifact,
//! review phases put that artifact in front of a quorum gate.
//!
//! ## Quorum gate
//!
//! Reviewers vote pass or fail. A gate passes when the pass votes reach the
//! [`QuorumRule`] threshold; reviewers that could not answer abstain.
//!
//! ## Lessons
//!
//! Concerns from rejected gates become [`Lesson`]s, and lessons that keep
//! recurring are promoted to deterministic [`Rule`]s.
//!
//! ## Ledger
//!
//! Every agent call, vote, transition and escalation is an [`AuditEvent`].

pub mod assessment;
pub mod core;
pub mod ledger;
pub mod lessons;
pub mod prompt;
pub mod quorum;
pub mod workflow;

pub use assessment::{
    AssessmentContext, AssessmentOutcome, AssessmentReport, Finding, FindingSource, STEP_NAMES,
    Severity, StepAssessment, StepProfile, StepReport, StepStatus, merge_findings,
    parse_assessment, step_profile,
};
pub use core::error::DomainError;
pub use ledger::{
    AuditEvent, EventKind, EventStatus, ModelRates, PricingTable, SUMMARY_MAX_BYTES,
    SessionSummary,
};
pub use lessons::{
    ConcernKind, ConcernRecord, FORMAT_SCOPE, LearningPolicy, Lesson, LessonGuidance,
    LessonUpdate, LessonsDocument, LessonsStats, Rule, RuleTrigger, best_correction,
    seed_builtin_rules,
};
pub use prompt::{AssessmentPromptTemplate, GatePromptTemplate, PhasePromptTemplate};
pub use quorum::{
    AbstainReason, Abstention, Ballot, DEFAULT_MAX_RETRIES, FeedbackDocument, GateConfig,
    GateKind, GateResult, ParseOutcome, Provenance, QuorumRule, Verdict, Vote,
    parse_vote_response,
};
pub use workflow::{
    Decision, PhaseKind, TerminalKind, WorkflowMode, WorkflowPhase, WorkflowState,
};
