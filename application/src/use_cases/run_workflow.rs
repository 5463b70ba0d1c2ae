//! Run Workflow use case
//!
//! The phase state machine. Each call to [`WorkflowEngine::run_phase`]
//! dispatches on the current phase's [`PhaseKind`]:
//!
//! ```text
//! Production  ── invoke agent ──▶ store artifact ──▶ advance
//! Assessment  ── parallel steps (each gated) ──▶ store report ──▶ advance
//! Review      ── quorum gate + producer revisions ──▶ advance | escalated
//! Terminal    ── no-op
//! ```
//!
//! Cancellation is checked before every phase. A phase that already started
//! runs to the end of its current step and its results are kept.

use crate::config::{ASSESSMENT_STEP_GATE, EngineParams, GateCatalog};
use crate::ports::agent_invoker::{AgentInvoker, AgentRequest};
use crate::ports::audit_sink::LedgerError;
use crate::ports::escalation::{EscalationError, EscalationHandler, EscalationRequest, LogEscalation};
use crate::ports::progress::{NoProgress, WorkflowProgressNotifier};
use crate::ports::rule_engine::{NoRuleEngine, RuleEngine};
use crate::ports::state_store::{StateStoreError, WorkflowStateStore};
use crate::use_cases::assess_steps::{AssessError, AssessStepsUseCase};
use crate::use_cases::feedback_collector::FeedbackCollector;
use crate::use_cases::ledger_recorder::{CallSite, LedgerRecorder};
use crate::use_cases::quorum_gate::{
    ArtifactReviser, GateError, GateOutcome, GateRequest, QuorumGate, RevisionError,
};
use async_trait::async_trait;
use gatekeeper_domain::{
    AssessmentContext, DomainError, GatePromptTemplate, PhaseKind, PhasePromptTemplate,
    StepStatus, TerminalKind, WorkflowMode, WorkflowPhase, WorkflowState,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("ledger write failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("state store error: {0}")]
    StateStore(#[from] StateStoreError),

    #[error("escalation failed: {0}")]
    Escalation(#[from] EscalationError),

    #[error("no gate configured with id {0}")]
    UnknownGate(String),

    #[error("no saved workflow for project {0}")]
    NotFound(String),

    #[error("workflow for {project} cannot be resumed from {phase}")]
    NotResumable {
        project: String,
        phase: WorkflowPhase,
    },
}

impl From<GateError> for WorkflowError {
    fn from(e: GateError) -> Self {
        match e {
            GateError::Ledger(e) => WorkflowError::Ledger(e),
            GateError::NoVoters(gate) => WorkflowError::Domain(DomainError::NoVoters(gate)),
        }
    }
}

impl From<AssessError> for WorkflowError {
    fn from(e: AssessError) -> Self {
        match e {
            AssessError::Gate(e) => e.into(),
            AssessError::Ledger(e) => WorkflowError::Ledger(e),
        }
    }
}

/// What one call to [`WorkflowEngine::run_phase`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Advanced {
        from: WorkflowPhase,
        to: WorkflowPhase,
    },
    /// A production attempt failed; the phase can be run again.
    Stalled { phase: WorkflowPhase, reason: String },
    /// A gate exhausted its revisions. The workflow is now `escalated`.
    Escalated {
        phase: WorkflowPhase,
        gate_id: String,
    },
    /// No retry path exists. The workflow is now `failed`.
    Failed { phase: WorkflowPhase, reason: String },
    /// The workflow was already in a terminal phase.
    Finished(TerminalKind),
    Cancelled { phase: WorkflowPhase },
}

pub struct WorkflowEngine {
    invoker: Arc<dyn AgentInvoker>,
    ledger: Arc<LedgerRecorder>,
    store: Arc<dyn WorkflowStateStore>,
    gates: GateCatalog,
    params: EngineParams,
    collector: Option<Arc<FeedbackCollector>>,
    rules: Arc<dyn RuleEngine>,
    escalation: Arc<dyn EscalationHandler>,
    progress: Arc<dyn WorkflowProgressNotifier>,
    assessment_context: Option<AssessmentContext>,
    cancellation_token: Option<CancellationToken>,
}

impl WorkflowEngine {
    pub fn new(
        invoker: Arc<dyn AgentInvoker>,
        ledger: Arc<LedgerRecorder>,
        store: Arc<dyn WorkflowStateStore>,
        gates: GateCatalog,
        params: EngineParams,
    ) -> Self {
        Self {
            invoker,
            ledger,
            store,
            gates,
            params,
            collector: None,
            rules: Arc::new(NoRuleEngine),
            escalation: Arc::new(LogEscalation),
            progress: Arc::new(NoProgress),
            assessment_context: None,
            cancellation_token: None,
        }
    }

    pub fn with_collector(mut self, collector: Arc<FeedbackCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn with_rule_engine(mut self, rules: Arc<dyn RuleEngine>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_escalation(mut self, handler: Arc<dyn EscalationHandler>) -> Self {
        self.escalation = handler;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn WorkflowProgressNotifier>) -> Self {
        self.progress = progress;
        self
    }

    /// Context for the ingest assessment. Without one, the context is built
    /// from the project id and the source path stored on the state.
    pub fn with_assessment_context(mut self, context: AssessmentContext) -> Self {
        self.assessment_context = Some(context);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation_token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn quorum_gate(&self) -> QuorumGate {
        let mut gate = QuorumGate::new(Arc::clone(&self.invoker), Arc::clone(&self.ledger))
            .with_voter_timeout(self.params.voter_timeout);
        if let Some(collector) = &self.collector {
            gate = gate.with_collector(Arc::clone(collector));
        }
        if let Some(token) = &self.cancellation_token {
            gate = gate.with_cancellation(token.clone());
        }
        gate
    }

    /// Create and persist a fresh workflow.
    pub async fn start(
        &self,
        project_id: &str,
        mode: WorkflowMode,
        feature: &str,
    ) -> Result<WorkflowState, WorkflowError> {
        let state = WorkflowState::new(project_id, mode, feature);
        info!(
            "Starting {:?} workflow for {} at {}",
            mode, project_id, state.current_phase
        );
        self.store.save(&state).await?;
        Ok(state)
    }

    /// Load a saved workflow so it can be continued.
    ///
    /// An escalated workflow is reopened at the review phase whose gate
    /// escalated, so the gate votes again on the latest revision.
    pub async fn resume(&self, project_id: &str) -> Result<WorkflowState, WorkflowError> {
        let mut state = self
            .store
            .load(project_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(project_id.to_string()))?;

        if state.current_phase == WorkflowPhase::Escalated {
            let phase = state
                .gate_results
                .last()
                .and_then(|r| WorkflowPhase::for_gate(&r.gate_id))
                .ok_or_else(|| WorkflowError::NotResumable {
                    project: project_id.to_string(),
                    phase: state.current_phase,
                })?;
            state.reopen_at(phase)?;
            self.ledger.phase_change(WorkflowPhase::Escalated, phase)?;
            info!("Reopened {} at {} after escalation", project_id, phase);
            self.store.save(&state).await?;
        }
        Ok(state)
    }

    /// Run phases until the workflow stops, is cancelled, or escalates.
    ///
    /// Stalled production phases are re-run until their attempt budget is
    /// spent. State is saved after every phase, including failed ones.
    pub async fn run_to_completion(
        &self,
        state: &mut WorkflowState,
    ) -> Result<PhaseOutcome, WorkflowError> {
        loop {
            let outcome = self.run_phase(state).await;
            self.store.save(state).await?;
            match outcome? {
                PhaseOutcome::Advanced { .. } | PhaseOutcome::Stalled { .. } => continue,
                other => return Ok(other),
            }
        }
    }

    /// Run the current phase once.
    pub async fn run_phase(
        &self,
        state: &mut WorkflowState,
    ) -> Result<PhaseOutcome, WorkflowError> {
        let phase = state.current_phase;
        let kind = phase.kind();
        if let PhaseKind::Terminal(kind) = kind {
            return Ok(PhaseOutcome::Finished(kind));
        }
        if self.is_cancelled() {
            info!("Cancelled before {}", phase);
            return Ok(PhaseOutcome::Cancelled { phase });
        }

        self.progress.on_phase_start(phase);
        let outcome = match kind {
            PhaseKind::Production { agent } => self.run_production(state, agent).await,
            PhaseKind::Assessment { agent } => self.run_assessment(state, agent).await,
            PhaseKind::Review {
                gate,
                reviewed,
                reviser,
            } => self.run_review(state, gate, reviewed, reviser).await,
            PhaseKind::Terminal(kind) => Ok(PhaseOutcome::Finished(kind)),
        };
        let success = matches!(outcome, Ok(PhaseOutcome::Advanced { .. }));
        self.progress.on_phase_complete(phase, success);
        outcome
    }

    async fn run_production(
        &self,
        state: &mut WorkflowState,
        agent: &str,
    ) -> Result<PhaseOutcome, WorkflowError> {
        let phase = state.current_phase;
        let checklist = self.checklist(phase.as_str(), &BTreeSet::new()).await;
        let request = AgentRequest::new(agent, PhasePromptTemplate::task(phase, state, &checklist));
        let site = CallSite::phase(phase);

        let started = Instant::now();
        match self.invoker.invoke(&request).await {
            Ok(response) => {
                self.ledger
                    .agent_call(&request, &response, started.elapsed(), &site)?;
                let decision = format!("Completed {}", phase.display_name());
                state.store_artifact(phase, response.content.clone());
                state.record_decision(agent, decision.clone(), &response.content);
                self.ledger
                    .decision(agent, phase, &decision, &response.content)?;
                self.advance(state)
            }
            Err(e) => {
                self.ledger
                    .agent_call_failed(&request, &e, started.elapsed(), &site)?;
                let attempts = state.bump_retry();
                warn!(
                    "{} failed at {} (attempt {}/{}): {}",
                    agent, phase, attempts, self.params.max_phase_attempts, e
                );
                if attempts >= self.params.max_phase_attempts {
                    let reason = format!("{agent} failed {attempts} time(s): {e}");
                    return self.fail(state, reason);
                }
                Ok(PhaseOutcome::Stalled {
                    phase,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn run_assessment(
        &self,
        state: &mut WorkflowState,
        agent: &str,
    ) -> Result<PhaseOutcome, WorkflowError> {
        let phase = state.current_phase;
        let context = self
            .assessment_context
            .clone()
            .unwrap_or_else(|| AssessmentContext::new(&state.project_id, &state.feature));
        let step_gate = self
            .gates
            .get(ASSESSMENT_STEP_GATE)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownGate(ASSESSMENT_STEP_GATE.to_string()))?;

        let mut assessor = AssessStepsUseCase::new(
            Arc::clone(&self.invoker),
            Arc::clone(&self.rules),
            Arc::clone(&self.ledger),
            Arc::new(self.quorum_gate()),
            step_gate,
        )
        .with_mode(self.params.assessment_mode);
        if let Some(collector) = &self.collector {
            assessor = assessor.with_collector(Arc::clone(collector));
        }
        if let Some(token) = &self.cancellation_token {
            assessor = assessor.with_cancellation(token.clone());
        }

        // A resumed assessment only runs the steps that did not settle.
        let finished = state
            .assessment
            .as_ref()
            .map(|r| r.steps.clone())
            .unwrap_or_default();
        let report = assessor
            .execute(
                &context,
                &self.params.assessment_steps,
                &finished,
                Arc::clone(&self.progress),
            )
            .await?;
        state.record_assessment(phase, report.clone());

        if report.steps.iter().any(|s| s.status == StepStatus::Cancelled) {
            info!("Assessment of {} cancelled; finished steps were kept", state.project_id);
            return Ok(PhaseOutcome::Cancelled { phase });
        }

        let escalated = report.escalated_steps();
        if !escalated.is_empty() {
            warn!("Assessment steps escalated: {}", escalated.join(", "));
        }
        let decision = format!(
            "Assessed {} step(s), {} escalated",
            report.steps.len(),
            escalated.len()
        );
        let rationale = match report.overall_score() {
            Some(score) => format!("Overall score {score}/100"),
            None => "No step produced a score".to_string(),
        };
        state.record_decision(agent, decision.clone(), &rationale);
        self.ledger.decision(agent, phase, &decision, &rationale)?;
        self.advance(state)
    }

    async fn run_review(
        &self,
        state: &mut WorkflowState,
        gate_id: &str,
        reviewed: WorkflowPhase,
        reviser: &str,
    ) -> Result<PhaseOutcome, WorkflowError> {
        let phase = state.current_phase;
        let gate = self
            .gates
            .get(gate_id)
            .ok_or_else(|| WorkflowError::UnknownGate(gate_id.to_string()))?;

        let Some(artifact) = state.artifact(reviewed).map(str::to_string) else {
            return self.fail(state, format!("no {} artifact to review", reviewed));
        };

        let producer = ProducerReviser {
            invoker: Arc::clone(&self.invoker),
            ledger: Arc::clone(&self.ledger),
            agent: reviser.to_string(),
            site: CallSite::phase(phase),
        };
        let request = GateRequest::new(gate, artifact, &state.project_id)
            .with_context(format!("Feature: {}", state.feature))
            .with_site(CallSite::phase(phase))
            .learning_as(reviewed.as_str());

        let outcome = self
            .quorum_gate()
            .run(request, &producer, self.progress.as_ref())
            .await?;
        for result in outcome.history() {
            state.record_gate_result(result.clone());
        }
        // Revisions are kept whatever the verdict; resuming re-votes on them.
        state.store_artifact(reviewed, outcome.artifact());

        match outcome {
            GateOutcome::Passed { result, .. } => {
                let decision = format!("Approved after {} attempt(s)", result.retry_count + 1);
                let rationale = format!(
                    "{} {}/{} approvals",
                    result.vote_summary(),
                    result.approve_count,
                    result.threshold
                );
                state.record_decision(gate_id, decision.clone(), &rationale);
                self.ledger.decision(gate_id, phase, &decision, &rationale)?;
                self.advance(state)
            }
            GateOutcome::Escalated { result, history, .. } => {
                let attempts = history.len() as u32;
                let reason = format!("{} rejected {} time(s)", gate.name, attempts);
                state.record_decision(gate_id, "Escalated to human review", &result.feedback);
                self.ledger.escalation(&reason, phase, &result.feedback)?;
                state.stop(TerminalKind::Escalated)?;
                self.ledger.phase_change(phase, WorkflowPhase::Escalated)?;

                let request = EscalationRequest {
                    project_id: state.project_id.clone(),
                    phase,
                    gate_id: gate_id.to_string(),
                    attempts,
                    reason,
                    feedback: result.feedback,
                };
                self.progress.on_escalation(&request);
                self.escalation.escalate(&request).await?;
                Ok(PhaseOutcome::Escalated {
                    phase,
                    gate_id: gate_id.to_string(),
                })
            }
            GateOutcome::Cancelled { .. } => Ok(PhaseOutcome::Cancelled { phase }),
        }
    }

    fn advance(&self, state: &mut WorkflowState) -> Result<PhaseOutcome, WorkflowError> {
        let from = state.current_phase;
        let to = state.advance()?;
        self.ledger.phase_change(from, to)?;
        info!("{} -> {}", from, to);
        Ok(PhaseOutcome::Advanced { from, to })
    }

    fn fail(&self, state: &mut WorkflowState, reason: String) -> Result<PhaseOutcome, WorkflowError> {
        let phase = state.current_phase;
        warn!("Workflow {} failed at {}: {}", state.project_id, phase, reason);
        state.record_decision("workflow_engine", "Failed", &reason);
        state.stop(TerminalKind::Failed)?;
        self.ledger.phase_change(phase, WorkflowPhase::Failed)?;
        Ok(PhaseOutcome::Failed { phase, reason })
    }

    async fn checklist(&self, step: &str, facts: &BTreeSet<String>) -> String {
        let Some(collector) = &self.collector else {
            return String::new();
        };
        match collector.guidance(step, facts).await {
            Ok(guidance) => guidance.to_checklist(),
            Err(e) => {
                warn!("Could not load lessons for {}: {}", step, e);
                String::new()
            }
        }
    }
}

/// Re-invokes the agent that produced an artifact with the gate's feedback.
struct ProducerReviser {
    invoker: Arc<dyn AgentInvoker>,
    ledger: Arc<LedgerRecorder>,
    agent: String,
    site: CallSite,
}

#[async_trait]
impl ArtifactReviser for ProducerReviser {
    async fn revise(
        &self,
        artifact: &str,
        feedback: &str,
        _attempt: u32,
    ) -> Result<String, RevisionError> {
        let request = AgentRequest::new(&self.agent, GatePromptTemplate::revision(artifact, feedback));
        let started = Instant::now();
        match self.invoker.invoke(&request).await {
            Ok(response) => {
                self.ledger
                    .agent_call(&request, &response, started.elapsed(), &self.site)?;
                Ok(response.content)
            }
            Err(e) => {
                self.ledger
                    .agent_call_failed(&request, &e, started.elapsed(), &self.site)?;
                Err(e.into())
            }
        }
    }
}
