//! Assess Steps use case
//!
//! Runs the ingest assessment steps as independent parallel tasks. Each
//! step runs the rule engine, asks its assessor agent, and (in reviewed
//! mode) puts the result through its own quorum gate. A step that is
//! rejected revises and re-votes on its own without blocking its siblings.

use crate::config::AssessmentMode;
use crate::ports::agent_invoker::{AgentInvoker, AgentRequest, InvocationError};
use crate::ports::audit_sink::LedgerError;
use crate::ports::progress::WorkflowProgressNotifier;
use crate::ports::rule_engine::RuleEngine;
use crate::use_cases::feedback_collector::FeedbackCollector;
use crate::use_cases::ledger_recorder::{CallSite, LedgerRecorder};
use crate::use_cases::quorum_gate::{
    ArtifactReviser, GateError, GateOutcome, GateRequest, QuorumGate, RevisionError,
};
use async_trait::async_trait;
use gatekeeper_domain::{
    AssessmentContext, AssessmentOutcome, AssessmentPromptTemplate, AssessmentReport, Finding,
    GateConfig, StepAssessment, StepReport, StepStatus, WorkflowPhase, merge_findings,
    parse_assessment, step_profile,
};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum AssessError {
    #[error("gate error: {0}")]
    Gate(#[from] GateError),

    #[error("ledger write failed: {0}")]
    Ledger(#[from] LedgerError),
}

/// Runs assessment steps in parallel.
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct AssessStepsUseCase {
    invoker: Arc<dyn AgentInvoker>,
    rules: Arc<dyn RuleEngine>,
    ledger: Arc<LedgerRecorder>,
    gate: Arc<QuorumGate>,
    step_gate: Arc<GateConfig>,
    collector: Option<Arc<FeedbackCollector>>,
    mode: AssessmentMode,
    phase: WorkflowPhase,
    cancellation_token: Option<CancellationToken>,
}

impl AssessStepsUseCase {
    pub fn new(
        invoker: Arc<dyn AgentInvoker>,
        rules: Arc<dyn RuleEngine>,
        ledger: Arc<LedgerRecorder>,
        gate: Arc<QuorumGate>,
        step_gate: GateConfig,
    ) -> Self {
        Self {
            invoker,
            rules,
            ledger,
            gate,
            step_gate: Arc::new(step_gate),
            collector: None,
            mode: AssessmentMode::default(),
            phase: WorkflowPhase::IngestAssessment,
            cancellation_token: None,
        }
    }

    pub fn with_collector(mut self, collector: Arc<FeedbackCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn with_mode(mut self, mode: AssessmentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Assess every step and collect the reports in the order given.
    ///
    /// Settled reports in `finished` (approved or escalated) are reused
    /// as-is and their steps are not run again. Steps that already started
    /// are allowed to finish after a cancellation; steps that had not
    /// started report `Cancelled`.
    pub async fn execute(
        &self,
        context: &AssessmentContext,
        steps: &[String],
        finished: &[StepReport],
        progress: Arc<dyn WorkflowProgressNotifier>,
    ) -> Result<AssessmentReport, AssessError> {
        let mut reports: Vec<StepReport> = finished
            .iter()
            .filter(|r| r.status.is_settled() && steps.contains(&r.step))
            .cloned()
            .collect();
        let to_run: Vec<&String> = steps
            .iter()
            .filter(|step| !reports.iter().any(|r| &r.step == *step))
            .collect();
        if !reports.is_empty() {
            info!("Keeping {} finished step(s) of {}", reports.len(), context.project_id);
        }
        info!(
            "Assessing {} step(s) of {} in {} mode",
            to_run.len(),
            context.project_id,
            self.mode.as_str()
        );

        let mut join_set = JoinSet::new();
        for step in &to_run {
            let this = self.clone();
            let step = (*step).clone();
            let context = context.clone();
            let progress = Arc::clone(&progress);
            join_set.spawn(async move {
                let result = this.run_step(&step, &context, progress.as_ref()).await;
                (step, result)
            });
        }

        let mut pending: BTreeSet<&String> = to_run.into_iter().collect();
        let mut first_error: Option<AssessError> = None;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((step, Ok(report))) => {
                    pending.remove(&step);
                    reports.push(report);
                }
                Ok((step, Err(e))) => {
                    pending.remove(&step);
                    warn!("Assessment step {} aborted: {}", step, e);
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    warn!("Task join error: {}", e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        for step in pending {
            reports.push(failed(step, "assessment task did not complete".into()));
        }

        let mut report = AssessmentReport::new(&context.project_id);
        for step in steps {
            if let Some(pos) = reports.iter().position(|r| &r.step == step) {
                report.steps.push(reports.swap_remove(pos));
            }
        }
        Ok(report)
    }

    async fn run_step(
        &self,
        step: &str,
        context: &AssessmentContext,
        progress: &dyn WorkflowProgressNotifier,
    ) -> Result<StepReport, AssessError> {
        if self
            .cancellation_token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Ok(StepReport {
                step: step.to_string(),
                status: StepStatus::Cancelled,
                score: None,
                summary: String::new(),
                findings: Vec::new(),
                attempts: 0,
            });
        }
        progress.on_step_start(step);

        let rule_findings = self.rules.run(step, context);
        debug!("Rule engine reported {} finding(s) for {}", rule_findings.len(), step);

        let report = if self.mode == AssessmentMode::RulesOnly {
            StepReport {
                step: step.to_string(),
                status: StepStatus::Approved,
                score: None,
                summary: "Rule engine only".to_string(),
                findings: merge_findings(rule_findings, Vec::new()),
                attempts: 0,
            }
        } else {
            self.assess(step, context, rule_findings, progress).await?
        };

        progress.on_step_complete(&report);
        Ok(report)
    }

    async fn assess(
        &self,
        step: &str,
        context: &AssessmentContext,
        rule_findings: Vec<Finding>,
        progress: &dyn WorkflowProgressNotifier,
    ) -> Result<StepReport, AssessError> {
        let checklist = match &self.collector {
            Some(collector) => match collector.guidance(step, &context.facts).await {
                Ok(guidance) => guidance.to_checklist(),
                Err(e) => {
                    warn!("Could not load lessons for {}: {}", step, e);
                    String::new()
                }
            },
            None => String::new(),
        };

        let assessor = StepAssessor {
            invoker: Arc::clone(&self.invoker),
            ledger: Arc::clone(&self.ledger),
            step: step.to_string(),
            context: context.clone(),
            rule_findings: rule_findings.clone(),
            checklist,
            site: CallSite::step(self.phase, step),
            latest: Mutex::new(StepAssessment::default()),
        };

        let prompt = AssessmentPromptTemplate::step(
            step,
            context,
            &assessor.rule_findings,
            &assessor.checklist,
        );
        let first = match assessor.ask(prompt).await {
            Ok(assessment) => assessment,
            Err(RevisionError::Ledger(e)) => return Err(e.into()),
            Err(RevisionError::Invocation(e)) => {
                warn!("Assessor for {} failed: {}", step, e);
                return Ok(failed(step, e.to_string()));
            }
        };

        let (status, attempts) = if self.mode == AssessmentMode::Standard {
            (StepStatus::Approved, 0)
        } else {
            let artifact = render_step(step, &first);
            let request = GateRequest::new(&self.step_gate, artifact, &context.project_id)
                .with_context(format!("Assessment step: {step}. Focus: {}", step_profile(step).focus))
                .with_site(assessor.site.clone())
                .learning_as(step);
            let outcome = self.gate.run(request, &assessor, progress).await?;
            let status = match outcome {
                GateOutcome::Passed { .. } => StepStatus::Approved,
                GateOutcome::Escalated { .. } => StepStatus::Escalated,
                GateOutcome::Cancelled { .. } => StepStatus::Cancelled,
            };
            (status, outcome.attempts() as u32)
        };

        let latest = assessor.latest();
        info!("Step {} {} after {} attempt(s)", step, status.as_str(), attempts);
        Ok(StepReport {
            step: step.to_string(),
            status,
            score: latest.score,
            summary: latest.summary,
            findings: merge_findings(rule_findings, latest.findings),
            attempts,
        })
    }
}

fn failed(step: &str, reason: String) -> StepReport {
    StepReport {
        step: step.to_string(),
        status: StepStatus::Failed,
        score: None,
        summary: reason,
        findings: Vec::new(),
        attempts: 0,
    }
}

/// Asks a step's assessor and revises its answer when the gate rejects it.
struct StepAssessor {
    invoker: Arc<dyn AgentInvoker>,
    ledger: Arc<LedgerRecorder>,
    step: String,
    context: AssessmentContext,
    rule_findings: Vec<Finding>,
    checklist: String,
    site: CallSite,
    latest: Mutex<StepAssessment>,
}

impl StepAssessor {
    fn latest(&self) -> StepAssessment {
        self.latest
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }

    async fn ask(&self, prompt: String) -> Result<StepAssessment, RevisionError> {
        let request = AgentRequest::new(step_profile(&self.step).agent, prompt);
        let started = Instant::now();
        let response = match self.invoker.invoke(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.ledger
                    .agent_call_failed(&request, &e, started.elapsed(), &self.site)?;
                return Err(e.into());
            }
        };
        self.ledger
            .agent_call(&request, &response, started.elapsed(), &self.site)?;

        let assessment = match parse_assessment(&self.step, &response.content) {
            AssessmentOutcome::Full(a) => a,
            AssessmentOutcome::Partial(a) => {
                warn!(
                    "Assessment for {} recovered partially ({} findings)",
                    self.step,
                    a.findings.len()
                );
                a
            }
            AssessmentOutcome::Unparseable { raw_prefix } => {
                return Err(InvocationError::MalformedResponse(raw_prefix).into());
            }
        };
        if let Ok(mut latest) = self.latest.lock() {
            *latest = assessment.clone();
        }
        Ok(assessment)
    }
}

#[async_trait]
impl ArtifactReviser for StepAssessor {
    async fn revise(
        &self,
        _artifact: &str,
        feedback: &str,
        attempt: u32,
    ) -> Result<String, RevisionError> {
        debug!("Revising {} for attempt {}", self.step, attempt);
        let prompt = AssessmentPromptTemplate::revision(
            &self.step,
            &self.context,
            &self.rule_findings,
            &self.checklist,
            &self.latest(),
            feedback,
        );
        let revised = self.ask(prompt).await?;
        Ok(render_step(&self.step, &revised))
    }
}

/// What voters see for one step.
fn render_step(step: &str, assessment: &StepAssessment) -> String {
    let mut out = format!("## {} assessment\n\n", step.replace('_', " "));
    match assessment.score {
        Some(score) => out.push_str(&format!("**Score:** {score}/100\n")),
        None => out.push_str("**Score:** not given\n"),
    }
    if !assessment.summary.is_empty() {
        out.push_str(&format!("**Summary:** {}\n", assessment.summary));
    }
    out.push_str(&format!("\n### Findings ({})\n", assessment.findings.len()));
    for (i, f) in assessment.findings.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. [{}] {} ({})\n   {}\n",
            i + 1,
            f.severity.as_str().to_uppercase(),
            f.title,
            f.id,
            f.description
        ));
        if !f.evidence.is_empty() {
            out.push_str(&format!("   Evidence: {}\n", f.evidence.join("; ")));
        }
        if !f.recommendation.is_empty() {
            out.push_str(&format!("   Recommendation: {}\n", f.recommendation));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateCatalog;
    use crate::config::ASSESSMENT_STEP_GATE;
    use crate::ports::progress::NoProgress;
    use crate::test_support::{MemoryLedger, PASS, ScriptedInvoker, reject};
    use gatekeeper_domain::{EventKind, FindingSource, PricingTable, Severity};

    const ARCH: &str = r#"{"score": 70, "summary": "ok", "findings": [
        {"severity": "high", "title": "Layer violation", "description": "ui uses db"}]}"#;
    const SEC: &str = r#"{"score": 50, "summary": "weak", "findings": []}"#;

    struct OneRule;

    impl RuleEngine for OneRule {
        fn run(&self, step: &str, _context: &AssessmentContext) -> Vec<Finding> {
            if step != "security" {
                return Vec::new();
            }
            vec![Finding {
                id: "SEC-R1".into(),
                title: "Hardcoded secret".into(),
                severity: Severity::Critical,
                description: "API key in config.js".into(),
                evidence: vec!["config.js:3".into()],
                recommendation: "Move to env".into(),
                source: FindingSource::Rule {
                    rule_id: "secrets".into(),
                },
            }]
        }
    }

    fn use_case(invoker: ScriptedInvoker, mode: AssessmentMode) -> (Arc<MemoryLedger>, AssessStepsUseCase) {
        let ledger = Arc::new(MemoryLedger::new("s1", "shop"));
        let recorder = Arc::new(LedgerRecorder::new(ledger.clone(), PricingTable::default()));
        let invoker: Arc<dyn AgentInvoker> = Arc::new(invoker);
        let gate = Arc::new(QuorumGate::new(Arc::clone(&invoker), Arc::clone(&recorder)));
        let step_gate = GateCatalog::default()
            .get(ASSESSMENT_STEP_GATE)
            .cloned()
            .unwrap()
            .with_max_retries(1);
        let use_case = AssessStepsUseCase::new(invoker, Arc::new(OneRule), recorder, gate, step_gate)
            .with_mode(mode);
        (ledger, use_case)
    }

    fn voters(mut invoker: ScriptedInvoker, reply: &str) -> ScriptedInvoker {
        for voter in GateCatalog::default()
            .get(ASSESSMENT_STEP_GATE)
            .unwrap()
            .voters()
        {
            invoker = invoker.always(voter, reply);
        }
        invoker
    }

    fn steps() -> Vec<String> {
        vec!["architecture".into(), "security".into()]
    }

    #[tokio::test]
    async fn reviewed_steps_are_gated_and_merged_in_order() {
        let invoker = voters(ScriptedInvoker::new(), PASS)
            .always("solutions_architect", ARCH)
            .always("security_specialist", SEC);
        let (ledger, use_case) = use_case(invoker, AssessmentMode::Reviewed);

        let report = use_case
            .execute(&AssessmentContext::new("shop", "/src/shop"), &steps(), &[], Arc::new(NoProgress))
            .await
            .unwrap();

        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[0].step, "architecture");
        assert_eq!(report.steps[0].status, StepStatus::Approved);
        assert_eq!(report.steps[0].attempts, 1);
        let security = &report.steps[1];
        assert_eq!(security.findings[0].title, "Hardcoded secret");
        assert_eq!(report.overall_score(), Some(60));

        let checkpoints: BTreeSet<_> = ledger
            .events_of(EventKind::AgentCall)
            .into_iter()
            .filter_map(|e| e.checkpoint)
            .collect();
        assert!(checkpoints.contains("CP-INGEST-ASSESSMENT/security"));
    }

    #[tokio::test]
    async fn rejected_steps_escalate_independently() {
        let invoker = voters(
            ScriptedInvoker::new(),
            &reject("Findings lack evidence", "Cite file paths"),
        )
        .always("solutions_architect", ARCH)
        .always("security_specialist", SEC);
        let (_, use_case) = use_case(invoker, AssessmentMode::Reviewed);

        let report = use_case
            .execute(&AssessmentContext::new("shop", "/src/shop"), &steps(), &[], Arc::new(NoProgress))
            .await
            .unwrap();

        assert_eq!(report.escalated_steps(), vec!["architecture", "security"]);
        // One revision each, per step.
        assert!(report.steps.iter().all(|s| s.attempts == 2));
    }

    #[tokio::test]
    async fn standard_mode_skips_the_gate() {
        let invoker = ScriptedInvoker::new()
            .always("solutions_architect", ARCH)
            .always("security_specialist", SEC);
        let (ledger, use_case) = use_case(invoker, AssessmentMode::Standard);

        let report = use_case
            .execute(&AssessmentContext::new("shop", "/src/shop"), &steps(), &[], Arc::new(NoProgress))
            .await
            .unwrap();

        assert!(report.steps.iter().all(|s| s.status == StepStatus::Approved));
        assert!(ledger.events_of(EventKind::GateVote).is_empty());
    }

    #[tokio::test]
    async fn unparseable_assessor_output_fails_the_step() {
        let invoker = voters(ScriptedInvoker::new(), PASS)
            .always("solutions_architect", "I looked around, seems fine.")
            .always("security_specialist", SEC);
        let (_, use_case) = use_case(invoker, AssessmentMode::Reviewed);

        let report = use_case
            .execute(&AssessmentContext::new("shop", "/src/shop"), &steps(), &[], Arc::new(NoProgress))
            .await
            .unwrap();

        assert_eq!(report.steps[0].status, StepStatus::Failed);
        assert_eq!(report.steps[1].status, StepStatus::Approved);
    }

    #[tokio::test]
    async fn settled_steps_are_not_assessed_again() {
        let invoker = ScriptedInvoker::new()
            .always("solutions_architect", ARCH)
            .always("security_specialist", SEC);
        let (ledger, use_case) = use_case(invoker, AssessmentMode::Standard);
        let kept = StepReport {
            step: "architecture".into(),
            status: StepStatus::Approved,
            score: Some(88),
            summary: "from the first run".into(),
            findings: Vec::new(),
            attempts: 1,
        };
        let retried = StepReport {
            step: "security".into(),
            status: StepStatus::Cancelled,
            score: None,
            summary: String::new(),
            findings: Vec::new(),
            attempts: 0,
        };

        let report = use_case
            .execute(
                &AssessmentContext::new("shop", "/src/shop"),
                &steps(),
                &[retried, kept.clone()],
                Arc::new(NoProgress),
            )
            .await
            .unwrap();

        assert_eq!(report.steps[0], kept);
        assert_eq!(report.steps[1].status, StepStatus::Approved);
        assert_eq!(report.steps[1].score, Some(50));
        let agents: Vec<_> = ledger
            .events_of(EventKind::AgentCall)
            .into_iter()
            .filter_map(|e| e.agent)
            .collect();
        assert_eq!(agents, vec!["security_specialist".to_string()]);
    }

    #[tokio::test]
    async fn rules_only_makes_no_agent_calls() {
        let (ledger, use_case) = use_case(ScriptedInvoker::new(), AssessmentMode::RulesOnly);
        let report = use_case
            .execute(&AssessmentContext::new("shop", "/src/shop"), &steps(), &[], Arc::new(NoProgress))
            .await
            .unwrap();
        assert_eq!(report.steps[1].findings.len(), 1);
        assert!(ledger.events().is_empty());
    }
}
