//! Quorum Gate use case
//!
//! Asks every voter of a gate about a candidate artifact in parallel,
//! tallies the ballots, and on rejection hands the aggregated feedback to
//! an [`ArtifactReviser`] and votes again. After the last allowed attempt
//! the gate escalates instead of failing.
//!
//! ```text
//! attempt 1..=max_retries+1:
//!   fan out voters ──▶ ballots ──▶ tally ──pass──▶ Passed
//!                                    │
//!                                  reject ──▶ learn ──▶ revise ──▶ next attempt
//! exhausted ──▶ Escalated
//! ```

use crate::ports::agent_invoker::{AgentInvoker, AgentRequest, InvocationError};
use crate::ports::audit_sink::LedgerError;
use crate::ports::progress::WorkflowProgressNotifier;
use crate::use_cases::feedback_collector::FeedbackCollector;
use crate::use_cases::ledger_recorder::{CallSite, LedgerRecorder, Usage};
use async_trait::async_trait;
use chrono::Utc;
use gatekeeper_domain::{
    AbstainReason, Abstention, Ballot, GateConfig, GateKind, GatePromptTemplate, GateResult,
    parse_vote_response,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GateError {
    #[error("gate {0} has no voters configured")]
    NoVoters(String),

    #[error("ledger write failed: {0}")]
    Ledger(#[from] LedgerError),
}

/// Why a revision produced no new artifact.
#[derive(Error, Debug)]
pub enum RevisionError {
    /// The producing agent failed; the gate re-votes on the old artifact.
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// Recording the revision failed; this aborts the gate.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Produces a replacement artifact from a rejected one and its feedback.
///
/// The gate never inspects whether the content changed; it votes on
/// whatever comes back.
#[async_trait]
pub trait ArtifactReviser: Send + Sync {
    /// `attempt` is the 1-based number of the vote the revision is for.
    async fn revise(
        &self,
        artifact: &str,
        feedback: &str,
        attempt: u32,
    ) -> Result<String, RevisionError>;
}

/// One gate run's input.
#[derive(Debug, Clone)]
pub struct GateRequest<'a> {
    pub gate: &'a GateConfig,
    pub artifact: String,
    /// Extra context handed to voters alongside the artifact.
    pub context: String,
    pub site: CallSite,
    /// Lessons scope to record rejections under; `None` disables learning.
    pub learn_as: Option<String>,
    pub project_id: String,
}

impl<'a> GateRequest<'a> {
    pub fn new(gate: &'a GateConfig, artifact: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            gate,
            artifact: artifact.into(),
            context: String::new(),
            site: CallSite::default(),
            learn_as: None,
            project_id: project_id.into(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_site(mut self, site: CallSite) -> Self {
        self.site = site;
        self
    }

    pub fn learning_as(mut self, scope: impl Into<String>) -> Self {
        self.learn_as = Some(scope.into());
        self
    }
}

/// How a gate run ended. Every variant carries the artifact as it stood
/// at the end, which may be a revision of the one submitted.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    Passed {
        result: GateResult,
        history: Vec<GateResult>,
        artifact: String,
    },
    Escalated {
        result: GateResult,
        history: Vec<GateResult>,
        artifact: String,
    },
    /// Cancelled between attempts; finished attempts are kept.
    Cancelled {
        history: Vec<GateResult>,
        artifact: String,
    },
}

impl GateOutcome {
    pub fn history(&self) -> &[GateResult] {
        match self {
            GateOutcome::Passed { history, .. }
            | GateOutcome::Escalated { history, .. }
            | GateOutcome::Cancelled { history, .. } => history,
        }
    }

    pub fn artifact(&self) -> &str {
        match self {
            GateOutcome::Passed { artifact, .. }
            | GateOutcome::Escalated { artifact, .. }
            | GateOutcome::Cancelled { artifact, .. } => artifact,
        }
    }

    pub fn attempts(&self) -> usize {
        self.history().len()
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, GateOutcome::Passed { .. })
    }
}

pub struct QuorumGate {
    invoker: Arc<dyn AgentInvoker>,
    ledger: Arc<LedgerRecorder>,
    collector: Option<Arc<FeedbackCollector>>,
    voter_timeout: Option<Duration>,
    cancellation_token: Option<CancellationToken>,
}

impl QuorumGate {
    pub fn new(invoker: Arc<dyn AgentInvoker>, ledger: Arc<LedgerRecorder>) -> Self {
        Self {
            invoker,
            ledger,
            collector: None,
            voter_timeout: None,
            cancellation_token: None,
        }
    }

    /// Learn from rejected attempts.
    pub fn with_collector(mut self, collector: Arc<FeedbackCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Abstain for voters that take longer than `timeout`.
    pub fn with_voter_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.voter_timeout = timeout;
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

    /// Vote, revise and re-vote until the gate passes or its attempts run out.
    pub async fn run(
        &self,
        request: GateRequest<'_>,
        reviser: &dyn ArtifactReviser,
        progress: &dyn WorkflowProgressNotifier,
    ) -> Result<GateOutcome, GateError> {
        let gate = request.gate;
        if gate.voters().is_empty() {
            return Err(GateError::NoVoters(gate.id.clone()));
        }

        let max_attempts = gate.max_attempts();
        let mut artifact = request.artifact.clone();
        let mut history: Vec<GateResult> = Vec::new();

        for attempt in 0..max_attempts {
            if self.is_cancelled() {
                info!("Gate {} cancelled before attempt {}", gate.id, attempt + 1);
                return Ok(GateOutcome::Cancelled { history, artifact });
            }

            progress.on_gate_attempt(&gate.id, attempt + 1, max_attempts);
            let result = self
                .vote_once(gate, attempt, &artifact, &request, progress)
                .await?;
            progress.on_gate_result(&result);
            history.push(result.clone());

            if result.passed {
                info!(
                    "Gate {} passed on attempt {} ({}/{})",
                    gate.id,
                    attempt + 1,
                    result.approve_count,
                    result.threshold
                );
                return Ok(GateOutcome::Passed {
                    result,
                    history,
                    artifact,
                });
            }

            info!(
                "Gate {} rejected attempt {}/{} ({}/{} approvals, {} abstained)",
                gate.id,
                attempt + 1,
                max_attempts,
                result.approve_count,
                result.threshold,
                result.abstain_count()
            );
            self.learn(&request, &result).await;

            if attempt + 1 == max_attempts {
                break;
            }
            if self.is_cancelled() {
                info!("Gate {} cancelled before revision", gate.id);
                return Ok(GateOutcome::Cancelled { history, artifact });
            }

            match reviser.revise(&artifact, &result.feedback, attempt + 2).await {
                Ok(revised) => artifact = revised,
                Err(RevisionError::Invocation(e)) => {
                    warn!("Revision for gate {} failed, re-voting unchanged: {}", gate.id, e);
                }
                Err(RevisionError::Ledger(e)) => return Err(e.into()),
            }
        }

        warn!("Gate {} exhausted {} attempts, escalating", gate.id, max_attempts);
        match history.last().cloned() {
            Some(result) => Ok(GateOutcome::Escalated {
                result,
                history,
                artifact,
            }),
            None => Ok(GateOutcome::Cancelled { history, artifact }),
        }
    }

    /// One attempt: fan out to every voter and tally what comes back.
    async fn vote_once(
        &self,
        gate: &GateConfig,
        attempt: u32,
        artifact: &str,
        request: &GateRequest<'_>,
        progress: &dyn WorkflowProgressNotifier,
    ) -> Result<GateResult, GateError> {
        let started = Instant::now();
        let prompt = match &gate.kind {
            GateKind::Single { .. } => GatePromptTemplate::approval(gate, artifact),
            GateKind::Quorum { .. } => GatePromptTemplate::vote(gate, artifact, &request.context),
        };

        let mut join_set = JoinSet::new();
        for voter in gate.voters() {
            let invoker = Arc::clone(&self.invoker);
            let agent_request =
                AgentRequest::new(voter, prompt.clone()).with_context(request.context.clone());
            let limit = self.voter_timeout;

            join_set.spawn(async move {
                let call_started = Instant::now();
                let result = match limit {
                    Some(limit) => tokio::time::timeout(limit, invoker.invoke(&agent_request))
                        .await
                        .unwrap_or(Err(InvocationError::Timeout)),
                    None => invoker.invoke(&agent_request).await,
                };
                (agent_request, result, call_started.elapsed())
            });
        }

        let mut pending: BTreeSet<String> = gate.voters().into_iter().map(String::from).collect();
        let mut ballots: Vec<Ballot> = Vec::new();
        let mut usage = Usage::default();
        let mut join_errors: Vec<String> = Vec::new();

        while let Some(joined) = join_set.join_next().await {
            let (agent_request, result, elapsed) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!("Task join error: {}", e);
                    join_errors.push(e.to_string());
                    continue;
                }
            };
            pending.remove(&agent_request.agent_id);

            let ballot = match result {
                Ok(response) => {
                    usage.add(self.ledger.agent_call(
                        &agent_request,
                        &response,
                        elapsed,
                        &request.site,
                    )?);
                    parse_vote_response(&response.content).into_ballot(
                        &response.agent_id,
                        &response.role,
                        &response.content,
                    )
                }
                Err(e) => {
                    warn!("Voter {} failed: {}", agent_request.agent_id, e);
                    self.ledger
                        .agent_call_failed(&agent_request, &e, elapsed, &request.site)?;
                    let reason = match e {
                        InvocationError::Timeout => AbstainReason::Timeout {
                            after_secs: self.voter_timeout.map_or(0, |t| t.as_secs()),
                        },
                        other => AbstainReason::Invocation {
                            error: other.to_string(),
                        },
                    };
                    Abstention::new(
                        &agent_request.agent_id,
                        self.invoker.role(&agent_request.agent_id),
                        reason,
                    )
                    .into()
                }
            };
            self.record_ballot(gate, attempt, &ballot, &request.site, progress)?;
            ballots.push(ballot);
        }

        // Voters whose task never reported back.
        for (voter, error) in pending.into_iter().zip(
            join_errors
                .into_iter()
                .chain(std::iter::repeat(String::from("task lost"))),
        ) {
            let ballot: Ballot =
                Abstention::new(&voter, self.invoker.role(&voter), AbstainReason::Join { error })
                    .into();
            self.record_ballot(gate, attempt, &ballot, &request.site, progress)?;
            ballots.push(ballot);
        }

        let result = GateResult::tally(gate, attempt, ballots, Utc::now());
        self.ledger
            .gate_result(&result, usage, started.elapsed(), &request.site)?;
        Ok(result)
    }

    fn record_ballot(
        &self,
        gate: &GateConfig,
        attempt: u32,
        ballot: &Ballot,
        site: &CallSite,
        progress: &dyn WorkflowProgressNotifier,
    ) -> Result<(), GateError> {
        match ballot {
            Ballot::Cast(vote) => {
                debug!(
                    "{} voted {} ({}%) at {}",
                    vote.voter_id,
                    vote.verdict.as_str(),
                    vote.confidence,
                    gate.id
                );
                progress.on_vote_cast(&gate.id, vote);
            }
            Ballot::Abstained(abstention) => {
                warn!(
                    "{} abstained at {}: {}",
                    abstention.voter_id,
                    gate.id,
                    abstention.reason.label()
                );
                progress.on_abstention(&gate.id, abstention);
            }
        }
        self.ledger.ballot(&gate.id, attempt, ballot, site)?;
        Ok(())
    }

    async fn learn(&self, request: &GateRequest<'_>, result: &GateResult) {
        let (Some(collector), Some(scope)) = (&self.collector, &request.learn_as) else {
            return;
        };
        match collector.collect(scope, result, &request.project_id).await {
            Ok(report) => debug!(
                "Learned {} concern(s), promoted {} rule(s) for {}",
                report.updates.len(),
                report.promoted.len(),
                scope
            ),
            Err(e) => warn!("Failed to record lessons for {}: {}", scope, e),
        }
    }
}
