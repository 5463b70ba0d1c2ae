//! Typed facade over the audit sink.
//!
//! Builds one [`AuditEvent`] per agent call, ballot, gate result, phase
//! change, decision and escalation, costing agent calls with the
//! [`PricingTable`].

use crate::ports::agent_invoker::{AgentRequest, AgentResponse, InvocationError};
use crate::ports::audit_sink::{AuditSink, LedgerError};
use chrono::Utc;
use gatekeeper_domain::{
    AuditEvent, Ballot, EventKind, EventStatus, GateResult, PricingTable, SessionSummary,
    WorkflowPhase,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Where in the workflow an event happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSite {
    pub phase: Option<String>,
    pub checkpoint: Option<String>,
}

impl CallSite {
    pub fn phase(phase: WorkflowPhase) -> Self {
        Self {
            phase: Some(phase.as_str().to_string()),
            checkpoint: Some(phase.checkpoint()),
        }
    }

    /// An assessment step inside `phase`, e.g. `CP-INGEST-ASSESSMENT/security`.
    pub fn step(phase: WorkflowPhase, step: &str) -> Self {
        Self {
            phase: Some(phase.as_str().to_string()),
            checkpoint: Some(format!("{}/{step}", phase.checkpoint())),
        }
    }
}

/// Token usage and cost accumulated over several calls.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Usage {
    pub tokens: u64,
    pub cost_usd: f64,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.tokens += other.tokens;
        self.cost_usd += other.cost_usd;
    }
}

pub struct LedgerRecorder {
    sink: Arc<dyn AuditSink>,
    pricing: PricingTable,
}

impl LedgerRecorder {
    pub fn new(sink: Arc<dyn AuditSink>, pricing: PricingTable) -> Self {
        Self { sink, pricing }
    }

    pub fn session_id(&self) -> &str {
        self.sink.session_id()
    }

    pub fn summary(&self) -> SessionSummary {
        self.sink.summary()
    }

    fn event(&self, kind: EventKind, site: &CallSite) -> AuditEvent {
        let mut event = AuditEvent::new(
            kind,
            self.sink.session_id(),
            self.sink.project_id(),
            Utc::now(),
        )
        .with_checkpoint(site.checkpoint.as_deref());
        event.phase = site.phase.clone();
        event
    }

    /// Record a successful agent call and return what it cost.
    pub fn agent_call(
        &self,
        request: &AgentRequest,
        response: &AgentResponse,
        duration: Duration,
        site: &CallSite,
    ) -> Result<Usage, LedgerError> {
        let cost = self
            .pricing
            .cost(&response.model, response.input_tokens, response.output_tokens);
        let event = self
            .event(EventKind::AgentCall, site)
            .with_agent(&request.agent_id)
            .with_input(&request.task)
            .with_output(&response.content)
            .with_usage(&response.model, response.input_tokens, response.output_tokens)
            .with_cost(cost)
            .with_duration_ms(duration.as_millis() as u64);
        self.sink.append(event)?;
        Ok(Usage {
            tokens: response.input_tokens + response.output_tokens,
            cost_usd: cost,
        })
    }

    pub fn agent_call_failed(
        &self,
        request: &AgentRequest,
        error: &InvocationError,
        duration: Duration,
        site: &CallSite,
    ) -> Result<(), LedgerError> {
        let event = self
            .event(EventKind::AgentCall, site)
            .with_agent(&request.agent_id)
            .with_input(&request.task)
            .with_duration_ms(duration.as_millis() as u64)
            .with_status(EventStatus::Failure)
            .with_metadata(json!({ "error": error.to_string() }));
        self.sink.append(event)
    }

    /// One voter's ballot at a gate attempt. Abstentions are recorded with
    /// `pending` status so they never count as a pass or a fail.
    pub fn ballot(
        &self,
        gate_id: &str,
        attempt: u32,
        ballot: &Ballot,
        site: &CallSite,
    ) -> Result<(), LedgerError> {
        let event = self.event(EventKind::GateVote, site).with_agent(ballot.voter_id());
        let event = match ballot {
            Ballot::Cast(vote) => event
                .with_output(&vote.reasoning)
                .with_status(if vote.is_pass() {
                    EventStatus::Success
                } else {
                    EventStatus::Failure
                })
                .with_metadata(json!({
                    "gate_id": gate_id,
                    "attempt": attempt,
                    "role": vote.role,
                    "vote": vote.verdict.as_str(),
                    "confidence": vote.confidence,
                    "concerns": vote.concerns,
                    "suggestions": vote.suggestions,
                    "provenance": vote.provenance,
                })),
            Ballot::Abstained(abstention) => event
                .with_output(&abstention.reason.detail())
                .with_status(EventStatus::Pending)
                .with_metadata(json!({
                    "gate_id": gate_id,
                    "attempt": attempt,
                    "role": abstention.role,
                    "abstained": abstention.reason.label(),
                })),
        };
        self.sink.append(event)
    }

    /// Summary event for one gate attempt, with the gate id as actor.
    ///
    /// Token and cost totals go into metadata only; the voters' own
    /// `agent_call` events already carry them.
    pub fn gate_result(
        &self,
        result: &GateResult,
        usage: Usage,
        duration: Duration,
        site: &CallSite,
    ) -> Result<(), LedgerError> {
        let event = self
            .event(EventKind::GateVote, site)
            .with_agent(&result.gate_id)
            .with_output(&result.feedback)
            .with_duration_ms(duration.as_millis() as u64)
            .with_status(if result.passed {
                EventStatus::Success
            } else {
                EventStatus::Failure
            })
            .with_metadata(json!({
                "voters": result
                    .votes
                    .iter()
                    .map(|v| v.voter_id.as_str())
                    .chain(result.abstentions.iter().map(|a| a.voter_id.as_str()))
                    .collect::<Vec<_>>(),
                "votes_for": result.approve_count,
                "votes_against": result.reject_count,
                "abstained": result.abstain_count(),
                "threshold": result.threshold,
                "attempt": result.retry_count,
                "passed": result.passed,
                "total_tokens": usage.tokens,
                "total_cost_usd": usage.cost_usd,
            }));
        self.sink.append(event)
    }

    pub fn phase_change(&self, from: WorkflowPhase, to: WorkflowPhase) -> Result<(), LedgerError> {
        let event = self
            .event(EventKind::PhaseChange, &CallSite::phase(to))
            .with_input(&format!("From: {from}"))
            .with_output(&format!("To: {to}"))
            .with_metadata(json!({ "old_phase": from.as_str(), "new_phase": to.as_str() }));
        self.sink.append(event)
    }

    pub fn decision(
        &self,
        agent_id: &str,
        phase: WorkflowPhase,
        decision: &str,
        rationale: &str,
    ) -> Result<(), LedgerError> {
        let event = self
            .event(EventKind::Decision, &CallSite::phase(phase))
            .with_agent(agent_id)
            .with_input(decision)
            .with_output(rationale);
        self.sink.append(event)
    }

    pub fn escalation(
        &self,
        reason: &str,
        phase: WorkflowPhase,
        context: &str,
    ) -> Result<(), LedgerError> {
        let event = self
            .event(EventKind::Escalation, &CallSite::phase(phase))
            .with_input(reason)
            .with_output(context)
            .with_status(EventStatus::Pending)
            .with_metadata(json!({ "requires_human_review": true }));
        self.sink.append(event)
    }

    pub fn finalize(&self) -> Result<SessionSummary, LedgerError> {
        self.sink.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryLedger;
    use gatekeeper_domain::{AbstainReason, Abstention, Vote};

    fn recorder() -> (Arc<MemoryLedger>, LedgerRecorder) {
        let ledger = Arc::new(MemoryLedger::new("s1", "shop"));
        let recorder = LedgerRecorder::new(ledger.clone(), PricingTable::default());
        (ledger, recorder)
    }

    #[test]
    fn agent_call_is_costed_by_model() {
        let (ledger, recorder) = recorder();
        let request = AgentRequest::new("developer", "build it");
        let response = AgentResponse {
            agent_id: "developer".into(),
            role: "Developer".into(),
            model: "claude-3-haiku-20240307".into(),
            content: "done".into(),
            input_tokens: 1_000_000,
            output_tokens: 0,
        };
        let usage = recorder
            .agent_call(&request, &response, Duration::from_millis(20), &CallSite::phase(WorkflowPhase::Development))
            .unwrap();
        assert!((usage.cost_usd - 0.25).abs() < 1e-9);

        let events = ledger.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::AgentCall);
        assert_eq!(events[0].checkpoint.as_deref(), Some("CP-DEVELOPMENT"));
    }

    #[test]
    fn abstentions_are_pending_gate_votes() {
        let (ledger, recorder) = recorder();
        let site = CallSite::phase(WorkflowPhase::CodeReview);
        recorder
            .ballot("code_review", 0, &Vote::pass("v1", "Security").into(), &site)
            .unwrap();
        recorder
            .ballot(
                "code_review",
                0,
                &Abstention::new("v2", "QA", AbstainReason::Timeout { after_secs: 300 }).into(),
                &site,
            )
            .unwrap();

        let summary = ledger.summary();
        assert_eq!(summary.gate_votes, 2);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failure_count, 0);
    }

    #[test]
    fn phase_change_updates_current_phase() {
        let (ledger, recorder) = recorder();
        recorder
            .phase_change(WorkflowPhase::Requirements, WorkflowPhase::RequirementsReview)
            .unwrap();
        assert_eq!(ledger.summary().current_phase.as_deref(), Some("requirements_review"));
    }
}
