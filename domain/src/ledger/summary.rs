//! Running session statistics, rebuildable from the event log.

use super::event::{AuditEvent, EventKind, EventStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub project_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub event_count: u64,
    pub agent_calls: u64,
    pub gate_votes: u64,
    pub phase_changes: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost_usd: f64,
    pub total_duration_ms: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Phases entered, in first-seen order.
    pub phases_completed: Vec<String>,
    pub current_phase: Option<String>,
}

impl SessionSummary {
    pub fn new(
        session_id: impl Into<String>,
        project_id: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            project_id: project_id.into(),
            started_at,
            ended_at: None,
            event_count: 0,
            agent_calls: 0,
            gate_votes: 0,
            phase_changes: 0,
            total_input_tokens: 0,
            total_output_tokens: 0,
            total_cost_usd: 0.0,
            total_duration_ms: 0,
            success_count: 0,
            failure_count: 0,
            phases_completed: Vec::new(),
            current_phase: None,
        }
    }

    /// Fold one event into the totals.
    pub fn apply(&mut self, event: &AuditEvent) {
        self.event_count += 1;
        self.total_input_tokens += event.input_tokens;
        self.total_output_tokens += event.output_tokens;
        self.total_cost_usd += event.cost_usd;
        self.total_duration_ms += event.duration_ms;

        match event.status {
            EventStatus::Success => self.success_count += 1,
            EventStatus::Failure => self.failure_count += 1,
            EventStatus::Pending => {}
        }

        match event.kind {
            EventKind::AgentCall => self.agent_calls += 1,
            EventKind::GateVote => self.gate_votes += 1,
            EventKind::PhaseChange => {
                self.phase_changes += 1;
                if let Some(phase) = &event.phase {
                    self.current_phase = Some(phase.clone());
                    if !self.phases_completed.contains(phase) {
                        self.phases_completed.push(phase.clone());
                    }
                }
            }
            EventKind::SessionEnd => self.ended_at = Some(event.timestamp),
            EventKind::SessionStart | EventKind::Decision | EventKind::Escalation => {}
        }
    }

    /// Rebuild a summary from a session's events.
    ///
    /// Identity and start time come from the first event. Returns `None`
    /// for an empty log.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a AuditEvent>) -> Option<Self> {
        let mut events = events.into_iter();
        let first = events.next()?;
        let mut summary = Self::new(&first.session_id, &first.project_id, first.timestamp);
        summary.apply(first);
        for event in events {
            summary.apply(event);
        }
        Some(summary)
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Vec<AuditEvent> {
        let t0 = Utc::now();
        let ev = |kind| AuditEvent::new(kind, "2025-01-15_143022", "shop", t0);
        vec![
            ev(EventKind::SessionStart),
            ev(EventKind::AgentCall)
                .with_usage("claude-sonnet-4-20250514", 1200, 300)
                .with_cost(0.0081)
                .with_duration_ms(900),
            ev(EventKind::AgentCall)
                .with_usage("claude-sonnet-4-20250514", 800, 200)
                .with_cost(0.0054)
                .with_status(EventStatus::Failure),
            ev(EventKind::GateVote).with_agent("requirements_gate"),
            ev(EventKind::PhaseChange).with_phase("requirements_review"),
            ev(EventKind::PhaseChange).with_phase("design"),
            ev(EventKind::PhaseChange).with_phase("design"),
            ev(EventKind::Escalation).with_status(EventStatus::Pending),
        ]
    }

    #[test]
    fn apply_counts_by_kind_and_status() {
        let summary = SessionSummary::replay(&session()).unwrap();
        assert_eq!(summary.event_count, 8);
        assert_eq!(summary.agent_calls, 2);
        assert_eq!(summary.gate_votes, 1);
        assert_eq!(summary.phase_changes, 3);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(summary.success_count, 6);
        assert_eq!(summary.total_tokens(), 2500);
        assert_eq!(summary.phases_completed, vec!["requirements_review", "design"]);
        assert_eq!(summary.current_phase.as_deref(), Some("design"));
        assert!(!summary.is_finished());
    }

    #[test]
    fn replay_matches_incremental_summary() {
        let events = session();
        let mut live = SessionSummary::new(&events[0].session_id, &events[0].project_id, events[0].timestamp);
        for e in &events {
            live.apply(e);
        }
        assert_eq!(SessionSummary::replay(&events), Some(live));
    }

    #[test]
    fn session_end_sets_ended_at() {
        let mut events = session();
        let end = Utc::now();
        events.push(AuditEvent::new(EventKind::SessionEnd, "2025-01-15_143022", "shop", end));
        let summary = SessionSummary::replay(&events).unwrap();
        assert_eq!(summary.ended_at, Some(end));
    }

    #[test]
    fn empty_log_has_no_summary() {
        assert_eq!(SessionSummary::replay(&Vec::<AuditEvent>::new()), None);
    }
}
