//! Audit events: one JSON line per thing that happened in a session.

use crate::core::text;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upper bound on the input and output summaries stored per event.
pub const SUMMARY_MAX_BYTES: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStart,
    AgentCall,
    GateVote,
    PhaseChange,
    Decision,
    Escalation,
    SessionEnd,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SessionStart => "session_start",
            EventKind::AgentCall => "agent_call",
            EventKind::GateVote => "gate_vote",
            EventKind::PhaseChange => "phase_change",
            EventKind::Decision => "decision",
            EventKind::Escalation => "escalation",
            EventKind::SessionEnd => "session_end",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Success,
    Failure,
    /// Waiting on a human.
    Pending,
}

/// A single ledger record.
///
/// Optional fields are omitted from the JSON line when unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "event_type")]
    pub kind: EventKind,
    pub session_id: String,
    pub project_id: String,
    /// Agent id, or gate id for gate summaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
    #[serde(default)]
    pub input_summary: String,
    #[serde(default)]
    pub output_summary: String,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl AuditEvent {
    pub fn new(
        kind: EventKind,
        session_id: impl Into<String>,
        project_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            kind,
            session_id: session_id.into(),
            project_id: project_id.into(),
            agent: None,
            phase: None,
            checkpoint: None,
            input_summary: String::new(),
            output_summary: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            model: None,
            cost_usd: 0.0,
            duration_ms: 0,
            status: EventStatus::Success,
            metadata: None,
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: Option<&str>) -> Self {
        self.checkpoint = checkpoint.map(str::to_string);
        self
    }

    /// Store a bounded copy of the input text.
    pub fn with_input(mut self, input: &str) -> Self {
        self.input_summary = text::clip(input, SUMMARY_MAX_BYTES).to_string();
        self
    }

    /// Store a bounded copy of the output text.
    pub fn with_output(mut self, output: &str) -> Self {
        self.output_summary = text::clip(output, SUMMARY_MAX_BYTES).to_string();
        self
    }

    pub fn with_usage(mut self, model: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Self {
        self.model = Some(model.into());
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summaries_are_bounded_on_char_boundaries() {
        let long = "é".repeat(1500);
        let event = AuditEvent::new(EventKind::Decision, "s", "p", Utc::now()).with_input(&long);
        assert!(event.input_summary.len() <= SUMMARY_MAX_BYTES);
        assert_eq!(event.input_summary.chars().count(), 1000);
    }

    #[test]
    fn unset_fields_are_omitted_from_the_line() {
        let event = AuditEvent::new(EventKind::SessionStart, "s1", "p1", Utc::now());
        let line = serde_json::to_string(&event).unwrap();
        assert!(line.contains(r#""event_type":"session_start""#));
        assert!(!line.contains("agent"));
        assert!(!line.contains("metadata"));
    }

    #[test]
    fn reads_lines_with_missing_optional_fields() {
        let line = json!({
            "timestamp": "2025-01-15T14:30:22Z",
            "event_type": "escalation",
            "session_id": "s",
            "project_id": "p",
            "status": "pending"
        })
        .to_string();
        let event: AuditEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(event.kind, EventKind::Escalation);
        assert_eq!(event.status, EventStatus::Pending);
        assert_eq!(event.total_tokens(), 0);
    }
}
