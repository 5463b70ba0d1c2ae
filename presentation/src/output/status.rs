//! Project status view combining saved state and the ledger replay.

use gatekeeper_domain::{SessionSummary, WorkflowPhase, WorkflowState};
use serde::Serialize;

/// One gate's most recent result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateLine {
    pub gate_id: String,
    pub passed: bool,
    pub approve_count: usize,
    pub reject_count: usize,
    pub abstain_count: usize,
    pub threshold: usize,
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub project_id: String,
    /// `None` when no state has been saved for the project.
    pub phase: Option<WorkflowPhase>,
    pub mode: Option<String>,
    pub feature: Option<String>,
    pub artifacts: Vec<String>,
    pub gates: Vec<GateLine>,
    pub decisions: usize,
    pub session: Option<SessionSummary>,
}

impl StatusView {
    pub fn new(
        project_id: impl Into<String>,
        state: Option<&WorkflowState>,
        session: Option<SessionSummary>,
    ) -> Self {
        let mut view = Self {
            project_id: project_id.into(),
            phase: None,
            mode: None,
            feature: None,
            artifacts: Vec::new(),
            gates: Vec::new(),
            decisions: 0,
            session,
        };

        if let Some(state) = state {
            view.phase = Some(state.current_phase);
            view.mode = Some(format!("{:?}", state.mode).to_lowercase());
            view.feature = Some(state.feature.clone());
            view.artifacts = state.artifacts.keys().map(|p| p.to_string()).collect();
            view.decisions = state.decisions.len();

            // Latest result per gate, in the order gates were first seen.
            for result in &state.gate_results {
                let line = GateLine {
                    gate_id: result.gate_id.clone(),
                    passed: result.passed,
                    approve_count: result.approve_count,
                    reject_count: result.reject_count,
                    abstain_count: result.abstain_count(),
                    threshold: result.threshold,
                    attempt: result.retry_count + 1,
                };
                match view.gates.iter_mut().find(|g| g.gate_id == line.gate_id) {
                    Some(existing) => *existing = line,
                    None => view.gates.push(line),
                }
            }
        }
        view
    }

    pub fn has_state(&self) -> bool {
        self.phase.is_some()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gatekeeper_domain::{Ballot, GateConfig, GateResult, QuorumRule, Vote, WorkflowMode};

    fn result(passed: bool, retry: u32) -> GateResult {
        let gate = GateConfig::quorum(
            "requirements_review",
            "Requirements Review",
            vec!["pm".into()],
            QuorumRule::Majority,
        );
        let vote = if passed {
            Vote::pass("pm", "PM")
        } else {
            Vote::fail("pm", "PM")
        };
        GateResult::tally(&gate, retry, vec![Ballot::Cast(vote)], Utc::now())
    }

    #[test]
    fn test_latest_gate_result_wins() {
        let mut state = WorkflowState::new("wishlist", WorkflowMode::Feature, "Save products");
        state.store_artifact(WorkflowPhase::Requirements, "REQ");
        state.record_gate_result(result(false, 0));
        state.record_gate_result(result(true, 1));

        let view = StatusView::new("wishlist", Some(&state), None);
        assert!(view.has_state());
        assert_eq!(view.mode.as_deref(), Some("feature"));
        assert_eq!(view.artifacts, vec!["requirements".to_string()]);
        assert_eq!(view.gates.len(), 1);
        assert!(view.gates[0].passed);
        assert_eq!(view.gates[0].attempt, 2);
    }

    #[test]
    fn test_missing_state_serializes_nulls() {
        let view = StatusView::new("ghost", None, None);
        assert!(!view.has_state());
        let json: serde_json::Value = serde_json::from_str(&view.to_json()).unwrap();
        assert_eq!(json["project_id"], "ghost");
        assert!(json["phase"].is_null());
        assert!(json["session"].is_null());
    }
}
