//! Persistent state of one workflow session.

use super::phase::{TerminalKind, WorkflowPhase};
use crate::assessment::AssessmentReport;
use crate::core::error::DomainError;
use crate::core::text;
use crate::quorum::GateResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rationale text kept on a decision record.
pub const RATIONALE_MAX_BYTES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    /// Build a feature from an idea, starting at ideation.
    Feature,
    /// Assess and improve an existing codebase, starting at ingest_assessment.
    Ingest,
}

impl WorkflowMode {
    pub fn entry_phase(&self) -> WorkflowPhase {
        match self {
            WorkflowMode::Feature => WorkflowPhase::Ideation,
            WorkflowMode::Ingest => WorkflowPhase::IngestAssessment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub phase: WorkflowPhase,
    pub decision: String,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub project_id: String,
    pub mode: WorkflowMode,
    pub current_phase: WorkflowPhase,
    /// Feature request, or the source path being ingested.
    pub feature: String,
    /// Artifacts keyed by the phase that produced them.
    #[serde(default)]
    pub artifacts: BTreeMap<WorkflowPhase, String>,
    #[serde(default)]
    pub decisions: Vec<Decision>,
    #[serde(default)]
    pub gate_results: Vec<GateResult>,
    /// Failed production attempts per phase.
    #[serde(default)]
    pub retry_counts: BTreeMap<WorkflowPhase, u32>,
    /// Latest ingest assessment, step by step, so a resumed run can keep
    /// the steps that already finished.
    #[serde(default)]
    pub assessment: Option<AssessmentReport>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(project_id: impl Into<String>, mode: WorkflowMode, feature: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            project_id: project_id.into(),
            mode,
            current_phase: mode.entry_phase(),
            feature: feature.into(),
            artifacts: BTreeMap::new(),
            decisions: Vec::new(),
            gate_results: Vec::new(),
            retry_counts: BTreeMap::new(),
            assessment: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.current_phase.is_terminal()
    }

    /// Move to the fixed successor of the current phase.
    pub fn advance(&mut self) -> Result<WorkflowPhase, DomainError> {
        let next = self
            .current_phase
            .successor()
            .ok_or(DomainError::TerminalPhase(self.current_phase))?;
        self.current_phase = next;
        self.touch();
        Ok(next)
    }

    /// Stop the workflow. Terminal phases are sticky: stopping a stopped
    /// workflow is an error.
    pub fn stop(&mut self, kind: TerminalKind) -> Result<WorkflowPhase, DomainError> {
        if self.is_finished() {
            return Err(DomainError::TerminalPhase(self.current_phase));
        }
        self.current_phase = match kind {
            TerminalKind::Complete => WorkflowPhase::Complete,
            TerminalKind::Failed => WorkflowPhase::Failed,
            TerminalKind::Escalated => WorkflowPhase::Escalated,
        };
        self.touch();
        Ok(self.current_phase)
    }

    /// Put an escalated workflow back at a phase so a human-approved run
    /// can continue from there.
    pub fn reopen_at(&mut self, phase: WorkflowPhase) -> Result<(), DomainError> {
        if self.current_phase != WorkflowPhase::Escalated || phase.is_terminal() {
            return Err(DomainError::TerminalPhase(self.current_phase));
        }
        self.current_phase = phase;
        self.touch();
        Ok(())
    }

    pub fn store_artifact(&mut self, phase: WorkflowPhase, content: impl Into<String>) {
        self.artifacts.insert(phase, content.into());
        self.touch();
    }

    /// Keep an assessment report both as the phase's markdown artifact and
    /// in structured form.
    pub fn record_assessment(&mut self, phase: WorkflowPhase, report: AssessmentReport) {
        self.artifacts.insert(phase, report.to_markdown());
        self.assessment = Some(report);
        self.touch();
    }

    pub fn artifact(&self, phase: WorkflowPhase) -> Option<&str> {
        self.artifacts.get(&phase).map(String::as_str)
    }

    pub fn record_decision(
        &mut self,
        agent_id: impl Into<String>,
        decision: impl Into<String>,
        rationale: &str,
    ) {
        self.decisions.push(Decision {
            timestamp: Utc::now(),
            agent_id: agent_id.into(),
            phase: self.current_phase,
            decision: decision.into(),
            rationale: text::clip(rationale, RATIONALE_MAX_BYTES).to_string(),
        });
        self.touch();
    }

    pub fn record_gate_result(&mut self, result: GateResult) {
        self.gate_results.push(result);
        self.touch();
    }

    /// Count a failed production attempt for the current phase and return
    /// the new total.
    pub fn bump_retry(&mut self) -> u32 {
        let count = self.retry_counts.entry(self.current_phase).or_insert(0);
        *count += 1;
        let count = *count;
        self.touch();
        count
    }

    pub fn retries(&self, phase: WorkflowPhase) -> u32 {
        self.retry_counts.get(&phase).copied().unwrap_or(0)
    }

    /// Most recent gate result for a gate id.
    pub fn last_gate_result(&self, gate_id: &str) -> Option<&GateResult> {
        self.gate_results.iter().rev().find(|r| r.gate_id == gate_id)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_at_mode_entry() {
        let feature = WorkflowState::new("p1", WorkflowMode::Feature, "dark mode");
        assert_eq!(feature.current_phase, WorkflowPhase::Ideation);
        let ingest = WorkflowState::new("p2", WorkflowMode::Ingest, "./repo");
        assert_eq!(ingest.current_phase, WorkflowPhase::IngestAssessment);
    }

    #[test]
    fn advance_follows_transition_table() {
        let mut state = WorkflowState::new("p", WorkflowMode::Feature, "f");
        assert_eq!(state.advance(), Ok(WorkflowPhase::Prioritization));
        assert_eq!(state.advance(), Ok(WorkflowPhase::Requirements));
        assert_eq!(state.current_phase, WorkflowPhase::Requirements);
    }

    #[test]
    fn terminal_phases_never_advance() {
        let mut state = WorkflowState::new("p", WorkflowMode::Feature, "f");
        state.stop(TerminalKind::Escalated).unwrap();
        assert_eq!(
            state.advance(),
            Err(DomainError::TerminalPhase(WorkflowPhase::Escalated))
        );
        assert!(state.stop(TerminalKind::Failed).is_err());
        assert_eq!(state.current_phase, WorkflowPhase::Escalated);
    }

    #[test]
    fn reopen_only_from_escalated() {
        let mut state = WorkflowState::new("p", WorkflowMode::Feature, "f");
        assert!(state.reopen_at(WorkflowPhase::Design).is_err());
        state.stop(TerminalKind::Escalated).unwrap();
        state.reopen_at(WorkflowPhase::CodeReview).unwrap();
        assert_eq!(state.current_phase, WorkflowPhase::CodeReview);
    }

    #[test]
    fn decision_rationale_is_bounded() {
        let mut state = WorkflowState::new("p", WorkflowMode::Feature, "f");
        state.record_decision("ideation", "Generated ideas", &"r".repeat(2000));
        assert_eq!(state.decisions[0].rationale.len(), RATIONALE_MAX_BYTES);
        assert_eq!(state.decisions[0].phase, WorkflowPhase::Ideation);
    }

    #[test]
    fn retry_counter_is_per_phase() {
        let mut state = WorkflowState::new("p", WorkflowMode::Feature, "f");
        assert_eq!(state.bump_retry(), 1);
        assert_eq!(state.bump_retry(), 2);
        state.advance().unwrap();
        assert_eq!(state.bump_retry(), 1);
        assert_eq!(state.retries(WorkflowPhase::Ideation), 2);
    }

    #[test]
    fn assessment_is_kept_in_both_forms() {
        let mut state = WorkflowState::new("p", WorkflowMode::Ingest, "./repo");
        state.record_assessment(WorkflowPhase::IngestAssessment, AssessmentReport::new("p"));

        assert!(state.artifact(WorkflowPhase::IngestAssessment).unwrap().starts_with("# Assessment: p"));
        let back: WorkflowState = serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();
        assert_eq!(back.assessment, Some(AssessmentReport::new("p")));
    }

    #[test]
    fn state_without_assessment_field_still_loads() {
        let state = WorkflowState::new("p", WorkflowMode::Feature, "f");
        let mut json = serde_json::to_value(&state).unwrap();
        json.as_object_mut().unwrap().remove("assessment");
        let back: WorkflowState = serde_json::from_value(json).unwrap();
        assert!(back.assessment.is_none());
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = WorkflowState::new("p", WorkflowMode::Feature, "f");
        state.store_artifact(WorkflowPhase::Ideation, "ideas");
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"current_phase\":\"ideation\""));
        let back: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.artifact(WorkflowPhase::Ideation), Some("ideas"));
    }
}
