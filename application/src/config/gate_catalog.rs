//! The set of gates a workflow can run.
//!
//! Review phases name their gate by id; the catalog resolves the id to a
//! [`GateConfig`]. Defaults cover every review phase plus the gate used for
//! individual assessment steps, and configuration may replace any of them.

use gatekeeper_domain::{GateConfig, QuorumRule};
use std::collections::BTreeMap;

/// Gate reviewing a single assessment step.
pub const ASSESSMENT_STEP_GATE: &str = "assessment_step";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateCatalog {
    gates: BTreeMap<String, GateConfig>,
}

fn voters(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

impl Default for GateCatalog {
    fn default() -> Self {
        let gates = [
            GateConfig::quorum(
                "requirements_approval",
                "Requirements Approval",
                voters(&["voter_product", "voter_architecture", "voter_qa"]),
                QuorumRule::Majority,
            )
            .with_trigger("User stories and acceptance criteria are ready for design"),
            GateConfig::quorum(
                "architecture_approval",
                "Architecture Approval",
                voters(&["voter_architecture", "voter_security", "voter_performance"]),
                QuorumRule::Majority,
            )
            .with_trigger("System architecture is ready for implementation"),
            GateConfig::quorum(
                "code_review",
                "Code Review",
                voters(&["voter_security", "voter_qa", "voter_maintainability"]),
                QuorumRule::AtLeast(2),
            )
            .with_trigger("Implementation is ready for simplification and testing"),
            GateConfig::single(
                "test_coverage",
                "Test Coverage",
                "voter_qa",
                vec![
                    "Every acceptance criterion has at least one test".into(),
                    "Edge cases and failure paths are exercised".into(),
                    "Tests are deterministic".into(),
                ],
            )
            .with_trigger("Test suite is ready for documentation"),
            GateConfig::quorum(
                "release_readiness",
                "Release Readiness",
                voters(&["voter_product", "voter_qa", "voter_security"]),
                QuorumRule::Unanimous,
            )
            .with_trigger("Feature is documented and ready to deploy"),
            GateConfig::quorum(
                "assessment_approval",
                "Assessment Approval",
                voters(&["voter_architecture", "voter_security", "voter_qa"]),
                QuorumRule::Majority,
            )
            .with_trigger("Codebase assessment is ready for improvement planning"),
            GateConfig::quorum(
                "planning_approval",
                "Improvement Plan Approval",
                voters(&["voter_product", "voter_architecture", "voter_qa"]),
                QuorumRule::Majority,
            )
            .with_trigger("Improvement plan is ready for execution"),
            GateConfig::quorum(
                ASSESSMENT_STEP_GATE,
                "Assessment Step Review",
                voters(&["voter_architecture", "voter_security", "voter_qa"]),
                QuorumRule::Majority,
            )
            .with_trigger("One assessment step is specific, evidenced and complete"),
        ];
        Self {
            gates: gates.into_iter().map(|g| (g.id.clone(), g)).collect(),
        }
    }
}

impl GateCatalog {
    pub fn empty() -> Self {
        Self {
            gates: BTreeMap::new(),
        }
    }

    /// Add or replace a gate.
    pub fn with_gate(mut self, gate: GateConfig) -> Self {
        self.gates.insert(gate.id.clone(), gate);
        self
    }

    pub fn get(&self, gate_id: &str) -> Option<&GateConfig> {
        self.gates.get(gate_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GateConfig> {
        self.gates.values()
    }

    /// Apply a default retry budget to every gate.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        for gate in self.gates.values_mut() {
            gate.max_retries = max_retries;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_domain::{PhaseKind, WorkflowPhase};

    #[test]
    fn defaults_cover_every_review_phase() {
        let catalog = GateCatalog::default();
        for phase in WorkflowPhase::ALL {
            if let PhaseKind::Review { gate, .. } = phase.kind() {
                assert!(catalog.get(gate).is_some(), "missing gate {gate}");
            }
        }
        assert!(catalog.get(ASSESSMENT_STEP_GATE).is_some());
    }

    #[test]
    fn default_thresholds_are_attainable() {
        for gate in GateCatalog::default().iter() {
            assert!(gate.threshold() <= gate.voters().len(), "{}", gate.id);
        }
    }

    #[test]
    fn with_gate_replaces_by_id() {
        let catalog = GateCatalog::default().with_gate(GateConfig::quorum(
            "code_review",
            "Strict Review",
            vec!["a".into()],
            QuorumRule::Unanimous,
        ));
        assert_eq!(catalog.get("code_review").map(|g| g.name.as_str()), Some("Strict Review"));
    }
}
