//! Workflow phases and the fixed transition table.
//!
//! Every phase belongs to exactly one [`PhaseKind`]. The engine dispatches
//! on the kind, never on the phase name, so adding a phase means adding one
//! arm to [`WorkflowPhase::kind`] and one to [`WorkflowPhase::successor`].

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// A named step in the pipeline graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    // Feature pipeline
    Ideation,
    Prioritization,
    Requirements,
    RequirementsReview,
    Design,
    Architecture,
    ArchitectureReview,
    Development,
    CodeReview,
    Simplification,
    Testing,
    TestReview,
    Documentation,
    ReleaseReview,
    Deployment,

    // Ingest pipeline
    IngestAssessment,
    IngestAssessmentReview,
    IngestPlanning,
    IngestPlanningReview,
    IngestExecution,

    // Terminal
    Complete,
    Failed,
    Escalated,
}

/// Why a workflow stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    /// All phases passed.
    Complete,
    /// No retry path exists (missing input, production attempts exhausted).
    Failed,
    /// A gate exhausted its revisions; a human has to look at it.
    Escalated,
}

/// What a phase does when the engine runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    /// One agent produces the artifact stored under this phase.
    Production { agent: &'static str },
    /// Independent assessment steps run in parallel, each behind its own gate.
    Assessment { agent: &'static str },
    /// A quorum gate reviews the artifact of `reviewed`; `reviser` revises it.
    Review {
        gate: &'static str,
        reviewed: WorkflowPhase,
        reviser: &'static str,
    },
    Terminal(TerminalKind),
}

impl WorkflowPhase {
    /// Phases of the feature pipeline, in order.
    pub const FEATURE_PIPELINE: [WorkflowPhase; 15] = [
        WorkflowPhase::Ideation,
        WorkflowPhase::Prioritization,
        WorkflowPhase::Requirements,
        WorkflowPhase::RequirementsReview,
        WorkflowPhase::Design,
        WorkflowPhase::Architecture,
        WorkflowPhase::ArchitectureReview,
        WorkflowPhase::Development,
        WorkflowPhase::CodeReview,
        WorkflowPhase::Simplification,
        WorkflowPhase::Testing,
        WorkflowPhase::TestReview,
        WorkflowPhase::Documentation,
        WorkflowPhase::ReleaseReview,
        WorkflowPhase::Deployment,
    ];

    /// Phases of the ingest pipeline, in order.
    pub const INGEST_PIPELINE: [WorkflowPhase; 5] = [
        WorkflowPhase::IngestAssessment,
        WorkflowPhase::IngestAssessmentReview,
        WorkflowPhase::IngestPlanning,
        WorkflowPhase::IngestPlanningReview,
        WorkflowPhase::IngestExecution,
    ];

    pub const ALL: [WorkflowPhase; 23] = [
        WorkflowPhase::Ideation,
        WorkflowPhase::Prioritization,
        WorkflowPhase::Requirements,
        WorkflowPhase::RequirementsReview,
        WorkflowPhase::Design,
        WorkflowPhase::Architecture,
        WorkflowPhase::ArchitectureReview,
        WorkflowPhase::Development,
        WorkflowPhase::CodeReview,
        WorkflowPhase::Simplification,
        WorkflowPhase::Testing,
        WorkflowPhase::TestReview,
        WorkflowPhase::Documentation,
        WorkflowPhase::ReleaseReview,
        WorkflowPhase::Deployment,
        WorkflowPhase::IngestAssessment,
        WorkflowPhase::IngestAssessmentReview,
        WorkflowPhase::IngestPlanning,
        WorkflowPhase::IngestPlanningReview,
        WorkflowPhase::IngestExecution,
        WorkflowPhase::Complete,
        WorkflowPhase::Failed,
        WorkflowPhase::Escalated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Ideation => "ideation",
            WorkflowPhase::Prioritization => "prioritization",
            WorkflowPhase::Requirements => "requirements",
            WorkflowPhase::RequirementsReview => "requirements_review",
            WorkflowPhase::Design => "design",
            WorkflowPhase::Architecture => "architecture",
            WorkflowPhase::ArchitectureReview => "architecture_review",
            WorkflowPhase::Development => "development",
            WorkflowPhase::CodeReview => "code_review",
            WorkflowPhase::Simplification => "simplification",
            WorkflowPhase::Testing => "testing",
            WorkflowPhase::TestReview => "test_review",
            WorkflowPhase::Documentation => "documentation",
            WorkflowPhase::ReleaseReview => "release_review",
            WorkflowPhase::Deployment => "deployment",
            WorkflowPhase::IngestAssessment => "ingest_assessment",
            WorkflowPhase::IngestAssessmentReview => "ingest_assessment_review",
            WorkflowPhase::IngestPlanning => "ingest_planning",
            WorkflowPhase::IngestPlanningReview => "ingest_planning_review",
            WorkflowPhase::IngestExecution => "ingest_execution",
            WorkflowPhase::Complete => "complete",
            WorkflowPhase::Failed => "failed",
            WorkflowPhase::Escalated => "escalated",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WorkflowPhase::Ideation => "Ideation",
            WorkflowPhase::Prioritization => "Prioritization",
            WorkflowPhase::Requirements => "Requirements",
            WorkflowPhase::RequirementsReview => "Requirements Review",
            WorkflowPhase::Design => "UI/UX Design",
            WorkflowPhase::Architecture => "Architecture",
            WorkflowPhase::ArchitectureReview => "Architecture Review",
            WorkflowPhase::Development => "Development",
            WorkflowPhase::CodeReview => "Code Review",
            WorkflowPhase::Simplification => "Simplification",
            WorkflowPhase::Testing => "Testing",
            WorkflowPhase::TestReview => "Test Review",
            WorkflowPhase::Documentation => "Documentation",
            WorkflowPhase::ReleaseReview => "Release Review",
            WorkflowPhase::Deployment => "Deployment",
            WorkflowPhase::IngestAssessment => "Codebase Assessment",
            WorkflowPhase::IngestAssessmentReview => "Assessment Review",
            WorkflowPhase::IngestPlanning => "Improvement Planning",
            WorkflowPhase::IngestPlanningReview => "Planning Review",
            WorkflowPhase::IngestExecution => "Execution",
            WorkflowPhase::Complete => "Complete",
            WorkflowPhase::Failed => "Failed",
            WorkflowPhase::Escalated => "Escalated",
        }
    }

    /// The phase's kind together with the data the engine needs to run it.
    pub fn kind(&self) -> PhaseKind {
        use WorkflowPhase as P;
        match self {
            P::Ideation => PhaseKind::Production { agent: "ideation" },
            P::Prioritization => PhaseKind::Production {
                agent: "product_owner",
            },
            P::Requirements => PhaseKind::Production {
                agent: "business_analyst",
            },
            P::Design => PhaseKind::Production {
                agent: "ui_ux_designer",
            },
            P::Architecture => PhaseKind::Production {
                agent: "solutions_architect",
            },
            P::Development => PhaseKind::Production { agent: "developer" },
            P::Simplification => PhaseKind::Production {
                agent: "code_simplifier",
            },
            P::Testing => PhaseKind::Production {
                agent: "test_writer",
            },
            P::Documentation => PhaseKind::Production {
                agent: "technical_writer",
            },
            P::Deployment => PhaseKind::Production { agent: "devops" },
            P::IngestAssessment => PhaseKind::Assessment {
                agent: "codebase_assessor",
            },
            P::IngestPlanning => PhaseKind::Production {
                agent: "improvement_planner",
            },
            P::IngestExecution => PhaseKind::Production {
                agent: "execution_coordinator",
            },
            P::RequirementsReview => PhaseKind::Review {
                gate: "requirements_approval",
                reviewed: P::Requirements,
                reviser: "business_analyst",
            },
            P::ArchitectureReview => PhaseKind::Review {
                gate: "architecture_approval",
                reviewed: P::Architecture,
                reviser: "solutions_architect",
            },
            P::CodeReview => PhaseKind::Review {
                gate: "code_review",
                reviewed: P::Development,
                reviser: "developer",
            },
            P::TestReview => PhaseKind::Review {
                gate: "test_coverage",
                reviewed: P::Testing,
                reviser: "test_writer",
            },
            P::ReleaseReview => PhaseKind::Review {
                gate: "release_readiness",
                reviewed: P::Documentation,
                reviser: "technical_writer",
            },
            P::IngestAssessmentReview => PhaseKind::Review {
                gate: "assessment_approval",
                reviewed: P::IngestAssessment,
                reviser: "codebase_assessor",
            },
            P::IngestPlanningReview => PhaseKind::Review {
                gate: "planning_approval",
                reviewed: P::IngestPlanning,
                reviser: "improvement_planner",
            },
            P::Complete => PhaseKind::Terminal(TerminalKind::Complete),
            P::Failed => PhaseKind::Terminal(TerminalKind::Failed),
            P::Escalated => PhaseKind::Terminal(TerminalKind::Escalated),
        }
    }

    /// The transition table. `None` exactly for terminal phases.
    pub fn successor(&self) -> Option<WorkflowPhase> {
        use WorkflowPhase as P;
        let next = match self {
            P::Ideation => P::Prioritization,
            P::Prioritization => P::Requirements,
            P::Requirements => P::RequirementsReview,
            P::RequirementsReview => P::Design,
            P::Design => P::Architecture,
            P::Architecture => P::ArchitectureReview,
            P::ArchitectureReview => P::Development,
            P::Development => P::CodeReview,
            P::CodeReview => P::Simplification,
            P::Simplification => P::Testing,
            P::Testing => P::TestReview,
            P::TestReview => P::Documentation,
            P::Documentation => P::ReleaseReview,
            P::ReleaseReview => P::Deployment,
            P::Deployment => P::Complete,
            P::IngestAssessment => P::IngestAssessmentReview,
            P::IngestAssessmentReview => P::IngestPlanning,
            P::IngestPlanning => P::IngestPlanningReview,
            P::IngestPlanningReview => P::IngestExecution,
            P::IngestExecution => P::Complete,
            P::Complete | P::Failed | P::Escalated => return None,
        };
        Some(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind(), PhaseKind::Terminal(_))
    }

    /// The review phase guarded by `gate_id`.
    pub fn for_gate(gate_id: &str) -> Option<WorkflowPhase> {
        Self::ALL
            .into_iter()
            .find(|p| matches!(p.kind(), PhaseKind::Review { gate, .. } if gate == gate_id))
    }

    /// Checkpoint label used in ledger events, e.g. `CP-CODE-REVIEW`.
    pub fn checkpoint(&self) -> String {
        format!("CP-{}", self.as_str().to_uppercase().replace('_', "-"))
    }

    /// Phases whose artifacts feed the prompt for this phase: every earlier
    /// production phase of the same pipeline.
    pub fn upstream(&self) -> Vec<WorkflowPhase> {
        let pipeline: &[WorkflowPhase] = if Self::INGEST_PIPELINE.contains(self) {
            &Self::INGEST_PIPELINE
        } else {
            &Self::FEATURE_PIPELINE
        };
        pipeline
            .iter()
            .take_while(|p| *p != self)
            .filter(|p| {
                matches!(
                    p.kind(),
                    PhaseKind::Production { .. } | PhaseKind::Assessment { .. }
                )
            })
            .copied()
            .collect()
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WorkflowPhase {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|p| p.as_str() == needle)
            .copied()
            .ok_or_else(|| DomainError::UnknownPhase(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_non_terminal_phase_has_exactly_one_successor() {
        for phase in WorkflowPhase::ALL {
            match phase.kind() {
                PhaseKind::Terminal(_) => assert_eq!(phase.successor(), None, "{phase}"),
                _ => assert!(phase.successor().is_some(), "{phase} has no successor"),
            }
        }
    }

    #[test]
    fn feature_pipeline_walks_in_order_to_complete() {
        let mut phase = WorkflowPhase::Ideation;
        let mut visited = vec![phase];
        while let Some(next) = phase.successor() {
            phase = next;
            visited.push(phase);
        }
        assert_eq!(phase, WorkflowPhase::Complete);
        assert_eq!(&visited[..15], &WorkflowPhase::FEATURE_PIPELINE);
    }

    #[test]
    fn ingest_pipeline_ends_at_complete() {
        let mut phase = WorkflowPhase::IngestAssessment;
        for expected in &WorkflowPhase::INGEST_PIPELINE[1..] {
            phase = phase.successor().unwrap();
            assert_eq!(phase, *expected);
        }
        assert_eq!(phase.successor(), Some(WorkflowPhase::Complete));
    }

    #[test]
    fn review_phases_review_their_predecessor_production() {
        for phase in WorkflowPhase::ALL {
            if let PhaseKind::Review { reviewed, .. } = phase.kind() {
                assert_eq!(reviewed.successor(), Some(phase), "{phase}");
                assert!(!matches!(reviewed.kind(), PhaseKind::Review { .. }));
            }
        }
    }

    #[test]
    fn release_review_checks_documentation() {
        match WorkflowPhase::ReleaseReview.kind() {
            PhaseKind::Review {
                gate,
                reviewed,
                reviser,
            } => {
                assert_eq!(gate, "release_readiness");
                assert_eq!(reviewed, WorkflowPhase::Documentation);
                assert_eq!(reviser, "technical_writer");
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn checkpoint_label_is_upper_kebab() {
        assert_eq!(WorkflowPhase::CodeReview.checkpoint(), "CP-CODE-REVIEW");
        assert_eq!(
            WorkflowPhase::IngestPlanningReview.checkpoint(),
            "CP-INGEST-PLANNING-REVIEW"
        );
    }

    #[test]
    fn parse_round_trips_through_as_str() {
        for phase in WorkflowPhase::ALL {
            assert_eq!(phase.as_str().parse::<WorkflowPhase>(), Ok(phase));
        }
        assert!("bogus".parse::<WorkflowPhase>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&WorkflowPhase::ArchitectureReview).unwrap();
        assert_eq!(json, "\"architecture_review\"");
    }

    #[test]
    fn upstream_stops_at_pipeline_boundary() {
        let upstream = WorkflowPhase::IngestPlanning.upstream();
        assert_eq!(upstream, vec![WorkflowPhase::IngestAssessment]);

        let upstream = WorkflowPhase::Architecture.upstream();
        assert_eq!(
            upstream,
            vec![
                WorkflowPhase::Ideation,
                WorkflowPhase::Prioritization,
                WorkflowPhase::Requirements,
                WorkflowPhase::Design,
            ]
        );
    }

    #[test]
    fn gates_map_back_to_their_review_phase() {
        assert_eq!(WorkflowPhase::for_gate("code_review"), Some(WorkflowPhase::CodeReview));
        assert_eq!(
            WorkflowPhase::for_gate("planning_approval"),
            Some(WorkflowPhase::IngestPlanningReview)
        );
        assert_eq!(WorkflowPhase::for_gate("nope"), None);
    }
}
