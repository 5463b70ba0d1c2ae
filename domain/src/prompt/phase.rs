//! Task prompts for production phases

use crate::workflow::{WorkflowPhase, WorkflowState};

/// Templates for production agents
pub struct PhasePromptTemplate;

impl PhasePromptTemplate {
    /// Task prompt for the production phase `phase`.
    ///
    /// Upstream artifacts are included in pipeline order; `checklist` is the
    /// rendered lesson guidance and is appended when non-empty.
    pub fn task(phase: WorkflowPhase, state: &WorkflowState, checklist: &str) -> String {
        let mut prompt = format!("{}\n\n## Feature Request:\n{}\n", headline(phase), state.feature);

        for upstream in phase.upstream() {
            if let Some(artifact) = state.artifact(upstream) {
                prompt.push_str(&format!("\n## {}:\n{}\n", upstream.display_name(), artifact));
            }
        }

        prompt.push_str("\n## Your Task:\n");
        for (i, step) in steps(phase).iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, step));
        }

        if !checklist.is_empty() {
            prompt.push('\n');
            prompt.push_str(checklist);
        }
        prompt
    }
}

fn headline(phase: WorkflowPhase) -> &'static str {
    use WorkflowPhase as P;
    match phase {
        P::Ideation => "Analyze this feature request and generate a comprehensive feature breakdown:",
        P::Prioritization => "Prioritize the features from ideation for MVP development:",
        P::Requirements => "Create detailed user stories and requirements:",
        P::Design => "Design the user interface and experience:",
        P::Architecture => "Design the system architecture:",
        P::Development => "Implement the feature code:",
        P::Simplification => "Review and simplify the code:",
        P::Testing => "Write test scripts for the feature:",
        P::Documentation => "Create documentation for the feature:",
        P::Deployment => "Prepare deployment configuration:",
        P::IngestPlanning => "Plan improvements for the assessed codebase:",
        P::IngestExecution => "Coordinate execution of the approved improvement plan:",
        _ => "Process the following feature:",
    }
}

fn steps(phase: WorkflowPhase) -> &'static [&'static str] {
    use WorkflowPhase as P;
    match phase {
        P::Ideation => &[
            "Identify the core value proposition",
            "Break down into specific features and capabilities",
            "Identify potential MVP scope",
            "List technical considerations",
            "Suggest comparable products/features for reference",
        ],
        P::Prioritization => &[
            "Score each feature on value vs effort",
            "Define clear MVP boundaries",
            "Create prioritized backlog",
            "Identify dependencies between features",
            "Flag any scope risks",
        ],
        P::Requirements => &[
            "Write user stories in standard format (As a... I want... So that...)",
            "Define acceptance criteria for each story",
            "Document business rules",
            "Identify edge cases",
            "Create requirements traceability",
        ],
        P::Design => &[
            "Create screen/component descriptions",
            "Define user flows",
            "Specify interaction patterns",
            "Document design decisions",
            "Ensure accessibility considerations",
        ],
        P::Architecture => &[
            "Define system architecture",
            "Select appropriate design patterns",
            "Design API contracts",
            "Plan data models",
            "Document architectural decisions (ADRs)",
        ],
        P::Development => &[
            "Implement the feature according to specifications",
            "Follow the architectural patterns defined",
            "Include error handling",
            "Add inline documentation",
            "Follow coding standards",
        ],
        P::Simplification => &[
            "Identify opportunities for simplification",
            "Extract reusable components",
            "Remove duplication",
            "Improve readability",
        ],
        P::Testing => &[
            "Write end-to-end test scripts",
            "Cover all acceptance criteria",
            "Include edge case tests",
            "Create test fixtures/data",
            "Document test coverage",
        ],
        P::Documentation => &[
            "Write API documentation",
            "Create usage examples",
            "Document configuration options",
            "Write troubleshooting guide",
            "Update changelog",
        ],
        P::Deployment => &[
            "Create/update CI/CD pipeline",
            "Configure deployment scripts",
            "Set up monitoring/alerting",
            "Document deployment process",
            "Create rollback plan",
        ],
        P::IngestPlanning => &[
            "Group findings from the assessment into improvement themes",
            "Order work by severity and effort",
            "Identify dependencies between improvements",
            "Define verification for each improvement",
        ],
        P::IngestExecution => &[
            "Break the plan into executable tasks",
            "Assign each task to the responsible role",
            "Track completion criteria per task",
        ],
        _ => &["Complete the task described above"],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowMode;

    #[test]
    fn includes_upstream_artifacts_and_checklist() {
        let mut state = WorkflowState::new("p", WorkflowMode::Feature, "Login with email");
        state.store_artifact(WorkflowPhase::Requirements, "US-1: sign in");
        state.store_artifact(WorkflowPhase::Design, "Login screen");

        let prompt = PhasePromptTemplate::task(
            WorkflowPhase::Architecture,
            &state,
            "## Mandatory Checklist\n- validate input",
        );
        assert!(prompt.starts_with("Design the system architecture:"));
        assert!(prompt.contains("Login with email"));
        assert!(prompt.contains("US-1: sign in"));
        assert!(prompt.contains("Login screen"));
        assert!(prompt.contains("5. Document architectural decisions (ADRs)"));
        assert!(prompt.ends_with("- validate input"));
    }

    #[test]
    fn skips_missing_artifacts() {
        let state = WorkflowState::new("p", WorkflowMode::Feature, "Search");
        let prompt = PhasePromptTemplate::task(WorkflowPhase::Prioritization, &state, "");
        assert!(!prompt.contains("## Ideation"));
        assert!(!prompt.contains("Mandatory Checklist"));
    }
}
