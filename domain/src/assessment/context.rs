//! What an assessment step looks at.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Assessment steps of the ingest pipeline, in report order.
pub const STEP_NAMES: [&str; 10] = [
    "architecture",
    "code_quality",
    "tech_debt",
    "security",
    "ux_navigation",
    "ux_styling",
    "ux_accessibility",
    "performance",
    "testing",
    "documentation",
];

/// Input shared by every assessment step of one ingest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentContext {
    pub project_id: String,
    pub source_path: String,
    /// Facts that gate conditional rules, e.g. `has_database`.
    #[serde(default)]
    pub facts: BTreeSet<String>,
    /// Free-form description of the codebase handed to assessor agents.
    #[serde(default)]
    pub summary: String,
}

impl AssessmentContext {
    pub fn new(project_id: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            source_path: source_path.into(),
            ..Default::default()
        }
    }

    pub fn with_fact(mut self, fact: impl Into<String>) -> Self {
        self.facts.insert(fact.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }
}

/// Who assesses a step and what they look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepProfile {
    pub agent: &'static str,
    pub role: &'static str,
    pub focus: &'static str,
}

const PROFILES: [(&str, StepProfile); 10] = [
    ("architecture", StepProfile {
        agent: "solutions_architect",
        role: "Architecture Assessor",
        focus: "code organization, module structure, dependency management, design patterns",
    }),
    ("code_quality", StepProfile {
        agent: "code_reviewer",
        role: "Code Quality Assessor",
        focus: "coding standards, linting, formatting, type safety, code smells",
    }),
    ("tech_debt", StepProfile {
        agent: "tech_debt_analyst",
        role: "Tech Debt Assessor",
        focus: "TODOs, deprecated dependencies, outdated patterns, upgrade paths",
    }),
    ("security", StepProfile {
        agent: "security_specialist",
        role: "Security Assessor",
        focus: "vulnerabilities, secrets management, authentication, input validation",
    }),
    ("ux_navigation", StepProfile {
        agent: "ux_navigation",
        role: "UX Navigation Assessor",
        focus: "routing, navigation components, user flow, error handling",
    }),
    ("ux_styling", StepProfile {
        agent: "ux_styling",
        role: "UX Styling Assessor",
        focus: "CSS frameworks, design systems, responsive design, theming",
    }),
    ("ux_accessibility", StepProfile {
        agent: "ux_accessibility",
        role: "Accessibility Assessor",
        focus: "ARIA, semantic HTML, screen reader support, keyboard navigation",
    }),
    ("performance", StepProfile {
        agent: "performance",
        role: "Performance Assessor",
        focus: "code splitting, lazy loading, caching, bundle size, optimization",
    }),
    ("testing", StepProfile {
        agent: "test_writer",
        role: "Testing Assessor",
        focus: "test coverage, unit tests, E2E tests, test quality",
    }),
    ("documentation", StepProfile {
        agent: "technical_writer",
        role: "Documentation Assessor",
        focus: "README, API docs, code comments, architecture docs",
    }),
];

/// Profile for a step. Unknown steps fall back to the generic assessor.
pub fn step_profile(step: &str) -> StepProfile {
    PROFILES
        .iter()
        .find(|(name, _)| *name == step)
        .map(|(_, profile)| *profile)
        .unwrap_or(StepProfile {
            agent: "codebase_assessor",
            role: "Codebase Assessor",
            focus: "overall code health",
        })
}
