//! Assessment configuration from TOML (`[assessment]` section)

use crate::config::issue::{ConfigIssue, ConfigIssueCode};
use gatekeeper_application::AssessmentMode;
use gatekeeper_domain::STEP_NAMES;
use serde::{Deserialize, Serialize};

/// ```toml
/// [assessment]
/// mode = "reviewed"     # "reviewed", "standard" or "rules_only"
/// steps = ["architecture", "security", "testing"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAssessmentConfig {
    pub mode: String,
    pub steps: Vec<String>,
}

impl Default for FileAssessmentConfig {
    fn default() -> Self {
        Self {
            mode: AssessmentMode::default().as_str().to_string(),
            steps: STEP_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FileAssessmentConfig {
    pub fn parse_mode(&self) -> (AssessmentMode, Vec<ConfigIssue>) {
        let mode = match self.mode.trim().to_lowercase().replace('-', "_").as_str() {
            "reviewed" => AssessmentMode::Reviewed,
            "standard" => AssessmentMode::Standard,
            "rules_only" | "rules" => AssessmentMode::RulesOnly,
            _ => {
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "assessment.mode".to_string(),
                        value: self.mode.clone(),
                        valid_values: vec![
                            "reviewed".to_string(),
                            "standard".to_string(),
                            "rules_only".to_string(),
                        ],
                    },
                    format!(
                        "assessment.mode: unknown value '{}', falling back to 'reviewed'",
                        self.mode
                    ),
                );
                return (AssessmentMode::default(), vec![issue]);
            }
        };
        (mode, vec![])
    }

    /// Steps outside the built-in set still run with the generic assessor.
    pub fn parse_steps(&self) -> (Vec<String>, Vec<ConfigIssue>) {
        let issues = self
            .steps
            .iter()
            .filter(|step| !STEP_NAMES.contains(&step.as_str()))
            .map(|step| {
                ConfigIssue::warning(
                    ConfigIssueCode::UnknownStep { step: step.clone() },
                    format!(
                        "assessment.steps: '{}' is not a built-in step, using the generic assessor",
                        step
                    ),
                )
            })
            .collect();
        let mut steps: Vec<String> = Vec::new();
        for step in &self.steps {
            if !steps.contains(step) {
                steps.push(step.clone());
            }
        }
        (steps, issues)
    }
}
