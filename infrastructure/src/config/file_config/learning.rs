//! Learning loop configuration from TOML (`[learning]` section)

use crate::config::issue::{ConfigIssue, ConfigIssueCode};
use gatekeeper_domain::LearningPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ```toml
/// [learning]
/// initial_confidence = 50
/// confidence_increment = 15
/// promotion_confidence = 80
/// promotion_occurrences = 3
/// surface_confidence = 65
/// lessons_path = "~/.gatekeeper/lessons.json"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLearningConfig {
    pub initial_confidence: u8,
    pub confidence_increment: u8,
    pub promotion_confidence: u8,
    pub promotion_occurrences: u32,
    pub surface_confidence: u8,
    /// Defaults to `~/.gatekeeper/lessons.json`.
    pub lessons_path: Option<PathBuf>,
}

impl Default for FileLearningConfig {
    fn default() -> Self {
        let policy = LearningPolicy::default();
        Self {
            initial_confidence: policy.initial_confidence,
            confidence_increment: policy.confidence_increment,
            promotion_confidence: policy.promotion_confidence,
            promotion_occurrences: policy.promotion_occurrences,
            surface_confidence: policy.surface_confidence,
            lessons_path: None,
        }
    }
}

impl FileLearningConfig {
    /// Confidences are clamped to 50..=100, the range lessons live in.
    pub fn to_policy(&self) -> (LearningPolicy, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut clamp = |name: &str, value: u8| {
            let clamped = value.clamp(50, 100);
            if clamped != value {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::OutOfRange {
                        field: format!("learning.{name}"),
                        value: value.to_string(),
                    },
                    format!("learning.{name}: {value} is outside 50..=100, using {clamped}"),
                ));
            }
            clamped
        };

        let policy = LearningPolicy {
            initial_confidence: clamp("initial_confidence", self.initial_confidence),
            confidence_increment: self.confidence_increment,
            promotion_confidence: clamp("promotion_confidence", self.promotion_confidence),
            promotion_occurrences: self.promotion_occurrences.max(1),
            surface_confidence: clamp("surface_confidence", self.surface_confidence),
        };
        (policy, issues)
    }
}
