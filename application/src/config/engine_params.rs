//! Engine parameters - use case loop control.
//!
//! [`EngineParams`] groups the static parameters that control the workflow
//! engine, the quorum gate and the assessment phase. These are
//! application-layer concerns, not domain policy.

use gatekeeper_domain::{LearningPolicy, STEP_NAMES};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time a single voter may take before it is counted as abstaining.
pub const DEFAULT_VOTER_TIMEOUT: Duration = Duration::from_secs(300);

/// How the ingest assessment phase treats its steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentMode {
    /// Every step goes through its own gate and rejections feed lessons.
    #[default]
    Reviewed,
    /// Steps run once without per-step voting; only the phase gate reviews.
    Standard,
    /// Only the rule engine runs; no assessor agents.
    RulesOnly,
}

impl AssessmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentMode::Reviewed => "reviewed",
            AssessmentMode::Standard => "standard",
            AssessmentMode::RulesOnly => "rules_only",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineParams {
    /// Failed production attempts allowed per phase before `failed`.
    pub max_phase_attempts: u32,
    /// Per-voter deadline; `None` waits indefinitely.
    pub voter_timeout: Option<Duration>,
    pub learning: LearningPolicy,
    pub assessment_mode: AssessmentMode,
    pub assessment_steps: Vec<String>,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            max_phase_attempts: 3,
            voter_timeout: Some(DEFAULT_VOTER_TIMEOUT),
            learning: LearningPolicy::default(),
            assessment_mode: AssessmentMode::default(),
            assessment_steps: STEP_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EngineParams {
    // ==================== Builder Methods ====================

    pub fn with_max_phase_attempts(mut self, attempts: u32) -> Self {
        self.max_phase_attempts = attempts.max(1);
        self
    }

    /// `0` disables the timeout.
    pub fn with_voter_timeout_secs(mut self, secs: u64) -> Self {
        self.voter_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    pub fn with_learning(mut self, learning: LearningPolicy) -> Self {
        self.learning = learning;
        self
    }

    pub fn with_assessment_mode(mut self, mode: AssessmentMode) -> Self {
        self.assessment_mode = mode;
        self
    }

    pub fn with_assessment_steps(mut self, steps: Vec<String>) -> Self {
        self.assessment_steps = steps;
        self
    }
}
