//! Engine and logging configuration from TOML (`[engine]`, `[logging]`)

use crate::config::issue::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ```toml
/// [engine]
/// max_phase_attempts = 3
/// projects_dir = "projects"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEngineConfig {
    /// Failed production attempts per phase before the workflow fails.
    pub max_phase_attempts: u32,
    /// Root of the per-project directories (state, audit ledger, report).
    pub projects_dir: PathBuf,
}

impl Default for FileEngineConfig {
    fn default() -> Self {
        Self {
            max_phase_attempts: 3,
            projects_dir: PathBuf::from("projects"),
        }
    }
}

impl FileEngineConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        if self.max_phase_attempts == 0 {
            return vec![ConfigIssue::warning(
                ConfigIssueCode::OutOfRange {
                    field: "engine.max_phase_attempts".to_string(),
                    value: "0".to_string(),
                },
                "engine.max_phase_attempts: 0 is treated as 1",
            )];
        }
        Vec::new()
    }
}

/// ```toml
/// [logging]
/// dir = "~/.gatekeeper/logs"   # daily rolling operation log; unset logs to stderr only
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    pub dir: Option<PathBuf>,
}
