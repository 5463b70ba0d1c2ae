//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly; conversion into the application's
//! [`EngineParams`], [`GateCatalog`] and [`PricingTable`] reports problems
//! as [`ConfigIssue`]s instead of failing.

mod agents;
mod assessment;
mod engine;
mod learning;
mod provider;
mod quorum;

pub use agents::FileAgentConfig;
pub use assessment::FileAssessmentConfig;
pub use engine::{FileEngineConfig, FileLoggingConfig};
pub use learning::FileLearningConfig;
pub use provider::FileProviderConfig;
pub use quorum::{FileGateConfig, FileQuorumConfig};

use crate::config::issue::{ConfigIssue, ConfigIssueCode};
use crate::persistence::JsonLessonsRepository;
use gatekeeper_application::{EngineParams, GateCatalog};
use gatekeeper_domain::{ModelRates, PricingTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub engine: FileEngineConfig,
    /// Defaults shared by every gate
    pub quorum: FileQuorumConfig,
    /// Gate overrides and additions, keyed by gate id
    pub gates: BTreeMap<String, FileGateConfig>,
    pub learning: FileLearningConfig,
    /// USD per million tokens, keyed by model id
    pub pricing: BTreeMap<String, ModelRates>,
    /// Agent definitions, keyed by agent id
    pub agents: BTreeMap<String, FileAgentConfig>,
    pub assessment: FileAssessmentConfig,
    pub provider: FileProviderConfig,
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Built-in gates with the configured overlays applied.
    ///
    /// A gate whose configuration cannot work keeps its built-in definition
    /// (or is left out, for new gates) and an error issue is reported.
    pub fn gate_catalog(&self) -> (GateCatalog, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut catalog = GateCatalog::default().with_max_retries(self.quorum.max_retries);

        for (id, file_gate) in &self.gates {
            let base = catalog.get(id).cloned();
            let (gate, gate_issues) = file_gate.resolve(id, base.as_ref(), &self.quorum);
            issues.extend(gate_issues);
            if let Some(gate) = gate {
                catalog = catalog.with_gate(gate);
            }
        }
        (catalog, issues)
    }

    pub fn engine_params(&self) -> (EngineParams, Vec<ConfigIssue>) {
        let mut issues = self.engine.validate();
        let (learning, learning_issues) = self.learning.to_policy();
        let (mode, mode_issues) = self.assessment.parse_mode();
        let (steps, step_issues) = self.assessment.parse_steps();
        issues.extend(learning_issues);
        issues.extend(mode_issues);
        issues.extend(step_issues);

        let params = EngineParams::default()
            .with_max_phase_attempts(self.engine.max_phase_attempts)
            .with_voter_timeout_secs(self.quorum.voter_timeout_secs)
            .with_learning(learning)
            .with_assessment_mode(mode)
            .with_assessment_steps(steps);
        (params, issues)
    }

    /// Built-in rates plus the `[pricing]` overrides.
    pub fn pricing_table(&self) -> (PricingTable, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut table = PricingTable::default();
        for (model, rates) in &self.pricing {
            let valid = rates.input.is_finite()
                && rates.output.is_finite()
                && rates.input >= 0.0
                && rates.output >= 0.0;
            if valid {
                table = table.with_rates(model, *rates);
            } else {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::OutOfRange {
                        field: format!("pricing.{model}"),
                        value: format!("{}/{}", rates.input, rates.output),
                    },
                    format!("pricing.{model}: rates must be non-negative, ignoring"),
                ));
            }
        }
        (table, issues)
    }

    pub fn lessons_path(&self) -> PathBuf {
        self.learning
            .lessons_path
            .clone()
            .unwrap_or_else(JsonLessonsRepository::default_path)
    }

    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let all = self
            .quorum
            .parse_rule()
            .1
            .into_iter()
            .chain(self.gate_catalog().1)
            .chain(self.engine_params().1)
            .chain(self.pricing_table().1);

        // New gates re-parse the default rule; report each problem once.
        let mut issues: Vec<ConfigIssue> = Vec::new();
        for issue in all {
            if !issues.contains(&issue) {
                issues.push(issue);
            }
        }
        issues
    }
}
