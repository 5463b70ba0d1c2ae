//! Quorum and gate configuration from TOML (`[quorum]` and `[gates.<id>]`)
//!
//! Example configuration:
//!
//! ```toml
//! [quorum]
//! rule = "majority"          # default rule for gates that do not set one
//! max_retries = 3            # revisions after the first attempt
//! voter_timeout_secs = 300   # 0 disables the per-voter timeout
//!
//! [gates.code_review]
//! rule = "unanimous"
//! voters = ["voter_security", "voter_qa"]
//!
//! [gates.test_coverage]
//! type = "single"
//! approver = "voter_qa"
//! criteria = ["Every acceptance criterion has a test"]
//! ```
//!
//! A `[gates.<id>]` table overlays the built-in gate with the same id; fields
//! left out keep the built-in value.

use crate::config::issue::{ConfigIssue, ConfigIssueCode};
use gatekeeper_domain::{GateConfig, GateKind, QuorumRule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileQuorumConfig {
    /// Consensus rule: "majority", "unanimous", "atleast:N", "N%"
    pub rule: String,
    pub max_retries: u32,
    pub voter_timeout_secs: u64,
}

impl Default for FileQuorumConfig {
    fn default() -> Self {
        Self {
            rule: "majority".to_string(),
            max_retries: gatekeeper_domain::DEFAULT_MAX_RETRIES,
            voter_timeout_secs: 300,
        }
    }
}

impl FileQuorumConfig {
    /// Parse the default rule, falling back to majority.
    pub fn parse_rule(&self) -> (QuorumRule, Vec<ConfigIssue>) {
        match self.rule.parse::<QuorumRule>() {
            Ok(rule) => (rule, vec![]),
            Err(_) => (
                QuorumRule::Majority,
                vec![ConfigIssue::warning(
                    ConfigIssueCode::InvalidRule {
                        field: "quorum.rule".to_string(),
                        value: self.rule.clone(),
                    },
                    format!(
                        "quorum.rule: unknown rule '{}', falling back to 'majority'",
                        self.rule
                    ),
                )],
            ),
        }
    }
}

/// One `[gates.<id>]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileGateConfig {
    /// "quorum" or "single"
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub rule: Option<String>,
    pub voters: Vec<String>,
    pub approver: Option<String>,
    pub criteria: Vec<String>,
    pub max_retries: Option<u32>,
    pub trigger: Option<String>,
}

impl FileGateConfig {
    /// Build the gate `id`, overlaying `base` when there is one.
    ///
    /// Returns `None` (with an error issue) when the result cannot work;
    /// the caller then keeps the built-in gate.
    pub fn resolve(
        &self,
        id: &str,
        base: Option<&GateConfig>,
        quorum: &FileQuorumConfig,
    ) -> (Option<GateConfig>, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let field = |name: &str| format!("gates.{id}.{name}");

        let base_is_single = matches!(base.map(|g| &g.kind), Some(GateKind::Single { .. }));
        let single = match self.kind.as_deref().map(str::to_lowercase).as_deref() {
            None => base_is_single,
            Some("quorum") => false,
            Some("single") => true,
            Some(other) => {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: field("type"),
                        value: other.to_string(),
                        valid_values: vec!["quorum".to_string(), "single".to_string()],
                    },
                    format!("{}: unknown gate type '{}', using 'quorum'", field("type"), other),
                ));
                false
            }
        };

        let kind = if single {
            let approver = self.approver.clone().or_else(|| match base.map(|g| &g.kind) {
                Some(GateKind::Single { approver, .. }) => Some(approver.clone()),
                _ => None,
            });
            let Some(approver) = approver.filter(|a| !a.trim().is_empty()) else {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::MissingApprover { gate: id.to_string() },
                    format!("gate '{}' is a single-approver gate without an approver", id),
                ));
                return (None, issues);
            };
            let criteria = if self.criteria.is_empty() {
                base.map(|g| g.criteria().to_vec()).unwrap_or_default()
            } else {
                self.criteria.clone()
            };
            GateKind::Single { approver, criteria }
        } else {
            let base_quorum = match base.map(|g| &g.kind) {
                Some(GateKind::Quorum { voters, rule }) => Some((voters, *rule)),
                _ => None,
            };
            let voters = if self.voters.is_empty() {
                base_quorum.map(|(v, _)| v.clone()).unwrap_or_default()
            } else {
                self.voters.clone()
            };
            if voters.is_empty() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::NoVoters { gate: id.to_string() },
                    format!("gate '{}' has no voters", id),
                ));
                return (None, issues);
            }

            let mut seen = BTreeSet::new();
            for voter in &voters {
                if !seen.insert(voter.as_str()) {
                    issues.push(ConfigIssue::warning(
                        ConfigIssueCode::DuplicateVoter {
                            gate: id.to_string(),
                            voter: voter.clone(),
                        },
                        format!("gate '{}' lists voter '{}' more than once", id, voter),
                    ));
                }
            }

            let rule = match &self.rule {
                Some(raw) => match raw.parse::<QuorumRule>() {
                    Ok(rule) => rule,
                    Err(_) => {
                        issues.push(ConfigIssue::error(
                            ConfigIssueCode::InvalidRule {
                                field: field("rule"),
                                value: raw.clone(),
                            },
                            format!("{}: unknown rule '{}'", field("rule"), raw),
                        ));
                        return (None, issues);
                    }
                },
                None => match base_quorum {
                    Some((_, rule)) => rule,
                    None => {
                        let (rule, rule_issues) = quorum.parse_rule();
                        issues.extend(rule_issues);
                        rule
                    }
                },
            };

            if !rule.is_attainable(voters.len()) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::UnattainableThreshold {
                        gate: id.to_string(),
                        threshold: rule.threshold(voters.len()),
                        voters: voters.len(),
                    },
                    format!(
                        "gate '{}' needs {} approvals but has {} voters",
                        id,
                        rule.threshold(voters.len()),
                        voters.len()
                    ),
                ));
                return (None, issues);
            }
            GateKind::Quorum { voters, rule }
        };

        let gate = GateConfig {
            id: id.to_string(),
            name: self
                .name
                .clone()
                .or_else(|| base.map(|g| g.name.clone()))
                .unwrap_or_else(|| id.to_string()),
            kind,
            max_retries: self.max_retries.unwrap_or(quorum.max_retries),
            trigger: self
                .trigger
                .clone()
                .or_else(|| base.map(|g| g.trigger.clone()))
                .unwrap_or_default(),
        };
        (Some(gate), issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_application::GateCatalog;

    fn file_gate(toml_str: &str) -> FileGateConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_quorum_config_default() {
        let config = FileQuorumConfig::default();
        assert_eq!(config.rule, "majority");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.voter_timeout_secs, 300);
    }

    #[test]
    fn test_quorum_config_parse_rule() {
        let mut config = FileQuorumConfig::default();

        config.rule = "unanimous".to_string();
        assert_eq!(config.parse_rule().0, QuorumRule::Unanimous);

        config.rule = "atleast:2".to_string();
        assert_eq!(config.parse_rule().0, QuorumRule::AtLeast(2));

        config.rule = "75%".to_string();
        assert_eq!(config.parse_rule().0, QuorumRule::Percentage(75));

        config.rule = "most".to_string();
        let (rule, issues) = config.parse_rule();
        assert_eq!(rule, QuorumRule::Majority);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_overlay_keeps_builtin_voters() {
        let catalog = GateCatalog::default();
        let base = catalog.get("code_review");
        let (gate, issues) = file_gate(r#"rule = "unanimous""#).resolve(
            "code_review",
            base,
            &FileQuorumConfig::default(),
        );
        let gate = gate.unwrap();
        assert!(issues.is_empty());
        assert_eq!(gate.name, "Code Review");
        assert_eq!(gate.voters().len(), 3);
        assert_eq!(gate.threshold(), 3);
    }

    #[test]
    fn test_new_gate_uses_default_rule_and_retries() {
        let quorum = FileQuorumConfig {
            rule: "unanimous".into(),
            max_retries: 1,
            ..Default::default()
        };
        let (gate, _) = file_gate(r#"voters = ["a", "b"]"#).resolve("privacy", None, &quorum);
        let gate = gate.unwrap();
        assert_eq!(gate.name, "privacy");
        assert_eq!(gate.threshold(), 2);
        assert_eq!(gate.max_retries, 1);
    }

    #[test]
    fn test_single_gate_requires_approver() {
        let (gate, issues) =
            file_gate(r#"type = "single""#).resolve("signoff", None, &FileQuorumConfig::default());
        assert!(gate.is_none());
        assert!(matches!(
            &issues[0].code,
            ConfigIssueCode::MissingApprover { gate } if gate == "signoff"
        ));
    }

    #[test]
    fn test_unattainable_rule_is_rejected() {
        let (gate, issues) = file_gate(
            r#"
rule = "atleast:4"
voters = ["a", "b", "c"]
"#,
        )
        .resolve("review", None, &FileQuorumConfig::default());
        assert!(gate.is_none());
        assert!(matches!(
            issues[0].code,
            ConfigIssueCode::UnattainableThreshold { threshold: 4, voters: 3, .. }
        ));
    }

    #[test]
    fn test_gate_without_voters_is_rejected() {
        let (gate, issues) = FileGateConfig::default().resolve("empty", None, &FileQuorumConfig::default());
        assert!(gate.is_none());
        assert!(issues[0].is_error());
    }
}
