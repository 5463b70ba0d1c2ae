//! Findings produced by rule engines and assessor agents.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" | "moderate" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" | "informational" => Ok(Severity::Info),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Where a finding came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingSource {
    /// A deterministic rule engine check.
    Rule { rule_id: String },
    /// An assessor agent.
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub recommendation: String,
    pub source: FindingSource,
}

impl Finding {
    pub fn is_from_rule(&self) -> bool {
        matches!(self.source, FindingSource::Rule { .. })
    }
}

/// Merge rule findings with agent findings.
///
/// Agent findings whose title repeats a rule finding's title are dropped;
/// rule findings come first, and the result is ordered by severity.
pub fn merge_findings(rule_findings: Vec<Finding>, agent_findings: Vec<Finding>) -> Vec<Finding> {
    let mut merged = rule_findings;
    for finding in agent_findings {
        let duplicate = merged
            .iter()
            .any(|f| f.title.eq_ignore_ascii_case(&finding.title));
        if !duplicate {
            merged.push(finding);
        }
    }
    merged.sort_by_key(|f| f.severity);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(title: &str, severity: Severity, source: FindingSource) -> Finding {
        Finding {
            id: title.to_lowercase().replace(' ', "-"),
            title: title.to_string(),
            severity,
            description: String::new(),
            evidence: Vec::new(),
            recommendation: String::new(),
            source,
        }
    }

    #[test]
    fn severity_orders_critical_first() {
        assert!(Severity::Critical < Severity::Low);
        assert_eq!("Moderate".parse::<Severity>(), Ok(Severity::Medium));
    }

    #[test]
    fn merge_drops_agent_duplicates_and_sorts() {
        let rules = vec![finding(
            "Hardcoded secret",
            Severity::High,
            FindingSource::Rule {
                rule_id: "builtin_sec_001".into(),
            },
        )];
        let agent = vec![
            finding("hardcoded SECRET", Severity::Critical, FindingSource::Agent),
            finding("Missing CSRF token", Severity::Critical, FindingSource::Agent),
            finding("Verbose errors", Severity::Low, FindingSource::Agent),
        ];
        let merged = merge_findings(rules, agent);
        let titles: Vec<_> = merged.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["Missing CSRF token", "Hardcoded secret", "Verbose errors"]);
        assert!(merged[1].is_from_rule());
    }
}
