//! Lessons, rules and the document that persists them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Scope key used for promoted format lessons in the rules section.
pub const FORMAT_SCOPE: &str = "format";

pub const DOCUMENT_VERSION: &str = "1.0";

/// A recurring rejection pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub pattern: String,
    /// Reasoning of the voter who first raised the concern.
    #[serde(default)]
    pub voter_feedback: String,
    pub correction: String,
    /// 50..=100; never decreases.
    pub confidence: u8,
    /// Never decreases.
    pub occurrences: u32,
    /// Projects the pattern was seen in, each recorded once.
    #[serde(default)]
    pub learned_from: Vec<String>,
    /// Set once, when the lesson becomes a rule.
    #[serde(default)]
    pub promoted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// When a rule applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleTrigger {
    Always,
    /// Applies when the assessment context reports this fact, e.g.
    /// `has_database`.
    When(String),
}

impl RuleTrigger {
    pub fn applies(&self, facts: &BTreeSet<String>) -> bool {
        match self {
            RuleTrigger::Always => true,
            RuleTrigger::When(fact) => facts.contains(fact),
        }
    }
}

impl From<String> for RuleTrigger {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("always") {
            RuleTrigger::Always
        } else {
            RuleTrigger::When(value.trim().to_string())
        }
    }
}

impl From<RuleTrigger> for String {
    fn from(trigger: RuleTrigger) -> Self {
        match trigger {
            RuleTrigger::Always => "always".to_string(),
            RuleTrigger::When(fact) => fact,
        }
    }
}

/// A deterministic check, either built in or promoted from a lesson.
/// Rules are never edited after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub trigger: RuleTrigger,
    pub action: String,
    /// `None` for built-in rules.
    pub source_lesson: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Rule {
    pub fn is_builtin(&self) -> bool {
        self.source_lesson.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonsMetadata {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub total_lessons: usize,
    #[serde(default)]
    pub total_rules: usize,
    #[serde(default)]
    pub projects_analyzed: Vec<String>,
    /// Source of lesson and rule ids.
    #[serde(default)]
    pub sequence: u64,
}

/// The single persisted lessons document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonsDocument {
    pub version: String,
    /// Content lessons keyed by step.
    #[serde(default)]
    pub lessons: BTreeMap<String, Vec<Lesson>>,
    /// Rules keyed by step; promoted format lessons live under `format`.
    #[serde(default)]
    pub rules: BTreeMap<String, Vec<Rule>>,
    /// Format lessons shared by every step.
    #[serde(default)]
    pub format_rules: Vec<Lesson>,
    pub metadata: LessonsMetadata,
}

/// Per-step counts for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LessonsStats {
    pub total_lessons: usize,
    pub total_rules: usize,
    pub format_lessons: usize,
    pub promoted_lessons: usize,
    pub projects_analyzed: usize,
    pub lessons_by_step: BTreeMap<String, usize>,
    pub rules_by_step: BTreeMap<String, usize>,
}

impl LessonsDocument {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            lessons: BTreeMap::new(),
            rules: BTreeMap::new(),
            format_rules: Vec::new(),
            metadata: LessonsMetadata {
                created_at: now,
                total_lessons: 0,
                total_rules: 0,
                projects_analyzed: Vec::new(),
                sequence: 0,
            },
        }
    }

    pub fn lessons_for(&self, step: &str) -> &[Lesson] {
        self.lessons.get(step).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rules_for(&self, step: &str) -> &[Rule] {
        self.rules.get(step).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Add a rule unless one with the same id already exists.
    pub fn insert_rule(&mut self, scope: &str, rule: Rule) -> bool {
        let rules = self.rules.entry(scope.to_string()).or_default();
        if rules.iter().any(|r| r.id == rule.id) {
            return false;
        }
        rules.push(rule);
        true
    }

    pub fn record_project(&mut self, project_id: &str) {
        if !self
            .metadata
            .projects_analyzed
            .iter()
            .any(|p| p == project_id)
        {
            self.metadata.projects_analyzed.push(project_id.to_string());
        }
    }

    /// Recompute the metadata totals. Called before every save.
    pub fn refresh_totals(&mut self) {
        self.metadata.total_lessons =
            self.lessons.values().map(Vec::len).sum::<usize>() + self.format_rules.len();
        self.metadata.total_rules = self.rules.values().map(Vec::len).sum();
    }

    pub fn stats(&self) -> LessonsStats {
        let promoted = self
            .lessons
            .values()
            .flatten()
            .chain(self.format_rules.iter())
            .filter(|l| l.promoted)
            .count();
        LessonsStats {
            total_lessons: self.lessons.values().map(Vec::len).sum::<usize>()
                + self.format_rules.len(),
            total_rules: self.rules.values().map(Vec::len).sum(),
            format_lessons: self.format_rules.len(),
            promoted_lessons: promoted,
            projects_analyzed: self.metadata.projects_analyzed.len(),
            lessons_by_step: self
                .lessons
                .iter()
                .map(|(k, v)| (k.clone(), v.len()))
                .collect(),
            rules_by_step: self
                .rules
                .iter()
                .map(|(k, v)| (k.clone(), v.len()))
                .collect(),
        }
    }

    pub(crate) fn next_id(&mut self, prefix: &str) -> String {
        self.metadata.sequence += 1;
        format!("{prefix}_{:04}", self.metadata.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_serializes_as_condition_string() {
        let json = serde_json::to_string(&RuleTrigger::When("has_database".into())).unwrap();
        assert_eq!(json, "\"has_database\"");
        let back: RuleTrigger = serde_json::from_str("\"always\"").unwrap();
        assert_eq!(back, RuleTrigger::Always);
    }

    #[test]
    fn conditional_trigger_needs_fact() {
        let facts: BTreeSet<String> = ["has_frontend".to_string()].into();
        assert!(RuleTrigger::Always.applies(&facts));
        assert!(RuleTrigger::When("has_frontend".into()).applies(&facts));
        assert!(!RuleTrigger::When("has_database".into()).applies(&facts));
    }

    #[test]
    fn projects_are_recorded_once() {
        let mut doc = LessonsDocument::empty(Utc::now());
        doc.record_project("alpha");
        doc.record_project("alpha");
        doc.record_project("beta");
        assert_eq!(doc.metadata.projects_analyzed, vec!["alpha", "beta"]);
    }

    #[test]
    fn insert_rule_ignores_duplicate_ids() {
        let mut doc = LessonsDocument::empty(Utc::now());
        let rule = Rule {
            id: "r1".into(),
            name: "Check".into(),
            trigger: RuleTrigger::Always,
            action: "do it".into(),
            source_lesson: None,
            created_at: Utc::now(),
        };
        assert!(doc.insert_rule("security", rule.clone()));
        assert!(!doc.insert_rule("security", rule));
        doc.refresh_totals();
        assert_eq!(doc.metadata.total_rules, 1);
    }
}
