//! Rules that ship with the store and are seeded on first load.

use super::entities::{LessonsDocument, Rule, RuleTrigger};
use chrono::{DateTime, Utc};

struct BuiltinRule {
    step: &'static str,
    id: &'static str,
    name: &'static str,
    condition: &'static str,
    action: &'static str,
}

const BUILTIN_RULES: &[BuiltinRule] = &[
    BuiltinRule {
        step: "security",
        id: "builtin_sec_001",
        name: "Check Hardcoded Secrets",
        condition: "always",
        action: "Scan for hardcoded API keys, passwords, tokens, and credentials in code",
    },
    BuiltinRule {
        step: "security",
        id: "builtin_sec_002",
        name: "Check SQL Injection",
        condition: "has_database",
        action: "Check for SQL injection vulnerabilities in database queries",
    },
    BuiltinRule {
        step: "security",
        id: "builtin_sec_003",
        name: "Check XSS Vulnerabilities",
        condition: "has_frontend",
        action: "Check for cross-site scripting vulnerabilities in user input handling",
    },
    BuiltinRule {
        step: "architecture",
        id: "builtin_arch_001",
        name: "Check Circular Dependencies",
        condition: "always",
        action: "Check for circular import/dependency issues between modules",
    },
    BuiltinRule {
        step: "architecture",
        id: "builtin_arch_002",
        name: "Check Layer Violations",
        condition: "has_layers",
        action: "Check that dependencies flow in the correct direction between architectural layers",
    },
    BuiltinRule {
        step: "code_quality",
        id: "builtin_cq_001",
        name: "Check Code Duplication",
        condition: "always",
        action: "Identify significant code duplication that should be refactored",
    },
    BuiltinRule {
        step: "code_quality",
        id: "builtin_cq_002",
        name: "Check Function Complexity",
        condition: "always",
        action: "Flag functions with excessive cyclomatic complexity",
    },
    BuiltinRule {
        step: "testing",
        id: "builtin_test_001",
        name: "Check Test Coverage",
        condition: "has_tests",
        action: "Verify critical paths have test coverage",
    },
];

/// Add any missing built-in rules. Returns how many were added.
pub fn seed_builtin_rules(doc: &mut LessonsDocument, now: DateTime<Utc>) -> usize {
    let mut added = 0;
    for b in BUILTIN_RULES {
        let rule = Rule {
            id: b.id.to_string(),
            name: b.name.to_string(),
            trigger: RuleTrigger::from(b.condition.to_string()),
            action: b.action.to_string(),
            source_lesson: None,
            created_at: now,
        };
        if doc.insert_rule(b.step, rule) {
            added += 1;
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_is_idempotent() {
        let mut doc = LessonsDocument::empty(Utc::now());
        assert_eq!(seed_builtin_rules(&mut doc, Utc::now()), 8);
        assert_eq!(seed_builtin_rules(&mut doc, Utc::now()), 0);
        assert_eq!(doc.rules_for("security").len(), 3);
        assert!(doc.rules_for("security").iter().all(Rule::is_builtin));
    }

    #[test]
    fn conditional_builtins_keep_their_condition() {
        let mut doc = LessonsDocument::empty(Utc::now());
        seed_builtin_rules(&mut doc, Utc::now());
        let sql = doc
            .rules_for("security")
            .iter()
            .find(|r| r.id == "builtin_sec_002")
            .unwrap();
        assert_eq!(sql.trigger, RuleTrigger::When("has_database".into()));
    }
}
