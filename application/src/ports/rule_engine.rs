//! Rule engine port
//!
//! Deterministic checks that run before an assessor agent. Their findings
//! are handed to the agent so it does not repeat them.

use gatekeeper_domain::{AssessmentContext, Finding};

pub trait RuleEngine: Send + Sync {
    /// Findings for one assessment step.
    fn run(&self, step: &str, context: &AssessmentContext) -> Vec<Finding>;
}

/// Rule engine with no rules.
pub struct NoRuleEngine;

impl RuleEngine for NoRuleEngine {
    fn run(&self, _step: &str, _context: &AssessmentContext) -> Vec<Finding> {
        Vec::new()
    }
}
