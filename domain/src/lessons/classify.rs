//! Format vs content classification of reviewer concerns.

use serde::{Deserialize, Serialize};

/// Phrases that mark a concern as being about the shape of the produced
/// artifact rather than about what was assessed.
pub const FORMAT_KEYWORDS: &[&str] = &[
    "effort_hours",
    "effort estimate",
    "impact field",
    "empty field",
    "score lacks",
    "scoring",
    "vague",
    "ambiguous",
    "placeholder",
    "uniform",
    "acceptance criteria",
    "not defined",
    "unclear scale",
    "inconsistent scale",
    "missing definition",
    "truncated",
    "estimated from",
    "all findings",
    "output format",
    "json format",
    "response format",
    "score_explanation",
    "missing field",
    "empty string",
    "no explanation",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcernKind {
    /// Structure or completeness of the artifact; shared by every step.
    Format,
    /// Substance of what was assessed; scoped to one step.
    Content,
}

pub fn classify(concern: &str) -> ConcernKind {
    let lowered = concern.to_lowercase();
    if FORMAT_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        ConcernKind::Format
    } else {
        ConcernKind::Content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_keywords_are_detected_case_insensitively() {
        assert_eq!(classify("Missing field: effort_hours"), ConcernKind::Format);
        assert_eq!(classify("Scores use an INCONSISTENT SCALE"), ConcernKind::Format);
        assert_eq!(classify("Recommendation is vague"), ConcernKind::Format);
    }

    #[test]
    fn substance_concerns_are_content() {
        assert_eq!(classify("SQL injection in user lookup"), ConcernKind::Content);
        assert_eq!(classify("Circular dependency between api and db"), ConcernKind::Content);
    }
}
