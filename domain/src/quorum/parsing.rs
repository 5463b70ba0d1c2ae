//! Two-tier decoding of reviewer responses into ballots.
//!
//! Tier one is a strict JSON decode of the expected shape:
//!
//! ```json
//! {"vote": "approve", "confidence": 85, "reasoning": "...",
//!  "concerns": ["..."], "suggestions": ["..."]}
//! ```
//!
//! Tier two repairs truncated JSON and, failing that, extracts individual
//! fields with regular expressions. Its result is always reported as
//! [`ParseOutcome::Partial`] so callers can tell guesses from clean data.

use super::vote::{
    AbstainReason, Abstention, Ballot, RECOVERED_DEFAULT_CONFIDENCE, Verdict, Vote,
    clamp_confidence,
};
use crate::core::{json, text};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Bytes of raw response kept for diagnosing abstentions.
pub const RAW_PREFIX_BYTES: usize = 200;

/// A vote decoded by the strict tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVote {
    pub verdict: Verdict,
    pub confidence: u8,
    pub reasoning: String,
    pub concerns: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Whatever the recovery tier could salvage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveredFields {
    pub verdict: Option<Verdict>,
    pub confidence: Option<u8>,
    pub reasoning: Option<String>,
    pub concerns: Vec<String>,
    pub suggestions: Vec<String>,
}

impl RecoveredFields {
    pub fn is_empty(&self) -> bool {
        self.verdict.is_none()
            && self.confidence.is_none()
            && self.reasoning.is_none()
            && self.concerns.is_empty()
            && self.suggestions.is_empty()
    }

    pub fn present(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.verdict.is_some() {
            names.push("vote".to_string());
        }
        if self.confidence.is_some() {
            names.push("confidence".to_string());
        }
        if self.reasoning.is_some() {
            names.push("reasoning".to_string());
        }
        if !self.concerns.is_empty() {
            names.push("concerns".to_string());
        }
        if !self.suggestions.is_empty() {
            names.push("suggestions".to_string());
        }
        names
    }

    pub fn missing(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.verdict.is_none() {
            names.push("vote".to_string());
        }
        if self.confidence.is_none() {
            names.push("confidence".to_string());
        }
        if self.reasoning.is_none() {
            names.push("reasoning".to_string());
        }
        names
    }

    fn from_value(value: &Value) -> Self {
        Self {
            verdict: verdict_field(value),
            confidence: value.get("confidence").and_then(confidence_from_value),
            reasoning: value
                .get("reasoning")
                .and_then(Value::as_str)
                .map(str::to_string),
            concerns: string_list(value.get("concerns")),
            suggestions: string_list(value.get("suggestions")),
        }
    }
}

/// Result of decoding one reviewer response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Full(ParsedVote),
    Partial(RecoveredFields),
    Unparseable { raw_prefix: String },
}

impl ParseOutcome {
    /// Turn the outcome into a ballot.
    ///
    /// A partial outcome counts as a vote only when it recovered a verdict;
    /// a missing confidence then defaults to 50.
    pub fn into_ballot(self, voter_id: &str, role: &str, raw: &str) -> Ballot {
        match self {
            ParseOutcome::Full(parsed) => Vote::new(voter_id, role, parsed.verdict)
                .with_confidence(parsed.confidence as i64)
                .with_reasoning(parsed.reasoning)
                .with_concerns(parsed.concerns)
                .with_suggestions(parsed.suggestions)
                .into(),
            ParseOutcome::Partial(fields) => match fields.verdict {
                Some(verdict) => {
                    let missing = fields.missing();
                    Vote::new(voter_id, role, verdict)
                        .with_confidence(
                            fields.confidence.unwrap_or(RECOVERED_DEFAULT_CONFIDENCE) as i64,
                        )
                        .with_reasoning(fields.reasoning.unwrap_or_default())
                        .with_concerns(fields.concerns)
                        .with_suggestions(fields.suggestions)
                        .recovered(missing)
                        .into()
                }
                None => Abstention::new(
                    voter_id,
                    role,
                    AbstainReason::NoVerdict {
                        raw_prefix: raw_prefix(raw),
                        recovered: fields.present(),
                    },
                )
                .into(),
            },
            ParseOutcome::Unparseable { raw_prefix } => {
                Abstention::new(voter_id, role, AbstainReason::Unparseable { raw_prefix }).into()
            }
        }
    }
}

/// Decode a reviewer response.
pub fn parse_vote_response(raw: &str) -> ParseOutcome {
    let block = json::extract_block(raw);

    if let Ok(value) = serde_json::from_str::<Value>(block) {
        let fields = RecoveredFields::from_value(&value);
        return match (fields.verdict, fields.confidence) {
            (Some(verdict), Some(confidence)) => ParseOutcome::Full(ParsedVote {
                verdict,
                confidence,
                reasoning: fields.reasoning.unwrap_or_default(),
                concerns: fields.concerns,
                suggestions: fields.suggestions,
            }),
            _ if fields.is_empty() => recover_with_regex(raw),
            _ => ParseOutcome::Partial(fields),
        };
    }

    let repaired = json::repair_truncated(block);
    if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
        let fields = RecoveredFields::from_value(&value);
        if !fields.is_empty() {
            return ParseOutcome::Partial(fields);
        }
    }

    recover_with_regex(raw)
}

struct FieldPatterns {
    vote: Regex,
    plain_vote: Regex,
    confidence: Regex,
    reasoning: Regex,
    concerns: Regex,
    suggestions: Regex,
    quoted: Regex,
}

static PATTERNS: LazyLock<FieldPatterns> = LazyLock::new(|| FieldPatterns {
    vote: Regex::new(r#"(?i)"(?:vote|verdict|decision)"\s*:\s*"(\w+)""#).expect("valid regex"),
    plain_vote: Regex::new(r"(?i)\b(?:vote|verdict|decision)\b\**\s*[:=-]\s*\**\s*(approve|approved|reject|rejected|pass|fail)\b")
        .expect("valid regex"),
    confidence: Regex::new(r#"(?i)"?confidence"?\s*[:=]\s*"?(\d+(?:\.\d+)?%?|high|medium|low)"#)
        .expect("valid regex"),
    reasoning: Regex::new(r#"(?s)"reasoning"\s*:\s*"((?:[^"\\]|\\.)*)"#).expect("valid regex"),
    concerns: Regex::new(r#"(?s)"concerns"\s*:\s*\[(.*?)(?:\]|$)"#).expect("valid regex"),
    suggestions: Regex::new(r#"(?s)"suggestions"\s*:\s*\[(.*?)(?:\]|$)"#).expect("valid regex"),
    quoted: Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("valid regex"),
});

fn recover_with_regex(raw: &str) -> ParseOutcome {
    let p = &*PATTERNS;
    let verdict = p
        .vote
        .captures(raw)
        .or_else(|| p.plain_vote.captures(raw))
        .and_then(|c| Verdict::from_label(&c[1]));
    let confidence = p
        .confidence
        .captures(raw)
        .and_then(|c| confidence_from_str(&c[1]));
    let reasoning = p.reasoning.captures(raw).map(|c| unescape(&c[1]));
    let list = |re: &Regex| -> Vec<String> {
        re.captures(raw)
            .map(|c| {
                p.quoted
                    .captures_iter(&c[1])
                    .map(|q| unescape(&q[1]))
                    .filter(|s| !s.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    };

    let fields = RecoveredFields {
        verdict,
        confidence,
        reasoning,
        concerns: list(&p.concerns),
        suggestions: list(&p.suggestions),
    };
    if fields.is_empty() {
        ParseOutcome::Unparseable {
            raw_prefix: raw_prefix(raw),
        }
    } else {
        ParseOutcome::Partial(fields)
    }
}

fn raw_prefix(raw: &str) -> String {
    text::clip(raw.trim(), RAW_PREFIX_BYTES).to_string()
}

fn unescape(s: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{s}\"")).unwrap_or_else(|_| s.to_string())
}

fn verdict_field(value: &Value) -> Option<Verdict> {
    ["vote", "verdict", "decision"]
        .iter()
        .find_map(|key| value.get(*key))
        .and_then(|v| match v {
            Value::String(s) => Verdict::from_label(s),
            Value::Bool(true) => Some(Verdict::Pass),
            Value::Bool(false) => Some(Verdict::Fail),
            _ => None,
        })
}

fn confidence_from_value(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n.as_f64().map(scale_confidence),
        Value::String(s) => confidence_from_str(s),
        _ => None,
    }
}

/// Accepts `85`, `85%`, `0.85` and the words `high`/`medium`/`low`.
fn confidence_from_str(s: &str) -> Option<u8> {
    let s = s.trim().to_lowercase();
    match s.as_str() {
        "high" => Some(90),
        "medium" => Some(65),
        "low" => Some(35),
        other => other
            .trim_end_matches('%')
            .parse::<f64>()
            .ok()
            .map(scale_confidence),
    }
}

fn scale_confidence(n: f64) -> u8 {
    let pct = if n > 0.0 && n < 1.0 { n * 100.0 } else { n };
    clamp_confidence(pct.round() as i64)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quorum::vote::Provenance;

    #[test]
    fn strict_json_is_full() {
        let raw = r#"```json
{"vote": "reject", "confidence": 72, "reasoning": "Missing error paths",
 "concerns": ["no retry on timeout"], "suggestions": ["add a retry budget"]}
```"#;
        match parse_vote_response(raw) {
            ParseOutcome::Full(vote) => {
                assert_eq!(vote.verdict, Verdict::Fail);
                assert_eq!(vote.confidence, 72);
                assert_eq!(vote.concerns, vec!["no retry on timeout"]);
            }
            other => panic!("expected full, got {other:?}"),
        }
    }

    #[test]
    fn word_confidence_is_mapped() {
        let raw = r#"{"vote": "approve", "confidence": "high", "reasoning": "ok"}"#;
        match parse_vote_response(raw) {
            ParseOutcome::Full(vote) => assert_eq!(vote.confidence, 90),
            other => panic!("expected full, got {other:?}"),
        }
    }

    #[test]
    fn fractional_confidence_is_scaled() {
        let raw = r#"{"vote": "approve", "confidence": 0.8}"#;
        match parse_vote_response(raw) {
            ParseOutcome::Full(vote) => assert_eq!(vote.confidence, 80),
            other => panic!("expected full, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let raw = r#"{"vote": "approve", "confidence": 400}"#;
        match parse_vote_response(raw) {
            ParseOutcome::Full(vote) => assert_eq!(vote.confidence, 100),
            other => panic!("expected full, got {other:?}"),
        }
    }

    #[test]
    fn json_without_confidence_is_partial() {
        let raw = r#"{"vote": "approve", "reasoning": "fine"}"#;
        let outcome = parse_vote_response(raw);
        let ParseOutcome::Partial(fields) = &outcome else {
            panic!("expected partial, got {outcome:?}");
        };
        assert_eq!(fields.verdict, Some(Verdict::Pass));
        assert_eq!(fields.missing(), vec!["confidence"]);

        match outcome.into_ballot("po", "Product Owner", raw) {
            Ballot::Cast(vote) => {
                assert_eq!(vote.confidence, 50);
                assert_eq!(
                    vote.provenance,
                    Provenance::Recovered {
                        missing: vec!["confidence".into()]
                    }
                );
            }
            other => panic!("expected vote, got {other:?}"),
        }
    }

    #[test]
    fn truncated_json_is_recovered() {
        let raw = r#"{"vote": "reject", "confidence": 60, "reasoning": "Scoring is vague", "concerns": ["effort_hours missing", "uniform sco"#;
        let ParseOutcome::Partial(fields) = parse_vote_response(raw) else {
            panic!("expected partial");
        };
        assert_eq!(fields.verdict, Some(Verdict::Fail));
        assert_eq!(fields.confidence, Some(60));
        assert_eq!(fields.concerns.len(), 2);
    }

    #[test]
    fn plain_text_verdict_is_recovered() {
        let raw = "After review.\n**Vote:** APPROVE\nConfidence: 70%\nLooks good overall.";
        let ParseOutcome::Partial(fields) = parse_vote_response(raw) else {
            panic!("expected partial");
        };
        assert_eq!(fields.verdict, Some(Verdict::Pass));
        assert_eq!(fields.confidence, Some(70));
    }

    #[test]
    fn partial_without_verdict_abstains() {
        let raw = r#"The "reasoning": "I could not decide" and that is all"#;
        let outcome = parse_vote_response(raw);
        match outcome.into_ballot("qa", "QA", raw) {
            Ballot::Abstained(a) => match a.reason {
                AbstainReason::NoVerdict { recovered, .. } => {
                    assert_eq!(recovered, vec!["reasoning"])
                }
                other => panic!("unexpected reason {other:?}"),
            },
            other => panic!("expected abstention, got {other:?}"),
        }
    }

    #[test]
    fn prose_is_unparseable_and_keeps_prefix() {
        let raw = "I am unable to evaluate this artifact right now.";
        let outcome = parse_vote_response(raw);
        assert_eq!(
            outcome,
            ParseOutcome::Unparseable {
                raw_prefix: raw.to_string()
            }
        );
    }

    #[test]
    fn raw_prefix_is_bounded() {
        let raw = "x".repeat(1000);
        match parse_vote_response(&raw) {
            ParseOutcome::Unparseable { raw_prefix } => assert_eq!(raw_prefix.len(), 200),
            other => panic!("expected unparseable, got {other:?}"),
        }
    }
}
