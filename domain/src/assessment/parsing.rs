//! Decoding assessor output into findings.
//!
//! Same two tiers as vote parsing: strict JSON first, then truncated-JSON
//! repair and regex extraction, reported as a partial result.

use super::finding::{Finding, FindingSource, Severity};
use crate::core::{json, text};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// What one assessor response contained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepAssessment {
    pub score: Option<u8>,
    pub summary: String,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssessmentOutcome {
    Full(StepAssessment),
    /// Recovered by repair or regex; may be missing findings.
    Partial(StepAssessment),
    Unparseable { raw_prefix: String },
}

impl AssessmentOutcome {
    /// The assessment, if any part of it was decoded.
    pub fn assessment(self) -> Option<StepAssessment> {
        match self {
            AssessmentOutcome::Full(a) | AssessmentOutcome::Partial(a) => Some(a),
            AssessmentOutcome::Unparseable { .. } => None,
        }
    }
}

pub fn parse_assessment(step: &str, raw: &str) -> AssessmentOutcome {
    let block = json::extract_block(raw);

    if let Ok(value) = serde_json::from_str::<Value>(block)
        && value.is_object()
    {
        return AssessmentOutcome::Full(from_value(step, &value));
    }

    let repaired = json::repair_truncated(block);
    if let Ok(value) = serde_json::from_str::<Value>(&repaired)
        && value.is_object()
    {
        return AssessmentOutcome::Partial(from_value(step, &value));
    }

    let recovered = recover_with_regex(step, raw);
    if recovered.findings.is_empty() && recovered.score.is_none() {
        AssessmentOutcome::Unparseable {
            raw_prefix: text::clip(raw.trim(), 200).to_string(),
        }
    } else {
        AssessmentOutcome::Partial(recovered)
    }
}

fn finding_id(step: &str, n: usize) -> String {
    let prefix: String = step.chars().take(3).collect::<String>().to_uppercase();
    format!("{prefix}-{n:03}")
}

fn from_value(step: &str, value: &Value) -> StepAssessment {
    let findings = value
        .get("findings")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(i, item)| finding_from_value(step, i + 1, item))
                .collect()
        })
        .unwrap_or_default();

    StepAssessment {
        score: value
            .get("score")
            .and_then(Value::as_f64)
            .map(|s| s.clamp(0.0, 100.0).round() as u8),
        summary: str_field(value, "summary"),
        findings,
    }
}

fn finding_from_value(step: &str, n: usize, item: &Value) -> Finding {
    let title = Some(str_field(item, "title"))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Assessment finding".to_string());
    let mut evidence: Vec<String> = match item.get("evidence") {
        Some(Value::Array(xs)) => xs
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    };
    let location = str_field(item, "location");
    if !location.is_empty() {
        evidence.insert(0, location);
    }
    let description = Some(str_field(item, "description"))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| title.clone());

    Finding {
        id: finding_id(step, n),
        title,
        severity: item
            .get("severity")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(Severity::Medium),
        description,
        evidence,
        recommendation: str_field(item, "recommendation"),
        source: FindingSource::Agent,
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

struct FindingPatterns {
    finding: Regex,
    description: Regex,
    location: Regex,
    recommendation: Regex,
    score: Regex,
}

static PATTERNS: LazyLock<FindingPatterns> = LazyLock::new(|| FindingPatterns {
    finding: Regex::new(
        r#"(?is)"severity"\s*:\s*"(critical|high|medium|low|info)"[^}]*?"title"\s*:\s*"([^"]+)""#,
    )
    .expect("valid regex"),
    description: Regex::new(r#""description"\s*:\s*"([^"]+)""#).expect("valid regex"),
    location: Regex::new(r#""location"\s*:\s*"([^"]+)""#).expect("valid regex"),
    recommendation: Regex::new(r#""recommendation"\s*:\s*"([^"]+)""#).expect("valid regex"),
    score: Regex::new(r#"(?i)"score"\s*:\s*(\d+)|\bscore:?\**\s*(\d+)(?:/100)?"#)
        .expect("valid regex"),
});

fn recover_with_regex(step: &str, raw: &str) -> StepAssessment {
    let p = &*PATTERNS;
    let mut findings = Vec::new();
    for m in p.finding.captures_iter(raw) {
        let (Some(whole), Some(sev), Some(title)) = (m.get(0), m.get(1), m.get(2)) else {
            continue;
        };
        let mut start = whole.start().saturating_sub(50);
        while !raw.is_char_boundary(start) {
            start -= 1;
        }
        let window = text::clip(&raw[start..], whole.end() - start + 500);
        let grab = |re: &Regex| re.captures(window).map(|c| c[1].to_string());

        findings.push(Finding {
            id: finding_id(step, findings.len() + 1),
            title: title.as_str().to_string(),
            severity: sev.as_str().parse().unwrap_or(Severity::Medium),
            description: grab(&p.description).unwrap_or_else(|| title.as_str().to_string()),
            evidence: grab(&p.location).into_iter().collect(),
            recommendation: grab(&p.recommendation).unwrap_or_default(),
            source: FindingSource::Agent,
        });
    }

    let score = p.score.captures(raw).and_then(|c| {
        c.get(1)
            .or_else(|| c.get(2))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .map(|s| s.min(100) as u8)
    });

    StepAssessment {
        score,
        summary: String::new(),
        findings,
    }
}
