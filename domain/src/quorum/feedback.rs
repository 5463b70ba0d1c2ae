//! Aggregated reviewer feedback.
//!
//! The same document explains a gate outcome to a human and becomes the
//! feedback section of a revision prompt.

use super::vote::{Abstention, Vote};
use serde::{Deserialize, Serialize};

/// Vote count and mean confidence for one side of the tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SideSummary {
    pub count: usize,
    pub average_confidence: Option<f64>,
}

impl SideSummary {
    fn of<'a>(votes: impl Iterator<Item = &'a Vote>) -> Self {
        let (count, total) = votes.fold((0usize, 0u64), |(n, sum), v| {
            (n + 1, sum + v.confidence as u64)
        });
        Self {
            count,
            average_confidence: (count > 0).then(|| total as f64 / count as f64),
        }
    }
}

/// A concern or suggestion tagged with the roles that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedItem {
    pub text: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterReasoning {
    pub role: String,
    pub passed: bool,
    pub confidence: u8,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackDocument {
    pub pass_side: SideSummary,
    pub fail_side: SideSummary,
    pub concerns: Vec<TaggedItem>,
    pub suggestions: Vec<TaggedItem>,
    pub reasoning: Vec<VoterReasoning>,
    /// `(role, reason)` for every abstaining voter.
    pub abstentions: Vec<(String, String)>,
}

impl FeedbackDocument {
    pub fn aggregate(votes: &[Vote], abstentions: &[Abstention]) -> Self {
        Self {
            pass_side: SideSummary::of(votes.iter().filter(|v| v.is_pass())),
            fail_side: SideSummary::of(votes.iter().filter(|v| !v.is_pass())),
            concerns: dedup_tagged(votes.iter().flat_map(|v| {
                v.concerns.iter().map(move |c| (c.as_str(), v.role.as_str()))
            })),
            suggestions: dedup_tagged(votes.iter().flat_map(|v| {
                v.suggestions
                    .iter()
                    .map(move |s| (s.as_str(), v.role.as_str()))
            })),
            reasoning: votes
                .iter()
                .map(|v| VoterReasoning {
                    role: v.role.clone(),
                    passed: v.is_pass(),
                    confidence: v.confidence,
                    reasoning: v.reasoning.clone(),
                })
                .collect(),
            abstentions: abstentions
                .iter()
                .map(|a| (a.role.clone(), a.reason.label().to_string()))
                .collect(),
        }
    }

    pub fn to_markdown(&self) -> String {
        if self.reasoning.is_empty() && self.abstentions.is_empty() {
            return "No votes recorded.".to_string();
        }

        let mut out = String::from("## Vote Summary\n");
        out.push_str(&side_line("Approved", &self.pass_side));
        out.push_str(&side_line("Rejected", &self.fail_side));
        if !self.abstentions.is_empty() {
            out.push_str(&format!("- Abstained: {}\n", self.abstentions.len()));
        }

        if !self.concerns.is_empty() {
            out.push_str("\n## Concerns\n");
            for item in &self.concerns {
                out.push_str(&format!("- [{}] {}\n", item.roles.join(", "), item.text));
            }
        }

        if !self.suggestions.is_empty() {
            out.push_str("\n## Suggestions\n");
            for item in &self.suggestions {
                out.push_str(&format!("- [{}] {}\n", item.roles.join(", "), item.text));
            }
        }

        if !self.reasoning.is_empty() {
            out.push_str("\n## Individual Assessments\n");
            for r in &self.reasoning {
                let mark = if r.passed { "✅" } else { "❌" };
                out.push_str(&format!(
                    "\n### {mark} {} ({}% confidence)\n{}\n",
                    r.role, r.confidence, r.reasoning
                ));
            }
        }

        if !self.abstentions.is_empty() {
            out.push_str("\n## Abstentions\n");
            for (role, reason) in &self.abstentions {
                out.push_str(&format!("- {role}: {reason}\n"));
            }
        }

        out
    }
}

fn side_line(label: &str, side: &SideSummary) -> String {
    match side.average_confidence {
        Some(avg) => format!("- {label}: {} (avg confidence {avg:.0}%)\n", side.count),
        None => format!("- {label}: {}\n", side.count),
    }
}

/// Case-insensitive dedup keeping first-seen order and every raising role.
fn dedup_tagged<'a>(items: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<TaggedItem> {
    let mut out: Vec<TaggedItem> = Vec::new();
    let mut index: Vec<String> = Vec::new();
    for (text, role) in items {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let key = text.to_lowercase();
        match index.iter().position(|k| *k == key) {
            Some(i) => {
                if !out[i].roles.iter().any(|r| r == role) {
                    out[i].roles.push(role.to_string());
                }
            }
            None => {
                index.push(key);
                out.push(TaggedItem {
                    text: text.to_string(),
                    roles: vec![role.to_string()],
                });
            }
        }
    }
    out
}
