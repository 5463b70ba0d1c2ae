//! Ballots cast by reviewer agents.
//!
//! A reviewer call ends in exactly one [`Ballot`]: a counted [`Vote`] or an
//! [`Abstention`]. Abstentions never enter the pass/fail tally.

use serde::{Deserialize, Serialize};

/// Lowest and highest confidence a vote can carry.
pub const MIN_CONFIDENCE: u8 = 1;
pub const MAX_CONFIDENCE: u8 = 100;

/// Confidence assigned to a recovered vote that carried none.
pub const RECOVERED_DEFAULT_CONFIDENCE: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    /// Accepts `pass`/`approve`/`approved`/`yes` and `fail`/`reject`/`rejected`/`no`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "pass" | "approve" | "approved" | "yes" => Some(Verdict::Pass),
            "fail" | "reject" | "rejected" | "no" => Some(Verdict::Fail),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
        }
    }
}

/// How the vote was decoded from the reviewer's raw response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Strict JSON decode succeeded.
    Strict,
    /// Recovered by the repair pass; `missing` lists fields that were absent.
    Recovered { missing: Vec<String> },
}

/// A counted verdict from one reviewer.
///
/// # Example
///
/// ```
/// use gatekeeper_domain::quorum::{Vote, Verdict};
///
/// let vote = Vote::new("sec-1", "Security Reviewer", Verdict::Fail).with_confidence(250);
/// assert_eq!(vote.confidence, 100);
/// assert!(!vote.is_pass());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter_id: String,
    pub role: String,
    pub verdict: Verdict,
    /// Always within [`MIN_CONFIDENCE`]..=[`MAX_CONFIDENCE`].
    pub confidence: u8,
    pub reasoning: String,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub provenance: Provenance,
}

impl Vote {
    pub fn new(voter_id: impl Into<String>, role: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            voter_id: voter_id.into(),
            role: role.into(),
            verdict,
            confidence: RECOVERED_DEFAULT_CONFIDENCE,
            reasoning: String::new(),
            concerns: Vec::new(),
            suggestions: Vec::new(),
            provenance: Provenance::Strict,
        }
    }

    pub fn pass(voter_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self::new(voter_id, role, Verdict::Pass)
    }

    pub fn fail(voter_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self::new(voter_id, role, Verdict::Fail)
    }

    /// Set confidence, clamped to 1..=100.
    pub fn with_confidence(mut self, confidence: i64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_concerns(mut self, concerns: Vec<String>) -> Self {
        self.concerns = concerns;
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn recovered(mut self, missing: Vec<String>) -> Self {
        self.provenance = Provenance::Recovered { missing };
        self
    }

    pub fn is_pass(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self.provenance, Provenance::Recovered { .. })
    }
}

pub fn clamp_confidence(raw: i64) -> u8 {
    raw.clamp(MIN_CONFIDENCE as i64, MAX_CONFIDENCE as i64) as u8
}

/// Why a reviewer produced no counted vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbstainReason {
    /// The agent call itself failed.
    Invocation { error: String },
    /// The agent did not answer within the voter timeout.
    Timeout { after_secs: u64 },
    /// Nothing usable could be decoded.
    Unparseable { raw_prefix: String },
    /// Some fields were recovered but no verdict among them.
    NoVerdict {
        raw_prefix: String,
        recovered: Vec<String>,
    },
    /// The reviewer task panicked or was aborted.
    Join { error: String },
}

impl AbstainReason {
    pub fn label(&self) -> &'static str {
        match self {
            AbstainReason::Invocation { .. } => "invocation error",
            AbstainReason::Timeout { .. } => "timeout",
            AbstainReason::Unparseable { .. } => "unparseable response",
            AbstainReason::NoVerdict { .. } => "no verdict",
            AbstainReason::Join { .. } => "task failure",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            AbstainReason::Invocation { error } | AbstainReason::Join { error } => error.clone(),
            AbstainReason::Timeout { after_secs } => format!("no response after {after_secs}s"),
            AbstainReason::Unparseable { raw_prefix } => raw_prefix.clone(),
            AbstainReason::NoVerdict {
                raw_prefix,
                recovered,
            } => format!("recovered [{}] from: {}", recovered.join(", "), raw_prefix),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abstention {
    pub voter_id: String,
    pub role: String,
    pub reason: AbstainReason,
}

impl Abstention {
    pub fn new(voter_id: impl Into<String>, role: impl Into<String>, reason: AbstainReason) -> Self {
        Self {
            voter_id: voter_id.into(),
            role: role.into(),
            reason,
        }
    }
}

/// Outcome of one reviewer call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ballot {
    Cast(Vote),
    Abstained(Abstention),
}

impl Ballot {
    pub fn voter_id(&self) -> &str {
        match self {
            Ballot::Cast(v) => &v.voter_id,
            Ballot::Abstained(a) => &a.voter_id,
        }
    }
}

impl From<Vote> for Ballot {
    fn from(vote: Vote) -> Self {
        Ballot::Cast(vote)
    }
}

impl From<Abstention> for Ballot {
    fn from(abstention: Abstention) -> Self {
        Ballot::Abstained(abstention)
    }
}
