//! Gate configuration and the per-attempt tally.

use super::feedback::FeedbackDocument;
use super::rule::QuorumRule;
use super::vote::{Abstention, Ballot, Vote};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Who votes at a gate and how many of them must pass it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateKind {
    /// A panel of reviewers; the rule sets the threshold.
    Quorum {
        voters: Vec<String>,
        #[serde(default)]
        rule: QuorumRule,
    },
    /// One approver judging against explicit criteria; threshold is 1.
    Single {
        approver: String,
        #[serde(default)]
        criteria: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    pub id: String,
    pub name: String,
    pub kind: GateKind,
    /// Revisions allowed after the first attempt.
    pub max_retries: u32,
    /// What the gate checks, shown to voters.
    #[serde(default)]
    pub trigger: String,
}

impl GateConfig {
    pub fn quorum(
        id: impl Into<String>,
        name: impl Into<String>,
        voters: Vec<String>,
        rule: QuorumRule,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: GateKind::Quorum { voters, rule },
            max_retries: DEFAULT_MAX_RETRIES,
            trigger: String::new(),
        }
    }

    pub fn single(
        id: impl Into<String>,
        name: impl Into<String>,
        approver: impl Into<String>,
        criteria: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: GateKind::Single {
                approver: approver.into(),
                criteria,
            },
            max_retries: DEFAULT_MAX_RETRIES,
            trigger: String::new(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = trigger.into();
        self
    }

    pub fn voters(&self) -> Vec<&str> {
        match &self.kind {
            GateKind::Quorum { voters, .. } => voters.iter().map(String::as_str).collect(),
            GateKind::Single { approver, .. } => vec![approver.as_str()],
        }
    }

    pub fn threshold(&self) -> usize {
        match &self.kind {
            GateKind::Quorum { voters, rule } => rule.threshold(voters.len()),
            GateKind::Single { .. } => 1,
        }
    }

    pub fn criteria(&self) -> &[String] {
        match &self.kind {
            GateKind::Single { criteria, .. } => criteria,
            GateKind::Quorum { .. } => &[],
        }
    }

    /// Voting attempts the gate may make before escalating.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Result of one voting attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_id: String,
    pub gate_name: String,
    pub passed: bool,
    pub votes: Vec<Vote>,
    pub abstentions: Vec<Abstention>,
    pub approve_count: usize,
    pub reject_count: usize,
    pub threshold: usize,
    /// Zero-based attempt index; `0` is the first vote.
    pub retry_count: u32,
    pub feedback: String,
    pub timestamp: DateTime<Utc>,
}

impl GateResult {
    /// Tally ballots for one attempt.
    ///
    /// `passed` holds exactly when at least one vote was counted and
    /// `approve_count >= threshold`. Ballot order does not matter.
    pub fn tally(
        gate: &GateConfig,
        retry_count: u32,
        ballots: Vec<Ballot>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut votes = Vec::new();
        let mut abstentions = Vec::new();
        for ballot in ballots {
            match ballot {
                Ballot::Cast(vote) => votes.push(vote),
                Ballot::Abstained(abstention) => abstentions.push(abstention),
            }
        }
        // Stable order for logs and feedback regardless of arrival order.
        votes.sort_by(|a, b| a.voter_id.cmp(&b.voter_id));
        abstentions.sort_by(|a, b| a.voter_id.cmp(&b.voter_id));

        let approve_count = votes.iter().filter(|v| v.is_pass()).count();
        let reject_count = votes.len() - approve_count;
        let threshold = gate.threshold();
        let passed = !votes.is_empty() && approve_count >= threshold;
        let feedback = FeedbackDocument::aggregate(&votes, &abstentions).to_markdown();

        Self {
            gate_id: gate.id.clone(),
            gate_name: gate.name.clone(),
            passed,
            votes,
            abstentions,
            approve_count,
            reject_count,
            threshold,
            retry_count,
            feedback,
            timestamp,
        }
    }

    pub fn abstain_count(&self) -> usize {
        self.abstentions.len()
    }

    /// Visual summary such as `[●●○·]`: pass, fail, abstain.
    pub fn vote_summary(&self) -> String {
        let mut summary = String::from("[");
        for vote in &self.votes {
            summary.push(if vote.is_pass() { '●' } else { '○' });
        }
        for _ in &self.abstentions {
            summary.push('·');
        }
        summary.push(']');
        summary
    }
}
