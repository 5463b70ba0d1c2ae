//! Quorum rules: how many pass verdicts a gate needs.
//!
//! A rule resolves to a numeric threshold against the number of *configured*
//! voters, not the number that happened to answer. Abstentions therefore make
//! a gate harder to pass, never easier.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Rule for computing a gate's pass threshold.
///
/// # Example
///
/// ```
/// use gatekeeper_domain::quorum::QuorumRule;
///
/// assert_eq!(QuorumRule::Majority.threshold(5), 3);
/// assert_eq!(QuorumRule::AtLeast(4).threshold(5), 4);
/// assert_eq!("80%".parse::<QuorumRule>().unwrap().threshold(5), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QuorumRule {
    /// More than half of the configured voters.
    #[default]
    Majority,
    /// Every configured voter.
    Unanimous,
    /// A fixed count, e.g. "4 of 5".
    AtLeast(usize),
    /// At least this percentage (0-100) of configured voters, rounded up.
    Percentage(u8),
}

impl QuorumRule {
    /// Pass threshold for `configured` voters. Never below 1, so a gate can
    /// never pass with zero approvals.
    pub fn threshold(&self, configured: usize) -> usize {
        let raw = match self {
            QuorumRule::Majority => configured / 2 + 1,
            QuorumRule::Unanimous => configured,
            QuorumRule::AtLeast(n) => *n,
            QuorumRule::Percentage(p) => (configured * (*p as usize)).div_ceil(100),
        };
        raw.max(1)
    }

    /// Whether the rule can be met at all with `configured` voters.
    pub fn is_attainable(&self, configured: usize) -> bool {
        configured > 0 && self.threshold(configured) <= configured
    }

    pub fn description(&self) -> String {
        match self {
            QuorumRule::Majority => "majority".to_string(),
            QuorumRule::Unanimous => "unanimous".to_string(),
            QuorumRule::AtLeast(n) => format!("atleast:{n}"),
            QuorumRule::Percentage(p) => format!("{p}%"),
        }
    }
}

impl std::fmt::Display for QuorumRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

impl std::str::FromStr for QuorumRule {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let invalid = || DomainError::InvalidRule(s.to_string());
        match lowered.as_str() {
            "majority" => Ok(QuorumRule::Majority),
            "unanimous" | "all" => Ok(QuorumRule::Unanimous),
            other => {
                if let Some(n) = other
                    .strip_prefix("atleast:")
                    .or_else(|| other.strip_prefix("at_least:"))
                {
                    return n.parse().map(QuorumRule::AtLeast).map_err(|_| invalid());
                }
                let pct = other
                    .strip_prefix("percentage:")
                    .or_else(|| other.strip_suffix('%'));
                match pct.map(str::parse::<u8>) {
                    Some(Ok(p)) if p <= 100 => Ok(QuorumRule::Percentage(p)),
                    Some(_) => Err(invalid()),
                    // A bare number means "at least n".
                    None => other.parse().map(QuorumRule::AtLeast).map_err(|_| invalid()),
                }
            }
        }
    }
}

impl TryFrom<String> for QuorumRule {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QuorumRule> for String {
    fn from(rule: QuorumRule) -> Self {
        rule.description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_threshold() {
        assert_eq!(QuorumRule::Majority.threshold(3), 2);
        assert_eq!(QuorumRule::Majority.threshold(4), 3);
        assert_eq!(QuorumRule::Majority.threshold(5), 3);
    }

    #[test]
    fn threshold_is_never_zero() {
        assert_eq!(QuorumRule::AtLeast(0).threshold(5), 1);
        assert_eq!(QuorumRule::Percentage(0).threshold(5), 1);
        assert_eq!(QuorumRule::Unanimous.threshold(0), 1);
    }

    #[test]
    fn percentage_rounds_up() {
        assert_eq!(QuorumRule::Percentage(75).threshold(4), 3);
        assert_eq!(QuorumRule::Percentage(75).threshold(5), 4);
        assert_eq!(QuorumRule::Percentage(100).threshold(5), 5);
    }

    #[test]
    fn unattainable_rules_are_detected() {
        assert!(!QuorumRule::AtLeast(4).is_attainable(3));
        assert!(QuorumRule::AtLeast(3).is_attainable(3));
        assert!(!QuorumRule::Majority.is_attainable(0));
    }

    #[test]
    fn parses_all_spellings() {
        assert_eq!("Majority".parse(), Ok(QuorumRule::Majority));
        assert_eq!("all".parse(), Ok(QuorumRule::Unanimous));
        assert_eq!("atleast:4".parse(), Ok(QuorumRule::AtLeast(4)));
        assert_eq!("at_least:2".parse(), Ok(QuorumRule::AtLeast(2)));
        assert_eq!("3".parse(), Ok(QuorumRule::AtLeast(3)));
        assert_eq!("percentage:60".parse(), Ok(QuorumRule::Percentage(60)));
        assert_eq!("80%".parse(), Ok(QuorumRule::Percentage(80)));
        assert!("150%".parse::<QuorumRule>().is_err());
        assert!("most".parse::<QuorumRule>().is_err());
    }

    #[test]
    fn serializes_as_its_string_form() {
        let json = serde_json::to_string(&QuorumRule::AtLeast(4)).unwrap();
        assert_eq!(json, "\"atleast:4\"");
        let back: QuorumRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, QuorumRule::AtLeast(4));
    }
}
