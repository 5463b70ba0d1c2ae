//! Quorum gate domain
//!
//! A gate asks a panel of reviewer agents whether an artifact may advance.
//!
//! ```text
//! reviewer responses ──parse──▶ Ballot (Vote | Abstention)
//!                                  │
//!                                  ▼
//!                GateResult::tally(threshold from QuorumRule)
//!                                  │
//!                                  ▼
//!                 FeedbackDocument (markdown for revision)
//! ```
//!
//! Abstentions are reported next to the tally but never counted toward it,
//! and a gate where every voter abstained always fails.

pub mod feedback;
pub mod gate;
pub mod parsing;
pub mod rule;
pub mod vote;

pub use feedback::{FeedbackDocument, SideSummary, TaggedItem, VoterReasoning};
pub use gate::{DEFAULT_MAX_RETRIES, GateConfig, GateKind, GateResult};
pub use parsing::{ParseOutcome, ParsedVote, RecoveredFields, parse_vote_response};
pub use rule::QuorumRule;
pub use vote::{AbstainReason, Abstention, Ballot, Provenance, Verdict, Vote};
