//! Lessons learned from rejected gates, and the rules promoted from them.
//!
//! The flow for one rejected gate:
//!
//! 1. each concern is classified as [`ConcernKind::Format`] or
//!    [`ConcernKind::Content`];
//! 2. it reinforces a near-duplicate lesson or creates a new one;
//! 3. lessons past the promotion thresholds become [`Rule`]s, once.
//!
//! [`LessonGuidance`] feeds rules and strong lessons back into prompts.

pub mod builtin;
pub mod classify;
pub mod entities;
pub mod guidance;
pub mod learning;
pub mod similarity;

pub use builtin::seed_builtin_rules;
pub use classify::{ConcernKind, FORMAT_KEYWORDS, classify};
pub use entities::{
    FORMAT_SCOPE, Lesson, LessonsDocument, LessonsMetadata, LessonsStats, Rule, RuleTrigger,
};
pub use guidance::LessonGuidance;
pub use learning::{ConcernRecord, LearningPolicy, LessonUpdate};
pub use similarity::{best_correction, is_similar};
