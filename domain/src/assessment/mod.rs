//! Codebase assessment for the ingest pipeline.
//!
//! Rule engines and assessor agents produce [`Finding`]s per step; steps are
//! reviewed independently and collected into an [`AssessmentReport`].

pub mod context;
pub mod finding;
pub mod parsing;
pub mod report;

pub use context::{AssessmentContext, STEP_NAMES, StepProfile, step_profile};
pub use finding::{Finding, FindingSource, Severity, merge_findings};
pub use parsing::{AssessmentOutcome, StepAssessment, parse_assessment};
pub use report::{AssessmentReport, StepReport, StepStatus};
