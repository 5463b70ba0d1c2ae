//! Prompt templates for gates, production phases and assessment steps

pub mod assessment;
pub mod gate;
pub mod phase;

pub use assessment::AssessmentPromptTemplate;
pub use gate::GatePromptTemplate;
pub use phase::PhasePromptTemplate;
