//! Workflow state machine: phases, their kinds, and session state.

pub mod phase;
pub mod state;

pub use phase::{PhaseKind, TerminalKind, WorkflowPhase};
pub use state::{Decision, RATIONALE_MAX_BYTES, WorkflowMode, WorkflowState};
