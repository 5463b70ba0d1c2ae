//! Application-level configuration.
//!
//! This module provides configuration types that control how use cases behave:
//!
//! - [`EngineParams`] - phase attempts, voter timeout, learning and assessment settings
//! - [`GateCatalog`] - gate definitions resolved by id

pub mod engine_params;
pub mod gate_catalog;

pub use engine_params::{AssessmentMode, DEFAULT_VOTER_TIMEOUT, EngineParams};
pub use gate_catalog::{ASSESSMENT_STEP_GATE, GateCatalog};
