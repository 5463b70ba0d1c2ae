//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`] - domain-level errors
//! - [`text`] - UTF-8 safe clipping used for bounded summaries
//! - [`json`] - fence stripping and truncated-JSON repair for agent output

pub mod error;
pub mod json;
pub mod text;
