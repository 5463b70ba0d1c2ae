//! Infrastructure layer for gatekeeper
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod context;
pub mod logging;
pub mod persistence;
pub mod providers;

// Re-export commonly used types
pub use config::{
    ConfigError, ConfigIssue, ConfigIssueCode, ConfigLoader, FileAgentConfig, FileConfig,
    FileProviderConfig, Severity,
};
pub use context::{ScanError, SourceScan, SourceScanner};
pub use logging::{JsonlLedger, SessionIndex, latest_session, read_session_events};
pub use persistence::{JsonLessonsRepository, JsonStateStore};
pub use providers::{AgentDefinition, AgentDirectory, AnthropicAgentInvoker, ProviderError};
