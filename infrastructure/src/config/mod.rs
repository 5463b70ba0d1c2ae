//! Configuration file loading for gatekeeper
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `GATEKEEPER_*` environment variables (`__` separates sections)
//! 2. `--config <path>` specified file
//! 3. Project root: `./gatekeeper.toml` or `./.gatekeeper.toml`
//! 4. Global: `$XDG_CONFIG_HOME/gatekeeper/config.toml`
//! 5. Default values

mod file_config;
mod issue;
mod loader;

pub use file_config::{
    FileAgentConfig, FileAssessmentConfig, FileConfig, FileEngineConfig, FileGateConfig,
    FileLearningConfig, FileLoggingConfig, FileProviderConfig, FileQuorumConfig,
};
pub use issue::{ConfigIssue, ConfigIssueCode, Severity};
pub use loader::{ConfigError, ConfigLoader};
