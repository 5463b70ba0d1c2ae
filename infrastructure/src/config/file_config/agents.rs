//! Per-agent definitions from TOML (`[agents.<id>]` tables)

use serde::{Deserialize, Serialize};

/// Unset fields fall back to `[provider]` defaults; the role falls back to
/// a label derived from the agent id.
///
/// ```toml
/// [agents.voter_security]
/// role = "Security Reviewer"
/// model = "claude-opus-4-20250514"
/// system_prompt = "You review artifacts for security flaws."
/// temperature = 0.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentConfig {
    pub role: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}
