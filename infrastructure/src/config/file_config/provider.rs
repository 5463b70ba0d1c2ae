//! Agent provider configuration from TOML (`[provider]` section)

use serde::{Deserialize, Serialize};

/// Anthropic-compatible messages API.
///
/// ```toml
/// [provider]
/// base_url = "https://api.anthropic.com"
/// api_key_env = "ANTHROPIC_API_KEY"
/// model = "claude-sonnet-4-20250514"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    pub base_url: String,
    /// Environment variable name for the API key.
    pub api_key_env: String,
    /// Direct API key (not recommended, use the env var instead).
    pub api_key: Option<String>,
    /// Anthropic API version header.
    pub api_version: String,
    /// Model for agents that do not name one.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// HTTP request timeout. The per-voter timeout in `[quorum]` applies on top.
    pub request_timeout_secs: u64,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            api_key: None,
            api_version: "2023-06-01".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 8192,
            temperature: 0.2,
            request_timeout_secs: 600,
        }
    }
}

impl FileProviderConfig {
    /// The configured key, or the one in `api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }
}
