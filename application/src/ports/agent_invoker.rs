//! Agent invocation port
//!
//! Defines the interface for asking an agent to do one task.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while invoking an agent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,
}

/// One task for one agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub agent_id: String,
    pub task: String,
    pub context: String,
}

impl AgentRequest {
    pub fn new(agent_id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            task: task.into(),
            context: String::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResponse {
    pub agent_id: String,
    pub role: String,
    pub model: String,
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Gateway to the agents that produce artifacts and vote at gates.
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, InvocationError>;

    /// Human-readable role for an agent, used to tag votes and feedback.
    fn role(&self, agent_id: &str) -> String {
        humanize(agent_id)
    }
}

/// `voter_security` -> `Security`, `business_analyst` -> `Business Analyst`.
pub fn humanize(agent_id: &str) -> String {
    agent_id
        .trim_start_matches("voter_")
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanize_strips_voter_prefix() {
        assert_eq!(humanize("voter_security"), "Security");
        assert_eq!(humanize("business_analyst"), "Business Analyst");
        assert_eq!(humanize("qa"), "Qa");
    }
}
