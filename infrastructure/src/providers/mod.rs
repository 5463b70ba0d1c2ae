//! Agent providers.
//!
//! [`AnthropicAgentInvoker`] implements the
//! [`AgentInvoker`](gatekeeper_application::AgentInvoker) port against an
//! Anthropic-compatible messages API. Each agent id maps to an
//! [`AgentDefinition`]; ids without a definition get one derived from the
//! provider defaults.

mod anthropic;
mod definition;

pub use anthropic::{AnthropicAgentInvoker, ProviderError};
pub use definition::{AgentDefinition, AgentDirectory};
