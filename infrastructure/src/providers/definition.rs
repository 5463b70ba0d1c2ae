//! Who each agent is and which model it runs on.

use crate::config::{FileAgentConfig, FileProviderConfig};
use gatekeeper_application::ports::agent_invoker::humanize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentDefinition {
    pub role: String,
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Agent definitions resolved against provider defaults.
#[derive(Debug, Clone, Default)]
pub struct AgentDirectory {
    defaults: DefaultAgent,
    agents: BTreeMap<String, FileAgentConfig>,
}

#[derive(Debug, Clone)]
struct DefaultAgent {
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl Default for DefaultAgent {
    fn default() -> Self {
        let provider = FileProviderConfig::default();
        Self {
            model: provider.model,
            max_tokens: provider.max_tokens,
            temperature: provider.temperature,
        }
    }
}

impl AgentDirectory {
    pub fn new(provider: &FileProviderConfig, agents: BTreeMap<String, FileAgentConfig>) -> Self {
        Self {
            defaults: DefaultAgent {
                model: provider.model.clone(),
                max_tokens: provider.max_tokens,
                temperature: provider.temperature,
            },
            agents,
        }
    }

    pub fn role(&self, agent_id: &str) -> String {
        self.agents
            .get(agent_id)
            .and_then(|a| a.role.clone())
            .unwrap_or_else(|| humanize(agent_id))
    }

    pub fn definition(&self, agent_id: &str) -> AgentDefinition {
        let configured = self.agents.get(agent_id);
        let role = self.role(agent_id);
        let system_prompt = configured
            .and_then(|a| a.system_prompt.clone())
            .unwrap_or_else(|| default_system_prompt(&role));

        AgentDefinition {
            model: configured
                .and_then(|a| a.model.clone())
                .unwrap_or_else(|| self.defaults.model.clone()),
            max_tokens: configured
                .and_then(|a| a.max_tokens)
                .unwrap_or(self.defaults.max_tokens),
            temperature: configured
                .and_then(|a| a.temperature)
                .unwrap_or(self.defaults.temperature),
            role,
            system_prompt,
        }
    }
}

fn default_system_prompt(role: &str) -> String {
    format!(
        "You are the {role} in a gated software delivery workflow. \
         Follow the task instructions exactly and answer in the requested format."
    )
}
