//! Anthropic messages API adapter.

use super::definition::{AgentDefinition, AgentDirectory};
use crate::config::FileProviderConfig;
use async_trait::async_trait;
use gatekeeper_application::{AgentInvoker, AgentRequest, AgentResponse, InvocationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Longest error body kept in an [`InvocationError::Http`].
const ERROR_BODY_MAX: usize = 500;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("No API key: set {0} or provider.api_key")]
    MissingApiKey(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: UsageBlock,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UsageBlock {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

pub struct AnthropicAgentInvoker {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
    directory: AgentDirectory,
}

impl AnthropicAgentInvoker {
    pub fn new(provider: &FileProviderConfig, directory: AgentDirectory) -> Result<Self, ProviderError> {
        let api_key = provider
            .resolve_api_key()
            .ok_or_else(|| ProviderError::MissingApiKey(provider.api_key_env.clone()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(provider.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", provider.base_url.trim_end_matches('/')),
            api_key,
            api_version: provider.api_version.clone(),
            directory,
        })
    }
}

fn user_content(request: &AgentRequest) -> String {
    if request.context.trim().is_empty() {
        request.task.clone()
    } else {
        format!("{}\n\n---\n\n{}", request.context, request.task)
    }
}

fn build_request<'a>(definition: &'a AgentDefinition, request: &AgentRequest) -> MessagesRequest<'a> {
    MessagesRequest {
        model: &definition.model,
        max_tokens: definition.max_tokens,
        temperature: definition.temperature,
        system: &definition.system_prompt,
        messages: vec![Message {
            role: "user",
            content: user_content(request),
        }],
    }
}

fn map_transport_error(error: reqwest::Error) -> InvocationError {
    if error.is_timeout() {
        InvocationError::Timeout
    } else {
        InvocationError::RequestFailed(error.to_string())
    }
}

/// Concatenated text blocks, plus the model that actually answered.
fn parse_response(
    body: &str,
    fallback_model: &str,
) -> Result<(String, String, u64, u64), InvocationError> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| InvocationError::MalformedResponse(e.to_string()))?;

    let text: Vec<&str> = parsed
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();
    if text.is_empty() {
        return Err(InvocationError::MalformedResponse(
            "response has no text content".into(),
        ));
    }

    Ok((
        text.join("\n"),
        parsed.model.unwrap_or_else(|| fallback_model.to_string()),
        parsed.usage.input_tokens,
        parsed.usage.output_tokens,
    ))
}

fn clip_body(body: &str) -> String {
    let mut end = body.len().min(ERROR_BODY_MAX);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].trim().to_string()
}

#[async_trait]
impl AgentInvoker for AnthropicAgentInvoker {
    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, InvocationError> {
        let definition = self.directory.definition(&request.agent_id);
        let payload = build_request(&definition, request);
        debug!(
            "Invoking {} on {} ({} bytes)",
            request.agent_id,
            definition.model,
            payload.messages[0].content.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(InvocationError::Http {
                status: status.as_u16(),
                message: clip_body(&body),
            });
        }

        let (content, model, input_tokens, output_tokens) =
            parse_response(&body, &definition.model)?;
        Ok(AgentResponse {
            agent_id: request.agent_id.clone(),
            role: definition.role,
            model,
            content,
            input_tokens,
            output_tokens,
        })
    }

    fn role(&self, agent_id: &str) -> String {
        self.directory.role(agent_id)
    }
}
