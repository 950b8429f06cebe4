
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::{ChatMessage, ChatModel};
use crate::config::Config;
use crate::http::{ApiClient, ServiceError, endpoint};
use crate::{RagError, Result};

/// Client for an OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone)]
pub struct GroqClient {
    api: ApiClient,
    base_url: Url,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl GroqClient {
    #[inline]
    pub fn new(config: &Config, api_key: &str) -> Result<Self> {
        let base_url = config
            .llm
            .base_url()
            .map_err(|e| RagError::Config(e.to_string()))?;

        Ok(Self {
            api: ApiClient::new(&config.http).with_bearer_token(api_key),
            base_url,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        })
    }

    #[inline]
    pub fn with_api_client(mut self, api: ApiClient) -> Self {
        self.api = api;
        self
    }
}

impl ChatModel for GroqClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = endpoint(&self.base_url, "chat/completions").map_err(RagError::Generation)?;

        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let response: CompletionResponse = self
            .api
            .post_json(&url, &request)
            .map_err(RagError::Generation)?;

        if let Some(usage) = &response.usage {
            debug!(
                "Completion used {} prompt and {} completion tokens",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            RagError::Generation(ServiceError::InvalidResponse(
                "Completion returned no choices".to_string(),
            ))
        })?;

        if choice.finish_reason.as_deref() == Some("length") {
            warn!("Answer was truncated by the token limit");
        }

        choice.message.content.ok_or_else(|| {
            RagError::Generation(ServiceError::InvalidResponse(
                "Completion message has no content".to_string(),
            ))
        })
    }
}
