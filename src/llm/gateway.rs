//! Chat-completion gateway adapter.
//!
//! Speaks an OpenAI-compatible `/chat/completions` endpoint, authenticating
//! each call with a bearer token from the client-credentials exchanger.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::llm::provider::TextGenerator;
use crate::llm::token::TokenExchanger;
use crate::types::{AppError, AppResult, ChatRequest, ChatResponse, TokenUsage};

pub struct GatewayClient {
    http: Client,
    api_base: String,
    tokens: TokenExchanger,
}

#[derive(Serialize)]
struct GatewayChatRequest<'a> {
    model: &'a str,
    messages: Vec<GatewayMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct GatewayMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct GatewayChatResponse {
    choices: Vec<GatewayChoice>,
    #[serde(default)]
    usage: Option<GatewayUsage>,
}

#[derive(Deserialize)]
struct GatewayChoice {
    message: GatewayResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GatewayResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct GatewayUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl GatewayClient {
    pub fn new(api_base: impl Into<String>, tokens: TokenExchanger) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.into(),
            tokens,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.api_base.clone(), TokenExchanger::from_config(config))
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl TextGenerator for GatewayClient {
    async fn generate(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        let bearer = self.tokens.bearer().await?;

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_instruction {
            messages.push(GatewayMessage { role: "system", content: system });
        }
        for message in &request.messages {
            messages.push(GatewayMessage {
                role: &message.role,
                content: &message.content,
            });
        }

        let body = GatewayChatRequest {
            model: &request.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(model = %request.model, messages = request.messages.len(), "Sending chat completion");
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&bearer)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Transport(format!(
                "chat gateway returned {status}: {body}"
            )));
        }

        let parsed: GatewayChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Transport(format!("invalid chat response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Transport("chat response had no choices".to_string()))?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content: choice.message.content,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}
