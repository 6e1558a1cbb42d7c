use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// OAuth token endpoint for the client-credentials exchange
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Base URL of the chat-completion gateway (OpenAI-compatible)
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    pub chart_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            llm: LlmConfig {
                token_url: env::var("LLM_TOKEN_URL")
                    .map_err(|_| anyhow!("LLM_TOKEN_URL must be set"))?,
                client_id: env::var("LLM_CLIENT_ID")
                    .map_err(|_| anyhow!("LLM_CLIENT_ID must be set"))?,
                client_secret: env::var("LLM_CLIENT_SECRET")
                    .map_err(|_| anyhow!("LLM_CLIENT_SECRET must be set"))?,
                api_base: env::var("LLM_API_BASE")
                    .map_err(|_| anyhow!("LLM_API_BASE must be set"))?,
                model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4".to_string()),
                max_tokens: env::var("LLM_MAX_TOKENS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()?,
                temperature: env::var("LLM_TEMPERATURE")
                    .unwrap_or_else(|_| "0.7".to_string())
                    .parse()?,
            },
            export: ExportConfig {
                chart_dir: env::var("CHART_DIR").unwrap_or_else(|_| "charts".to_string()),
            },
        })
    }
}
