use async_trait::async_trait;

use crate::types::{AppResult, ChatRequest, ChatResponse};

/// Seam between the orchestrator and the remote text-generation service.
/// Tests substitute scripted implementations.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &ChatRequest) -> AppResult<ChatResponse>;
}
