use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;
use crate::llm::types::{ChatCompletionRequest, ChatCompletionResponse, ModelType};

/// The model backend. Implementations should stop their own in-flight work
/// when `cancel` fires; the agent loop only guarantees it issues no new calls.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
        cancel: &CancellationToken,
    ) -> AppResult<ChatCompletionResponse>;

    /// Concrete model name for a selector.
    fn model_name(&self, model: ModelType) -> String;
}
