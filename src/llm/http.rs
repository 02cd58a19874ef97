use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::llm::backend::ChatBackend;
use crate::llm::types::{ChatCompletionRequest, ChatCompletionResponse, ModelType};
use crate::models::settings::ChatSettings;

/// Client for OpenAI-compatible chat-completions endpoints.
pub struct HttpChatBackend {
    client: Client,
    base_url: String,
    api_key: String,
    standard_model: String,
    thinking_model: String,
}

impl HttpChatBackend {
    pub fn from_settings(settings: &ChatSettings) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            standard_model: settings.standard_model.clone(),
            thinking_model: settings.thinking_model.clone(),
        })
    }

    pub fn completions_url(&self) -> String {
        if self.base_url.contains("/chat/completions") {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
        }
    }

    async fn send(&self, request: &ChatCompletionRequest) -> AppResult<ChatCompletionResponse> {
        let mut builder = self
            .client
            .post(self.completions_url())
            .header("Content-Type", "application/json")
            .json(request);
        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Backend(format!("API error ({status}): {error_text}")));
        }

        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| AppError::Backend(format!("Failed to parse response: {e}")))
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
        cancel: &CancellationToken,
    ) -> AppResult<ChatCompletionResponse> {
        log::debug!(
            "[Chat] POST {} model={} messages={}",
            self.completions_url(),
            request.model,
            request.messages.len()
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Aborted),
            result = self.send(&request) => result,
        }
    }

    fn model_name(&self, model: ModelType) -> String {
        match model {
            ModelType::Standard => self.standard_model.clone(),
            ModelType::Thinking => self.thinking_model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base_url: &str) -> HttpChatBackend {
        let settings = ChatSettings {
            base_url: base_url.into(),
            ..Default::default()
        };
        HttpChatBackend::from_settings(&settings).unwrap()
    }

    #[test]
    fn test_completions_url() {
        assert_eq!(backend("http://h/v1/").completions_url(), "http://h/v1/chat/completions");
        assert_eq!(
            backend("http://h/v1/chat/completions").completions_url(),
            "http://h/v1/chat/completions"
        );
    }

    #[test]
    fn test_model_mapping() {
        let b = backend("http://h");
        assert_eq!(b.model_name(ModelType::Standard), "base");
        assert_eq!(b.model_name(ModelType::Thinking), "large");
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let b = backend("http://127.0.0.1:9");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let request = ChatCompletionRequest {
            model: "base".into(),
            messages: vec![],
            tools: None,
        };
        let err = b.chat_completions(request, &cancel).await.unwrap_err();
        assert!(err.is_aborted());
    }
}
