//! Stub backend and tool client shared by the chat tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::llm::backend::ChatBackend;
use crate::llm::types::{ChatCompletionRequest, ChatCompletionResponse, ModelType};
use crate::tools::client::{McpTool, ToolCallResult, ToolClient};

pub(crate) enum Step {
    Reply(ChatCompletionResponse),
    Fail(String),
    /// Block until the turn is cancelled.
    Hang,
}

/// Plays `steps` in order, then repeats `fallback` (or answers with no
/// choices) once they run out.
pub(crate) struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<ChatCompletionResponse>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
    pub called: Notify,
}

impl ScriptedBackend {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            called: Notify::new(),
        }
    }

    pub fn replies(replies: Vec<ChatCompletionResponse>) -> Self {
        Self::new(replies.into_iter().map(Step::Reply).collect())
    }

    pub fn repeating(reply: ChatCompletionResponse) -> Self {
        Self {
            fallback: Some(reply),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, i: usize) -> ChatCompletionRequest {
        self.requests.lock().unwrap()[i].clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn chat_completions(
        &self,
        request: ChatCompletionRequest,
        cancel: &CancellationToken,
    ) -> AppResult<ChatCompletionResponse> {
        self.requests.lock().unwrap().push(request);
        let step = self.steps.lock().unwrap().pop_front();
        self.called.notify_one();
        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Fail(message)) => Err(AppError::Backend(message)),
            Some(Step::Hang) => {
                cancel.cancelled().await;
                Err(AppError::Aborted)
            }
            None => Ok(self.fallback.clone().unwrap_or_default()),
        }
    }

    fn model_name(&self, model: ModelType) -> String {
        format!("{model:?}").to_lowercase()
    }
}

/// Echoes arguments back as a text block. `broken` fails, `stop` cancels
/// `cancel_on_stop`, `hang` never returns.
pub(crate) struct EchoTools {
    pub calls: Mutex<Vec<String>>,
    pub cancel_on_stop: Option<CancellationToken>,
    pub called: Notify,
}

impl EchoTools {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            cancel_on_stop: None,
            called: Notify::new(),
        }
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolClient for EchoTools {
    async fn list_tools(&self) -> AppResult<Vec<McpTool>> {
        Ok(vec![McpTool {
            name: "query".into(),
            description: Some("Run a query".into()),
            input_schema: json!({"type": "object"}),
        }])
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> AppResult<ToolCallResult> {
        self.calls.lock().unwrap().push(name.to_string());
        self.called.notify_one();
        match name {
            "broken" => Err(AppError::Tool("backend down".into())),
            "hang" => std::future::pending().await,
            _ => {
                if name == "stop" {
                    if let Some(token) = &self.cancel_on_stop {
                        token.cancel();
                    }
                }
                Ok(ToolCallResult {
                    content: json!([{ "type": "text", "text": arguments.to_string() }]),
                })
            }
        }
    }
}
