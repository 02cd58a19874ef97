use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::llm::backend::ChatBackend;
use crate::llm::payload::build_wire_messages;
use crate::llm::types::{
    ChatCompletionRequest, ChatCompletionResponse, MessageContent, ModelType, ToolSchema, WireMessage,
};
use crate::models::message::{Message, Role, ToolCallRequest, ToolExecution, ToolExecutionStatus};
use crate::tools::client::ToolClient;

/// Upper bound on model round-trips that end in tool calls.
pub const MAX_TOOL_ITERATIONS: usize = 5;

/// One user turn against the backend: call the model, run any requested
/// tools, feed their results back, and repeat until the model answers
/// without tool calls or the iteration cap is hit.
pub struct AgentLoop<'a> {
    backend: &'a dyn ChatBackend,
    tool_client: Option<&'a dyn ToolClient>,
    tool_schemas: &'a [ToolSchema],
    max_iterations: usize,
}

impl<'a> AgentLoop<'a> {
    pub fn new(backend: &'a dyn ChatBackend) -> Self {
        Self {
            backend,
            tool_client: None,
            tool_schemas: &[],
            max_iterations: MAX_TOOL_ITERATIONS,
        }
    }

    pub fn with_tools(mut self, client: Option<&'a dyn ToolClient>, schemas: &'a [ToolSchema]) -> Self {
        self.tool_client = client;
        self.tool_schemas = schemas;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Run the turn. `on_update` sees the latest assistant text and the tool
    /// execution list every time either changes; it is never called after
    /// cancellation is observed. Returns the final assistant text.
    pub async fn chat<F>(
        &self,
        history: &[Message],
        context: &str,
        model: ModelType,
        cancel: &CancellationToken,
        mut on_update: F,
    ) -> AppResult<String>
    where
        F: FnMut(&str, &[ToolExecution]) + Send,
    {
        let mut messages = build_wire_messages(history, context);
        let model_name = self.backend.model_name(model);

        check_cancel(cancel)?;
        let first = self
            .complete(&model_name, &messages, cancel)
            .await?
            .first_message()
            .ok_or_else(|| AppError::Backend("No choices in response".into()))?;

        let mut content = first.content.unwrap_or_default();
        let mut tool_calls = first.tool_calls.unwrap_or_default();
        let mut executions: Vec<ToolExecution> = Vec::new();

        if !content.is_empty() {
            on_update(&content, &executions);
        }

        let mut iteration = 0;
        let mut ran_dry = false;
        while !tool_calls.is_empty() && iteration < self.max_iterations {
            check_cancel(cancel)?;
            iteration += 1;
            log::debug!(
                "[Chat] Tool iteration {}/{} with {} call(s)",
                iteration,
                self.max_iterations,
                tool_calls.len()
            );

            messages.push(WireMessage {
                role: Role::Assistant,
                content: MessageContent::Text(content.clone()),
                tool_call_id: None,
                tool_calls: Some(tool_calls.clone()),
            });

            for call in &tool_calls {
                check_cancel(cancel)?;

                executions.push(ToolExecution::pending(&call.function.name));
                let slot = executions.len() - 1;
                on_update(&content, &executions);

                let result_text = match self.execute_tool(call, cancel).await {
                    Ok(text) => {
                        executions[slot].status = ToolExecutionStatus::Success;
                        text
                    }
                    Err(AppError::Aborted) => return Err(AppError::Aborted),
                    Err(e) => {
                        let message = match e {
                            AppError::Tool(message) => message,
                            other => other.to_string(),
                        };
                        log::error!("[Chat] Tool {} failed: {}", call.function.name, message);
                        executions[slot].status = ToolExecutionStatus::Error;
                        executions[slot].error = Some(message.clone());
                        format!("Error executing {}: {}", call.function.name, message)
                    }
                };
                messages.push(WireMessage {
                    role: Role::Tool,
                    content: MessageContent::Text(result_text),
                    tool_call_id: Some(call.id.clone()),
                    tool_calls: None,
                });
                on_update(&content, &executions);
            }

            check_cancel(cancel)?;
            match self.complete(&model_name, &messages, cancel).await?.first_message() {
                Some(next) => {
                    if let Some(text) = next.content.filter(|t| !t.is_empty()) {
                        content = text;
                    }
                    tool_calls = next.tool_calls.unwrap_or_default();
                    on_update(&content, &executions);
                }
                None => {
                    ran_dry = true;
                    break;
                }
            }
        }

        if !ran_dry && !tool_calls.is_empty() {
            log::warn!(
                "[Chat] Max tool calling iterations ({}) reached, stopping",
                self.max_iterations
            );
        }

        Ok(content)
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[WireMessage],
        cancel: &CancellationToken,
    ) -> AppResult<ChatCompletionResponse> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            tools: if self.tool_schemas.is_empty() {
                None
            } else {
                Some(self.tool_schemas.to_vec())
            },
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Aborted),
            result = self.backend.chat_completions(request, cancel) => result,
        }
    }

    /// Run one tool call and serialize its result content.
    async fn execute_tool(&self, call: &ToolCallRequest, cancel: &CancellationToken) -> AppResult<String> {
        let client = self
            .tool_client
            .ok_or_else(|| AppError::Tool("Tool client not available".into()))?;

        let raw = call.function.arguments.trim();
        let arguments: Value = if raw.is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(raw)
                .map_err(|e| AppError::Tool(format!("Invalid arguments for {}: {}", call.function.name, e)))?
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Aborted),
            result = client.call_tool(&call.function.name, arguments) => result?,
        };
        Ok(serde_json::to_string(&result.content)?)
    }
}

fn check_cancel(cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        log::info!("[Chat] Turn cancelled");
        return Err(AppError::Aborted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::{EchoTools, ScriptedBackend};
    use crate::tools::client::McpTool;
    use serde_json::json;

    type Updates = Vec<(String, Vec<ToolExecution>)>;

    fn recorder(updates: &mut Updates) -> impl FnMut(&str, &[ToolExecution]) + Send + '_ {
        move |content, executions| updates.push((content.to_string(), executions.to_vec()))
    }

    fn call(id: &str, name: &str) -> ToolCallRequest {
        ToolCallRequest::new(id, name, r#"{"q":"up"}"#)
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let backend = ScriptedBackend::replies(vec![ChatCompletionResponse::reply("Hello", vec![])]);
        let mut updates = Updates::new();
        let result = AgentLoop::new(&backend)
            .chat(
                &[Message::user("hi")],
                "",
                ModelType::Standard,
                &CancellationToken::new(),
                recorder(&mut updates),
            )
            .await
            .unwrap();

        assert_eq!(result, "Hello");
        assert_eq!(backend.calls(), 1);
        assert_eq!(updates, vec![("Hello".to_string(), vec![])]);
        assert_eq!(backend.request(0).model, "standard");
        assert!(backend.request(0).tools.is_none());
    }

    #[tokio::test]
    async fn test_single_tool_round_trip() {
        let backend = ScriptedBackend::replies(vec![
            ChatCompletionResponse::reply("", vec![call("c1", "query")]),
            ChatCompletionResponse::reply("The answer is 42", vec![]),
        ]);
        let tools = EchoTools::new();
        let schemas = vec![ToolSchema::from(McpTool {
            name: "query".into(),
            description: None,
            input_schema: json!({"type": "object"}),
        })];
        let mut updates = Updates::new();

        let result = AgentLoop::new(&backend)
            .with_tools(Some(&tools), &schemas)
            .chat(
                &[Message::user("q")],
                "",
                ModelType::Thinking,
                &CancellationToken::new(),
                recorder(&mut updates),
            )
            .await
            .unwrap();

        assert_eq!(result, "The answer is 42");
        assert_eq!(backend.calls(), 2);
        assert_eq!(backend.request(0).tools.as_ref().map(Vec::len), Some(1));

        // Empty initial content produces no update; then pending, success, final.
        let statuses: Vec<_> = updates
            .iter()
            .map(|(_, execs)| execs.iter().map(|e| e.status).collect::<Vec<_>>())
            .collect();
        assert_eq!(
            statuses,
            vec![
                vec![ToolExecutionStatus::Pending],
                vec![ToolExecutionStatus::Success],
                vec![ToolExecutionStatus::Success],
            ]
        );
        assert_eq!(updates.last().unwrap().0, "The answer is 42");

        // Second request carries the assistant tool-call message and the result.
        let second = backend.request(1);
        let n = second.messages.len();
        assert_eq!(second.messages[n - 2].role, Role::Assistant);
        assert_eq!(second.messages[n - 2].tool_calls.as_ref().unwrap()[0].id, "c1");
        assert_eq!(second.messages[n - 1].role, Role::Tool);
        assert_eq!(second.messages[n - 1].tool_call_id.as_deref(), Some("c1"));
        assert!(second.messages[n - 1].content.as_text().unwrap().contains("up"));
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let backend = ScriptedBackend::repeating(ChatCompletionResponse::reply("again", vec![call("c", "query")]));
        let tools = EchoTools::new();

        let result = AgentLoop::new(&backend)
            .with_tools(Some(&tools), &[])
            .chat(&[Message::user("q")], "", ModelType::Standard, &CancellationToken::new(), |_, _| {})
            .await
            .unwrap();

        assert_eq!(result, "again");
        assert_eq!(backend.calls(), 1 + MAX_TOOL_ITERATIONS);
        assert_eq!(tools.call_names().len(), MAX_TOOL_ITERATIONS);
    }

    #[tokio::test]
    async fn test_custom_iteration_cap() {
        let backend = ScriptedBackend::repeating(ChatCompletionResponse::reply("x", vec![call("c", "query")]));
        let tools = EchoTools::new();
        AgentLoop::new(&backend)
            .with_tools(Some(&tools), &[])
            .with_max_iterations(2)
            .chat(&[Message::user("q")], "", ModelType::Standard, &CancellationToken::new(), |_, _| {})
            .await
            .unwrap();
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_abort_between_tool_calls() {
        let cancel = CancellationToken::new();
        let backend = ScriptedBackend::replies(vec![ChatCompletionResponse::reply(
            "",
            vec![call("c1", "stop"), call("c2", "query")],
        )]);
        let tools = EchoTools {
            cancel_on_stop: Some(cancel.clone()),
            ..EchoTools::new()
        };
        let mut updates = Updates::new();

        let err = AgentLoop::new(&backend)
            .with_tools(Some(&tools), &[])
            .chat(&[Message::user("q")], "", ModelType::Standard, &cancel, recorder(&mut updates))
            .await
            .unwrap_err();

        assert!(err.is_aborted());
        assert_eq!(backend.calls(), 1);
        assert_eq!(tools.call_names(), vec!["stop".to_string()]);
        let last = &updates.last().unwrap().1;
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].status, ToolExecutionStatus::Success);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let backend = ScriptedBackend::replies(vec![ChatCompletionResponse::reply("x", vec![])]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = AgentLoop::new(&backend)
            .chat(&[Message::user("q")], "", ModelType::Standard, &cancel, |_, _| {})
            .await
            .unwrap_err();
        assert!(err.is_aborted());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_tool_client_reports_error() {
        let backend = ScriptedBackend::replies(vec![
            ChatCompletionResponse::reply("checking", vec![call("c1", "query")]),
            ChatCompletionResponse::reply("", vec![]),
        ]);
        let mut updates = Updates::new();

        let result = AgentLoop::new(&backend)
            .chat(
                &[Message::user("q")],
                "",
                ModelType::Standard,
                &CancellationToken::new(),
                recorder(&mut updates),
            )
            .await
            .unwrap();

        // Empty follow-up content keeps the previous text.
        assert_eq!(result, "checking");
        let execs = &updates.last().unwrap().1;
        assert_eq!(execs[0].status, ToolExecutionStatus::Error);
        assert!(execs[0].error.as_deref().unwrap().contains("Tool client not available"));

        let second = backend.request(1);
        let tool_msg = second.messages.last().unwrap();
        assert!(tool_msg
            .content
            .as_text()
            .unwrap()
            .starts_with("Error executing query: "));
    }

    #[tokio::test]
    async fn test_failing_tool_does_not_stop_the_loop() {
        let backend = ScriptedBackend::replies(vec![
            ChatCompletionResponse::reply("", vec![call("c1", "broken"), call("c2", "query")]),
            ChatCompletionResponse::reply("done", vec![]),
        ]);
        let tools = EchoTools::new();
        let mut updates = Updates::new();

        let result = AgentLoop::new(&backend)
            .with_tools(Some(&tools), &[])
            .chat(
                &[Message::user("q")],
                "",
                ModelType::Standard,
                &CancellationToken::new(),
                recorder(&mut updates),
            )
            .await
            .unwrap();

        assert_eq!(result, "done");
        let execs = &updates.last().unwrap().1;
        assert_eq!(execs[0].status, ToolExecutionStatus::Error);
        assert_eq!(execs[1].status, ToolExecutionStatus::Success);
    }

    #[tokio::test]
    async fn test_no_choices() {
        let backend = ScriptedBackend::replies(vec![ChatCompletionResponse::default()]);
        let err = AgentLoop::new(&backend)
            .chat(&[Message::user("q")], "", ModelType::Standard, &CancellationToken::new(), |_, _| {})
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No choices in response");
    }

    #[tokio::test]
    async fn test_follow_up_without_choices_ends_turn() {
        let backend = ScriptedBackend::replies(vec![
            ChatCompletionResponse::reply("partial", vec![call("c1", "query")]),
            ChatCompletionResponse::default(),
        ]);
        let tools = EchoTools::new();
        let result = AgentLoop::new(&backend)
            .with_tools(Some(&tools), &[])
            .chat(&[Message::user("q")], "", ModelType::Standard, &CancellationToken::new(), |_, _| {})
            .await
            .unwrap();
        assert_eq!(result, "partial");
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_context_reaches_backend() {
        let backend = ScriptedBackend::replies(vec![ChatCompletionResponse::reply("ok", vec![])]);
        AgentLoop::new(&backend)
            .chat(
                &[Message::user("q")],
                "Dashboard: Home",
                ModelType::Standard,
                &CancellationToken::new(),
                |_, _| {},
            )
            .await
            .unwrap();
        let first = &backend.request(0).messages[0];
        assert_eq!(first.role, Role::System);
        assert_eq!(first.content.as_text(), Some("Context:\nDashboard: Home"));
    }
}
