use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::llm::types::{FunctionSchema, ToolSchema};

/// Tool descriptor as advertised by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: serde_json::Value,
}

impl From<McpTool> for ToolSchema {
    fn from(tool: McpTool) -> Self {
        ToolSchema {
            kind: "function".into(),
            function: FunctionSchema {
                name: tool.name,
                description: tool.description,
                parameters: tool.input_schema,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: serde_json::Value,
}

/// External tool executor (an MCP client in the host).
#[async_trait]
pub trait ToolClient: Send + Sync {
    async fn list_tools(&self) -> AppResult<Vec<McpTool>>;

    async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> AppResult<ToolCallResult>;
}

/// Function schemas for every tool the client offers. Discovery failures
/// leave the turn without tools rather than failing it.
pub async fn discover_tool_schemas(client: &dyn ToolClient) -> Vec<ToolSchema> {
    match client.list_tools().await {
        Ok(tools) => {
            log::debug!("[Tools] Discovered {} tools", tools.len());
            tools.into_iter().map(ToolSchema::from).collect()
        }
        Err(e) => {
            log::warn!("[Tools] Tool discovery failed, continuing without tools: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    struct FixedTools(AppResult<Vec<McpTool>>);

    #[async_trait]
    impl ToolClient for FixedTools {
        async fn list_tools(&self) -> AppResult<Vec<McpTool>> {
            match &self.0 {
                Ok(tools) => Ok(tools.clone()),
                Err(e) => Err(AppError::Tool(e.to_string())),
            }
        }

        async fn call_tool(&self, _name: &str, _arguments: serde_json::Value) -> AppResult<ToolCallResult> {
            Err(AppError::Tool("unused".into()))
        }
    }

    #[tokio::test]
    async fn test_discovery_converts_to_function_schemas() {
        let tool: McpTool = serde_json::from_value(serde_json::json!({
            "name": "query_prometheus",
            "description": "Run PromQL",
            "inputSchema": {"type": "object", "properties": {"expr": {"type": "string"}}}
        }))
        .unwrap();
        let schemas = discover_tool_schemas(&FixedTools(Ok(vec![tool]))).await;
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].kind, "function");
        assert_eq!(schemas[0].function.name, "query_prometheus");
        assert_eq!(schemas[0].function.parameters["type"], "object");
    }

    #[tokio::test]
    async fn test_discovery_failure_yields_no_tools() {
        let client = FixedTools(Err(AppError::Tool("offline".into())));
        assert!(discover_tool_schemas(&client).await.is_empty());
    }
}
