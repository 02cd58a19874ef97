use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_standard_model")]
    pub standard_model: String,
    #[serde(default = "default_thinking_model")]
    pub thinking_model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_pin_limit")]
    pub pin_limit: usize,
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000/api/plugins/grafana-llm-app/resources/openai/v1".into()
}
fn default_standard_model() -> String {
    "base".into()
}
fn default_thinking_model() -> String {
    "large".into()
}
fn default_request_timeout_secs() -> u64 {
    300
}
fn default_max_history() -> usize {
    50
}
fn default_retention_days() -> u32 {
    30
}
fn default_pin_limit() -> usize {
    20
}
fn default_max_tool_iterations() -> usize {
    5
}
fn default_cleanup_interval_secs() -> u64 {
    3600
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            standard_model: default_standard_model(),
            thinking_model: default_thinking_model(),
            request_timeout_secs: default_request_timeout_secs(),
            max_history: default_max_history(),
            retention_days: default_retention_days(),
            pin_limit: default_pin_limit(),
            max_tool_iterations: default_max_tool_iterations(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let s: ChatSettings = serde_json::from_str(r#"{"apiKey":"k","maxHistory":10}"#).unwrap();
        assert_eq!(s.api_key, "k");
        assert_eq!(s.max_history, 10);
        assert_eq!(s.pin_limit, 20);
        assert_eq!(s.max_tool_iterations, 5);
        assert_eq!(s.retention_days, 30);
    }
}
