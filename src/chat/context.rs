use async_trait::async_trait;

use crate::models::context::ChatContext;

/// Source of the user/dashboard/data-source facts for a turn.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn current_context(&self) -> ChatContext;
}

/// A provider that always answers with the same context.
pub struct StaticContext(pub ChatContext);

#[async_trait]
impl ContextProvider for StaticContext {
    async fn current_context(&self) -> ChatContext {
        self.0.clone()
    }
}

/// Formatted context for a turn; no provider means no context.
pub async fn resolve_context(provider: Option<&dyn ContextProvider>) -> String {
    match provider {
        Some(provider) => provider.current_context().await.format(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::context::DashboardContext;

    #[tokio::test]
    async fn test_resolve_context() {
        assert_eq!(resolve_context(None).await, "");

        let provider = StaticContext(ChatContext {
            dashboard: DashboardContext {
                uid: Some("abc".into()),
                title: Some("Overview".into()),
                ..Default::default()
            },
            ..Default::default()
        });
        let text = resolve_context(Some(&provider)).await;
        assert!(text.contains("-UID: abc"));
    }
}
