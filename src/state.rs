use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::chat::context::ContextProvider;
use crate::db::kv_store::KeyValueStore;
use crate::db::prompt_repo::PromptLibrary;
use crate::db::session_repo::SessionStore;
use crate::db::settings_repo;
use crate::llm::backend::ChatBackend;
use crate::models::prompt::CategoryDef;
use crate::models::settings::ChatSettings;
use crate::tools::client::ToolClient;

/// A turn that is still running for some session.
#[derive(Clone)]
pub struct ActiveTurn {
    pub turn_id: String,
    pub cancel: CancellationToken,
    /// Fired once the turn has committed its transcript, or given up.
    pub done: CancellationToken,
}

impl ActiveTurn {
    fn new() -> Self {
        Self {
            turn_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
        }
    }

    /// Wait until the turn has stopped writing to its session.
    pub async fn finished(&self) {
        self.done.cancelled().await
    }
}

pub struct AppState {
    /// Backing key-value store shared by every repository
    pub kv: Arc<dyn KeyValueStore>,
    pub sessions: SessionStore,
    pub prompts: PromptLibrary,
    pub backend: Arc<dyn ChatBackend>,
    /// MCP tool executor, when the host has one
    pub tool_client: Option<Arc<dyn ToolClient>>,
    pub context_provider: Option<Arc<dyn ContextProvider>>,
    /// Live turns keyed by session ID
    pub active_turns: Arc<Mutex<HashMap<String, ActiveTurn>>>,
}

impl AppState {
    pub fn new(kv: Arc<dyn KeyValueStore>, backend: Arc<dyn ChatBackend>) -> Self {
        let settings = settings_repo::get_settings(kv.as_ref());
        Self {
            sessions: SessionStore::new(kv.clone()).with_pin_limit(settings.pin_limit),
            prompts: PromptLibrary::new(kv.clone(), None).with_pin_limit(settings.pin_limit),
            kv,
            backend,
            tool_client: None,
            context_provider: None,
            active_turns: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_tool_client(mut self, client: Arc<dyn ToolClient>) -> Self {
        self.tool_client = Some(client);
        self
    }

    pub fn with_context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context_provider = Some(provider);
        self
    }

    pub fn with_prompt_catalog(mut self, catalog: Vec<CategoryDef>) -> Self {
        let pin_limit = self.settings().pin_limit;
        self.prompts = PromptLibrary::new(self.kv.clone(), Some(catalog)).with_pin_limit(pin_limit);
        self
    }

    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn settings(&self) -> ChatSettings {
        settings_repo::get_settings(self.kv.as_ref())
    }

    /// Register a new turn for `session_id`, cancelling whichever turn was
    /// live there before. The superseded turn is returned so the caller can
    /// wait for its commit before reading the session.
    pub async fn begin_turn(&self, session_id: &str) -> (ActiveTurn, Option<ActiveTurn>) {
        let turn = ActiveTurn::new();
        let mut turns = self.active_turns.lock().await;
        let previous = turns.insert(session_id.to_string(), turn.clone());
        if let Some(previous) = &previous {
            log::info!("[Chat] Cancelling superseded turn {} for session {}", previous.turn_id, session_id);
            previous.cancel.cancel();
        }
        (turn, previous)
    }

    /// Drop the registration, unless a newer turn has already replaced it.
    pub async fn finish_turn(&self, session_id: &str, turn_id: &str) {
        let mut turns = self.active_turns.lock().await;
        if turns.get(session_id).is_some_and(|t| t.turn_id == turn_id) {
            turns.remove(session_id);
        }
    }

    /// Cancel the live turn for `session_id` and return it, if there was one.
    pub async fn cancel_turn(&self, session_id: &str) -> Option<ActiveTurn> {
        let turns = self.active_turns.lock().await;
        let turn = turns.get(session_id)?;
        turn.cancel.cancel();
        Some(turn.clone())
    }
}

// Implement Clone manually to allow state sharing in spawned tasks
impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            sessions: self.sessions.clone(),
            prompts: self.prompts.clone(),
            backend: Arc::clone(&self.backend),
            tool_client: self.tool_client.clone(),
            context_provider: self.context_provider.clone(),
            active_turns: Arc::clone(&self.active_turns),
        }
    }
}
