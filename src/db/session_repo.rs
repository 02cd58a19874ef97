use std::sync::Arc;

use crate::db::clock::{Clock, SystemClock, DAY_MILLIS};
use crate::db::kv_store::{load_json_list, store_json_list, KeyValueStore, WriteLock, CHAT_HISTORY_KEY};
use crate::error::{AppError, AppResult};
use crate::models::message::{Message, Role};
use crate::models::session::{ChatSession, PinToggle};

pub const DEFAULT_MAX_HISTORY: usize = 50;
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
pub const MAX_PINNED_SESSIONS: usize = 20;

const TITLE_MAX_CHARS: usize = 50;
const TITLE_TRUNCATED_CHARS: usize = 47;

/// Durable, capacity-bounded conversation history.
///
/// Every mutation is a whole-collection read-modify-write against a single
/// key, serialized by a lock shared across clones. Storage failures never escape: reads degrade to an empty history and
/// writes are dropped after logging.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    pin_limit: usize,
    writes: WriteLock,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(kv, Arc::new(SystemClock))
    }

    pub fn with_clock(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            clock,
            pin_limit: MAX_PINNED_SESSIONS,
            writes: WriteLock::default(),
        }
    }

    pub fn with_pin_limit(mut self, pin_limit: usize) -> Self {
        self.pin_limit = pin_limit;
        self
    }

    fn load(&self) -> Vec<ChatSession> {
        load_json_list(self.kv.as_ref(), CHAT_HISTORY_KEY, "chat history")
    }

    fn store(&self, sessions: &[ChatSession]) {
        store_json_list(self.kv.as_ref(), CHAT_HISTORY_KEY, sessions, "chat history");
    }

    pub fn generate_id(&self) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("chat_{}_{}", self.clock.now_millis(), &suffix[..7])
    }

    /// Sessions ordered pinned-first, then most recently updated first.
    pub fn get_all_sessions(&self) -> Vec<ChatSession> {
        let mut sessions = self.load();
        sessions.sort_by(|a, b| {
            b.pinned()
                .cmp(&a.pinned())
                .then_with(|| b.updated_at.cmp(&a.updated_at))
        });
        sessions
    }

    pub fn get_session(&self, id: &str) -> Option<ChatSession> {
        self.load().into_iter().find(|s| s.id == id)
    }

    /// Upsert a transcript. The stored messages are replaced wholesale.
    pub fn save_session(&self, messages: Vec<Message>, session_id: Option<&str>) -> ChatSession {
        let _guard = self.writes.acquire();
        let mut sessions = self.load();
        let session = self.upsert(&mut sessions, messages, session_id);
        self.store(&sessions);
        log::debug!(
            "[SessionStore] Saved session {} ({} messages)",
            session.id,
            session.messages.len()
        );
        session
    }

    fn upsert(
        &self,
        sessions: &mut Vec<ChatSession>,
        messages: Vec<Message>,
        session_id: Option<&str>,
    ) -> ChatSession {
        let now = self.clock.now_millis();
        let title = generate_title(&messages);

        let existing = session_id.and_then(|id| sessions.iter_mut().find(|s| s.id == id));
        match existing {
            Some(existing) => {
                existing.messages = messages;
                existing.title = title;
                existing.updated_at = now.max(existing.created_at);
                existing.clone()
            }
            None => {
                let id = match session_id {
                    Some(id) => id.to_string(),
                    None => self.generate_id(),
                };
                let session = ChatSession {
                    id,
                    title,
                    messages,
                    created_at: now,
                    updated_at: now,
                    is_pinned: None,
                };
                sessions.push(session.clone());
                session
            }
        }
    }

    /// Flip the pin flag. Pinning past the cap fails without touching state;
    /// unpinning always succeeds.
    pub fn toggle_pin_session(&self, id: &str) -> AppResult<PinToggle> {
        let _guard = self.writes.acquire();
        let mut sessions = self.load();
        let pinned_count = sessions.iter().filter(|s| s.pinned()).count();

        let session = sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;

        let toggle = if session.pinned() {
            session.is_pinned = Some(false);
            PinToggle::Unpinned
        } else {
            if pinned_count >= self.pin_limit {
                log::info!("[SessionStore] Pin limit reached, not pinning {}", id);
                return Err(AppError::PinLimitReached { limit: self.pin_limit });
            }
            session.is_pinned = Some(true);
            PinToggle::Pinned
        };

        self.store(&sessions);
        Ok(toggle)
    }

    pub fn delete_session(&self, id: &str) {
        let _guard = self.writes.acquire();
        let mut sessions = self.load();
        sessions.retain(|s| s.id != id);
        self.store(&sessions);
    }

    /// Remove one message from a stored transcript and re-save it.
    pub fn delete_message(&self, session_id: &str, index: usize) -> AppResult<ChatSession> {
        let _guard = self.writes.acquire();
        let mut sessions = self.load();
        let session = sessions
            .iter()
            .find(|s| s.id == session_id)
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))?;
        if index >= session.messages.len() {
            return Err(AppError::InvalidRequest(format!(
                "Message index {index} out of range ({} messages)",
                session.messages.len()
            )));
        }
        let mut messages = session.messages.clone();
        messages.remove(index);
        let session = self.upsert(&mut sessions, messages, Some(session_id));
        self.store(&sessions);
        Ok(session)
    }

    /// Two-phase eviction: drop unpinned sessions created before the
    /// retention window, then keep only the most recently updated unpinned
    /// sessions that fit next to the pinned ones under `max_history`.
    pub fn cleanup_old_sessions(&self, max_history: usize, retention_days: u32) {
        let _guard = self.writes.acquire();
        let sessions = self.load();
        let before = sessions.len();
        let cutoff = self.clock.now_millis() - i64::from(retention_days) * DAY_MILLIS;

        let (pinned, mut unpinned): (Vec<ChatSession>, Vec<ChatSession>) = sessions
            .into_iter()
            .filter(|s| s.pinned() || s.created_at > cutoff)
            .partition(|s| s.pinned());

        if pinned.len() + unpinned.len() > max_history {
            let available = max_history.saturating_sub(pinned.len());
            unpinned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            unpinned.truncate(available);
        }

        let kept: Vec<ChatSession> = pinned.into_iter().chain(unpinned).collect();
        if kept.len() != before {
            log::info!(
                "[SessionStore] Cleanup evicted {} sessions ({} kept)",
                before - kept.len(),
                kept.len()
            );
        }
        self.store(&kept);
    }

    pub fn clear_all(&self) {
        let _guard = self.writes.acquire();
        if let Err(e) = self.kv.remove(CHAT_HISTORY_KEY) {
            log::error!("Error clearing chat history: {}", e);
        }
    }
}

/// Title from the first user message, capped at 50 characters.
pub fn generate_title(messages: &[Message]) -> String {
    match messages.iter().find(|m| m.role == Role::User) {
        Some(first) => {
            let content = first.content.trim();
            if content.chars().count() > TITLE_MAX_CHARS {
                let head: String = content.chars().take(TITLE_TRUNCATED_CHARS).collect();
                format!("{head}...")
            } else {
                content.to_string()
            }
        }
        None => "New Chat".into(),
    }
}
