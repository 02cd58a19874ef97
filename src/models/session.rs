use serde::{Deserialize, Serialize};

use super::message::Message;

/// A stored conversation. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
}

impl ChatSession {
    pub fn pinned(&self) -> bool {
        self.is_pinned.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionListItem {
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub is_pinned: bool,
    pub updated_at: i64,
}

impl From<&ChatSession> for ChatSessionListItem {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            message_count: session.messages.len(),
            is_pinned: session.pinned(),
            updated_at: session.updated_at,
        }
    }
}

/// Result of a successful pin toggle on any pin-capped collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinToggle {
    Pinned,
    Unpinned,
}

impl PinToggle {
    pub fn is_pinned(self) -> bool {
        self == PinToggle::Pinned
    }
}
