use crate::error::{AppError, AppResult};
use crate::models::message::Message;
use crate::models::session::{ChatSession, ChatSessionListItem, PinToggle};
use crate::state::AppState;

pub async fn list_sessions(state: &AppState) -> AppResult<Vec<ChatSessionListItem>> {
    let sessions = state.sessions.clone();
    tokio::task::spawn_blocking(move || {
        sessions
            .get_all_sessions()
            .iter()
            .map(ChatSessionListItem::from)
            .collect()
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn load_session(state: &AppState, id: String) -> AppResult<ChatSession> {
    let sessions = state.sessions.clone();
    tokio::task::spawn_blocking(move || {
        sessions
            .get_session(&id)
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn save_session(
    state: &AppState,
    messages: Vec<Message>,
    session_id: Option<String>,
) -> AppResult<ChatSession> {
    let sessions = state.sessions.clone();
    tokio::task::spawn_blocking(move || sessions.save_session(messages, session_id.as_deref()))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn toggle_pin_session(state: &AppState, id: String) -> AppResult<PinToggle> {
    let sessions = state.sessions.clone();
    tokio::task::spawn_blocking(move || sessions.toggle_pin_session(&id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn delete_session(state: &AppState, id: String) -> AppResult<()> {
    // A cancelled turn still commits on its way out, so let it finish first
    if let Some(turn) = state.cancel_turn(&id).await {
        turn.finished().await;
    }
    let sessions = state.sessions.clone();
    tokio::task::spawn_blocking(move || sessions.delete_session(&id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn delete_message(state: &AppState, session_id: String, index: usize) -> AppResult<ChatSession> {
    let sessions = state.sessions.clone();
    tokio::task::spawn_blocking(move || sessions.delete_message(&session_id, index))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Evict with the configured history size and retention window.
pub async fn cleanup_sessions(state: &AppState) -> AppResult<()> {
    let settings = state.settings();
    let sessions = state.sessions.clone();
    tokio::task::spawn_blocking(move || {
        sessions.cleanup_old_sessions(settings.max_history, settings.retention_days)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn clear_history(state: &AppState) -> AppResult<()> {
    let sessions = state.sessions.clone();
    tokio::task::spawn_blocking(move || sessions.clear_all())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}
