use tokio::sync::mpsc::UnboundedSender;

use crate::chat::turn::{run_review_turn, run_turn, ChatEvent, ReviewRequest, TurnOutcome, TurnRequest};
use crate::error::AppResult;
use crate::state::AppState;

pub async fn send_prompt(
    state: &AppState,
    request: TurnRequest,
    events: Option<UnboundedSender<ChatEvent>>,
) -> AppResult<TurnOutcome> {
    log::info!(
        "send_prompt called: session_id={:?}, content_len={}, attachments={}",
        request.session_id,
        request.content.len(),
        request.attachments.len()
    );
    run_turn(state, request, events).await
}

/// Critique and rewrite a draft prompt in a new session.
pub async fn review_prompt(
    state: &AppState,
    request: ReviewRequest,
    events: Option<UnboundedSender<ChatEvent>>,
) -> AppResult<TurnOutcome> {
    log::info!(
        "review_prompt called: content_len={}, model={:?}",
        request.content.len(),
        request.model
    );
    run_review_turn(state, request, events).await
}

/// Cancel the live turn for a session. Returns whether one was running.
pub async fn cancel_prompt(state: &AppState, session_id: String) -> AppResult<bool> {
    let cancelled = state.cancel_turn(&session_id).await.is_some();
    if cancelled {
        log::info!("Cancelled prompt for session: {}", session_id);
    } else {
        log::debug!("No running prompt for session: {}", session_id);
    }
    Ok(cancelled)
}
