use crate::error::{AppError, AppResult};
use crate::models::prompt::{PreConfiguredPrompts, SaveUserPromptRequest, UserPrompt};
use crate::models::session::PinToggle;
use crate::state::AppState;

pub async fn get_pre_configured_prompts(state: &AppState) -> AppResult<PreConfiguredPrompts> {
    Ok(state.prompts.get_pre_configured_prompts())
}

/// User prompts, pinned first then newest first.
pub async fn list_user_prompts(state: &AppState) -> AppResult<Vec<UserPrompt>> {
    let prompts = state.prompts.clone();
    tokio::task::spawn_blocking(move || prompts.get_user_prompts_sorted())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn list_pinned_prompts(state: &AppState) -> AppResult<Vec<UserPrompt>> {
    let prompts = state.prompts.clone();
    tokio::task::spawn_blocking(move || prompts.get_pinned_prompts())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn get_prompt_categories(state: &AppState) -> AppResult<Vec<String>> {
    let prompts = state.prompts.clone();
    tokio::task::spawn_blocking(move || prompts.get_categories())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn save_user_prompt(state: &AppState, request: SaveUserPromptRequest) -> AppResult<UserPrompt> {
    if request.title.trim().is_empty() || request.content.trim().is_empty() {
        return Err(AppError::InvalidRequest("Prompt title and content are required".into()));
    }
    let prompts = state.prompts.clone();
    tokio::task::spawn_blocking(move || prompts.save_user_prompt(request))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn delete_user_prompt(state: &AppState, id: String) -> AppResult<()> {
    let prompts = state.prompts.clone();
    tokio::task::spawn_blocking(move || prompts.delete_user_prompt(&id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn toggle_prompt_pin(state: &AppState, id: String) -> AppResult<PinToggle> {
    let prompts = state.prompts.clone();
    tokio::task::spawn_blocking(move || prompts.toggle_pin(&id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn list_pinned_pre_configured_prompts(state: &AppState) -> AppResult<Vec<String>> {
    let prompts = state.prompts.clone();
    tokio::task::spawn_blocking(move || prompts.get_pinned_pre_configured_prompts())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn toggle_pre_configured_pin(state: &AppState, content: String) -> AppResult<PinToggle> {
    let prompts = state.prompts.clone();
    tokio::task::spawn_blocking(move || prompts.toggle_pre_configured_pin(&content))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn is_pre_configured_prompt_pinned(state: &AppState, content: String) -> AppResult<bool> {
    let prompts = state.prompts.clone();
    tokio::task::spawn_blocking(move || prompts.is_pre_configured_prompt_pinned(&content))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}
