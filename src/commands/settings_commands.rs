use crate::db::settings_repo;
use crate::error::{AppError, AppResult};
use crate::models::settings::ChatSettings;
use crate::state::AppState;

pub async fn get_settings(state: &AppState) -> AppResult<ChatSettings> {
    let kv = state.kv.clone();
    tokio::task::spawn_blocking(move || settings_repo::get_settings(kv.as_ref()))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Persist settings. Backend and pin-limit changes take effect on next start.
pub async fn update_settings(state: &AppState, settings: ChatSettings) -> AppResult<()> {
    if settings.max_tool_iterations == 0 {
        return Err(AppError::InvalidRequest("maxToolIterations must be at least 1".into()));
    }
    let kv = state.kv.clone();
    tokio::task::spawn_blocking(move || settings_repo::update_settings(kv.as_ref(), &settings))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}
