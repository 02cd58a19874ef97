use crate::db::kv_store::{KeyValueStore, SETTINGS_KEY};
use crate::error::AppResult;
use crate::models::settings::ChatSettings;

pub const API_KEY_ENV: &str = "GRAFT_API_KEY";
pub const BASE_URL_ENV: &str = "GRAFT_BASE_URL";

/// Stored settings with environment overrides applied. Missing or unreadable
/// settings fall back to defaults.
pub fn get_settings(kv: &dyn KeyValueStore) -> ChatSettings {
    let mut settings = match kv.get(SETTINGS_KEY) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("Stored settings are invalid, using defaults: {}", e);
            ChatSettings::default()
        }),
        Ok(None) => ChatSettings::default(),
        Err(e) => {
            log::error!("Error loading settings: {}", e);
            ChatSettings::default()
        }
    };

    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.is_empty() {
            settings.api_key = key;
        }
    }
    if let Ok(url) = std::env::var(BASE_URL_ENV) {
        if !url.is_empty() {
            settings.base_url = url;
        }
    }

    settings
}

pub fn update_settings(kv: &dyn KeyValueStore, settings: &ChatSettings) -> AppResult<()> {
    let raw = serde_json::to_string(settings)?;
    kv.set(SETTINGS_KEY, &raw)
}
