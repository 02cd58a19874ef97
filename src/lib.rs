pub mod chat;
pub mod commands;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod scheduler;
pub mod state;
pub mod tools;

use std::path::Path;
use std::sync::Arc;

use db::kv_store::SqliteKvStore;
use error::{AppError, AppResult};
use models::prompt::CategoryDef;
use llm::http::HttpChatBackend;
use state::AppState;

/// Install the process logger. Debug builds log at debug level, release
/// builds at info; `RUST_LOG` overrides either. Later calls are no-ops.
pub fn init_logging() {
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        // Also log in release mode but at info level
        log::LevelFilter::Info
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

/// Open the on-disk store and build the default state: the SQLite
/// key-value store under `~/.graft`, an HTTP backend from the stored
/// settings, and the prompt catalog from `~/.graft/prompts.json` when that
/// file exists. Tool client and context provider are attached by the host.
pub fn bootstrap() -> AppResult<AppState> {
    // Initialize the database
    let conn = db::migrations::init_db()?;
    let kv = Arc::new(SqliteKvStore::new(conn));

    let settings = db::settings_repo::get_settings(kv.as_ref());
    let backend = Arc::new(HttpChatBackend::from_settings(&settings)?);
    log::info!(
        "Chat engine ready: base_url={}, standard_model={}, thinking_model={}",
        settings.base_url,
        settings.standard_model,
        settings.thinking_model
    );

    let state = AppState::new(kv, backend);
    match load_prompt_catalog(&db::migrations::get_base_dir().join(PROMPT_CATALOG_FILE)) {
        Some(catalog) => Ok(state.with_prompt_catalog(catalog)),
        None => Ok(state),
    }
}

const PROMPT_CATALOG_FILE: &str = "prompts.json";

/// A custom catalog, or `None` to keep the built-in one. An unreadable or
/// invalid file is logged and ignored.
fn load_prompt_catalog(path: &Path) -> Option<Vec<CategoryDef>> {
    if !path.exists() {
        return None;
    }
    let loaded = std::fs::read_to_string(path)
        .map_err(AppError::from)
        .and_then(|raw| prompts::validation::parse_catalog(&raw));
    match loaded {
        Ok(catalog) => {
            log::info!("[Prompts] Loaded {} categories from {}", catalog.len(), path.display());
            Some(catalog)
        }
        Err(e) => {
            log::warn!("[Prompts] Ignoring prompt catalog {}: {}", path.display(), e);
            None
        }
    }
}
