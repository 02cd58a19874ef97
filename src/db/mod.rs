pub mod clock;
pub mod kv_store;
pub mod migrations;
pub mod prompt_repo;
pub mod session_repo;
pub mod settings_repo;
