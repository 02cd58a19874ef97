pub mod context;
pub mod message;
pub mod prompt;
pub mod session;
pub mod settings;
