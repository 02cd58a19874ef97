pub mod backend;
pub mod http;
pub mod payload;
pub mod types;
