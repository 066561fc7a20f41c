// askpg - ask a PostgreSQL database questions in plain language

pub mod agents;
pub mod config;
pub mod db;
pub mod llm;
pub mod types;

// Re-exports for convenience
pub use agents::QueryAgent;
pub use config::Config;
pub use types::{AppError, AppResult};
