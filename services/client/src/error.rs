//! services/client/src/error.rs
//!
//! Errors that stop the client before or while the terminal session runs.
//! Failures of a single request never reach this type; the controller turns
//! those into view messages.

use crate::config::ConfigError;
use open_blinkist_core::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A required environment variable is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// The analysis store URL could not be turned into a connection pool.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Reading commands from stdin or writing the view to stdout failed.
    #[error("Terminal IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Startup failed: {0}")]
    Internal(String),
}
