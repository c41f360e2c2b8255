//! Bot error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    /// Transport-level HTTP failure.
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    /// The chat platform answered with an error.
    #[error("chat api: {0}")]
    Chat(String),

    /// The gateway answered with a non-success status.
    #[error("gateway {status}: {message}")]
    Gateway { status: u16, message: String },

    /// Malformed command or deep link.
    #[error("{0}")]
    BadCommand(String),

    #[error("config: {0}")]
    Config(String),
}
