//! Error types for the Graph transport.

use thiserror::Error;

/// Result type alias using `GraphError`.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur configuring or authenticating the transport.
///
/// Request-level failures do not appear here: they flow through the engine's
/// transport contract as responses or network failures and are classified
/// there.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// OAuth2 authentication error.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}
