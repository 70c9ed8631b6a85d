//! Error types for the registry client

use thiserror::Error;

/// Errors talking to the registry.
///
/// Callers treat every variant as "registry unreachable"; the variants only
/// sharpen the notice printed to the operator.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport or decoding failure
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Invalid registry URL
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Registry answered with a non-success status
    #[error("registry error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Http(e)
        }
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
