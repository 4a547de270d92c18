//! Transport error types.

use thiserror::Error;

/// Errors that can occur while talking to the API over HTTP.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status and a body that is not JSON.
    #[error("HTTP {status} error: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, as text.
        body: String,
    },

    /// The response body is not valid JSON.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The client configuration is unusable.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
