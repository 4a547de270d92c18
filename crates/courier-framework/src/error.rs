//! Error types for the framework layer.

use thiserror::Error;

use courier_core::CommandError;

/// Errors returned by bot API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The API answered with `ok: false`.
    #[error("API error ({}): {description}", fmt_code(.code))]
    Api {
        /// The `error_code` field, if present.
        code: Option<i64>,
        /// The `description` field.
        description: String,
    },

    /// The request never produced a response body.
    #[error("transport error: {0}")]
    Transport(String),

    /// The handler's update carries no message to reply to.
    #[error("update has no message to reply to")]
    NoMessage,

    /// The response did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Creates an API error from an `ok: false` envelope.
    pub fn api(code: Option<i64>, description: impl Into<String>) -> Self {
        Self::Api {
            code,
            description: description.into(),
        }
    }

    /// Returns `true` if the request failed before reaching the API.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

fn fmt_code(code: &Option<i64>) -> String {
    code.map_or_else(|| "?".to_string(), |c| c.to_string())
}

/// Errors raised while configuring a dispatcher.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// A command spec failed to compile.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// An event tag does not name a known kind.
    #[error("unknown event kind '{0}'")]
    UnknownEventKind(String),
}

/// Result type for bot API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for dispatcher configuration.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            ApiError::api(Some(400), "Bad Request: chat not found").to_string(),
            "API error (400): Bad Request: chat not found"
        );
        assert_eq!(ApiError::api(None, "nope").to_string(), "API error (?): nope");
    }

    #[test]
    fn test_decode_from_serde() {
        let err = serde_json::from_str::<i64>("\"x\"").unwrap_err();
        assert!(matches!(ApiError::from(err), ApiError::Decode(_)));
    }
}
