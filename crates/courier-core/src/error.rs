//! Error types for the core engines.
//!
//! The queue has no failure modes of its own; every error here comes from
//! validating a command spec.

use thiserror::Error;

// =============================================================================
// Command Errors
// =============================================================================

/// Errors raised while compiling a [`CommandSpec`](crate::command::CommandSpec).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// A fragment is not a valid regular expression.
    #[error("invalid pattern for {target}: {reason}")]
    InvalidPattern {
        /// The fragment's owner, either `command` or a parameter.
        target: String,
        /// Reason reported by the regex compiler.
        reason: String,
    },

    /// A parameter fragment does not contain exactly one capture group.
    #[error("{target} must contain exactly one capture group, found {found}")]
    CaptureCount {
        /// The offending parameter.
        target: String,
        /// Number of capture groups found.
        found: usize,
    },

    /// Two named parameters share a name.
    #[error("duplicate parameter name '{0}'")]
    DuplicateName(String),

    /// A parameter uses a name the match result reserves for itself.
    #[error("parameter name '{0}' is reserved")]
    ReservedName(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for command compilation.
pub type CommandResult<T> = Result<T, CommandError>;
