//! Command matching.
//!
//! A command is `trigger + command [@bot_name] params...` with the whole
//! input anchored at both ends. Build a [`CommandSpec`], compile it once into
//! a [`CommandMatcher`] and call [`CommandMatcher::find`] for every message.
//!
//! ```rust
//! use courier_core::command::{CommandSpec, patterns};
//!
//! let matcher = CommandSpec::new("echo")
//!     .named("text", patterns::REST)
//!     .compile()
//!     .unwrap();
//!
//! let found = matcher.find("/echo hello there").unwrap();
//! assert_eq!(found.get("text"), Some("hello there"));
//! assert!(matcher.find("/echoes").is_none());
//! ```

mod matcher;
pub mod patterns;
mod spec;

pub use matcher::{ALL_KEY, CommandArgs, CommandMatch, CommandMatcher, NamedArgs, match_command};
pub use spec::{CommandSpec, DEFAULT_TRIGGER, NamedParam, Param};
