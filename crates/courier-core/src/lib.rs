//! # Courier Core
//!
//! The two engines behind the Courier bot client.
//!
//! - **Serial queue** ([`SerialQueue`]): runs cooperative actions one at a
//!   time. Each action resolves a [`Continuation`] to advance or halt the
//!   queue, and finalizers observe the [`StopReason`] exactly once.
//! - **Command matcher** ([`CommandSpec`], [`CommandMatcher`]): matches
//!   slash-style commands with typed parameter fragments, an optional bot
//!   name suffix and back-off over optional parameters.
//!
//! Neither engine knows about chat updates or HTTP; `courier-framework`
//! builds the dispatcher on top of them.
//!
//! ## Example
//!
//! ```rust
//! use courier_core::{CommandSpec, Flow, SerialQueue};
//!
//! let matcher = CommandSpec::new("ping").compile().unwrap();
//! let queue = SerialQueue::new();
//!
//! for text in ["/ping", "hello"] {
//!     let hit = matcher.is_match(text);
//!     queue.add(move |next| {
//!         next.resolve(if hit { Flow::Stop } else { Flow::Continue });
//!     });
//! }
//!
//! assert!(queue.is_stopped());
//! ```

pub mod command;
pub mod error;
pub mod queue;

pub use command::{
    CommandArgs, CommandMatch, CommandMatcher, CommandSpec, NamedArgs, NamedParam, Param,
    match_command, patterns,
};
pub use error::{CommandError, CommandResult};
pub use queue::{Action, Continuation, Finalizer, Flow, SerialQueue, StopReason};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::command::{CommandMatch, CommandSpec, NamedParam, patterns};
    pub use crate::queue::{Continuation, Flow, SerialQueue, StopReason};
}
