//! # Courier Framework
//!
//! The layer between the core engines and the network:
//!
//! - [`model`]: update payloads
//! - [`EventKind`]: the kinds of event handlers subscribe to, and how an
//!   update is classified into them
//! - [`Dispatcher`]: per-update serial queues over an ordered registration table
//! - [`Handler`] and [`HandlerContext`]: what handlers are and what they see
//! - [`on_command`]: handlers gated by a [`CommandSpec`](courier_core::CommandSpec)
//! - [`Bot`] and [`BotExt`]: the API surface handlers call back into
//!
//! Nothing here performs I/O by itself; `courier-runtime` provides the HTTP
//! bot and the polling loop.

pub mod bot;
pub mod command;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;
pub mod model;

pub use bot::{ApiParams, Bot, BotExt, BoxedBot, ChatId};
pub use command::on_command;
pub use context::HandlerContext;
pub use dispatcher::{DEFAULT_LISTENER_TIMEOUT, Dispatcher};
pub use error::{ApiError, ApiResult, DispatchError, DispatchResult};
pub use event::EventKind;
pub use handler::{BoxFuture, BoxedHandler, Handler, IntoFlow, into_handler};
pub use model::{Chat, File, Message, Update, User};

pub use courier_core::{CommandMatch, CommandSpec, Flow, StopReason};
