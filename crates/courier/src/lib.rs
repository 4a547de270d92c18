//! # Courier
//!
//! A long-polling chat bot client built around two small engines: a serial
//! task queue and a command matcher.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  updates  ┌─────────────┐  one update  ┌────────────────────────────┐
//! │  Poller  │──────────▶│ outer queue │─────────────▶│ Dispatcher                 │
//! │ (getUpd.)│           │ (in order)  │              │  per-update serial queue:  │
//! └──────────┘           └─────────────┘              │  update → text → ... → end │
//!                                                     └────────────────────────────┘
//! ```
//!
//! - **Core** (`courier-core`): `SerialQueue` and `CommandSpec`/`CommandMatcher`
//! - **Framework** (`courier-framework`): update model, event kinds, dispatcher,
//!   handlers and the `Bot` API surface
//! - **Transport** (`courier-transport`): the HTTP client
//! - **Runtime** (`courier-runtime`): configuration, logging, `HttpBot`, polling
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = CourierRuntime::builder().build()?;
//!
//!     runtime
//!         .on_command(
//!             CommandSpec::new("echo").named("text", patterns::REST),
//!             |ctx: HandlerContext| async move {
//!                 let text = ctx.arg("text").unwrap_or_default().to_string();
//!                 ctx.reply(&text).await.map(|_| Flow::Stop)
//!             },
//!         )
//!         .await?;
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: read `courier.toml`
//! - `yaml-config`: read `courier.yaml`
//! - `json-log`: allow `logging.format = "json"`

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;
pub use courier_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use courier_runtime::{CourierConfig, CourierRuntime, HttpBot};

    // Handlers and dispatch
    pub use courier_framework::{
        Dispatcher, EventKind, Flow, HandlerContext, StopReason, Update,
    };

    // Commands
    pub use courier_core::command::{CommandMatch, CommandSpec, NamedParam, patterns};

    // Talking back to the API
    pub use courier_framework::{ApiError, ApiParams, Bot, BotExt, ChatId};
}
