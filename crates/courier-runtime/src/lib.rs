//! Courier Runtime: everything needed to run a bot against the HTTP API.
//!
//! This crate provides:
//! - Layered configuration (`courier.toml`, `COURIER_*` variables)
//! - Logging setup driven by that configuration
//! - [`HttpBot`], the [`Bot`](courier_framework::Bot) implementation over HTTP
//! - [`Poller`], the `getUpdates` long-polling loop
//! - [`CourierRuntime`], which ties them to a
//!   [`Dispatcher`](courier_framework::Dispatcher)
//!
//! ```rust,ignore
//! use courier_runtime::CourierRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = CourierRuntime::builder().build()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod error;
pub mod logging;
pub mod poller;
pub mod runtime;

pub use bot::{HttpBot, REQUEST_TIMEOUT_MARGIN};
pub use config::{
    BotConfig, ConfigError, ConfigLoader, ConfigResult, CourierConfig, LoggingConfig, RetryConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use poller::{PollSettings, Poller};
pub use runtime::{CourierRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
