//! Configuration for the Courier runtime.
//!
//! Settings are layered with figment: built-in defaults, then config files,
//! then `COURIER_*` environment variables, then programmatic overrides.
//! See [`ConfigLoader`] for the search rules.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, CourierConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, RetryConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
