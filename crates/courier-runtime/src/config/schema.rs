//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Placeholder replaced by the bot token in URL templates.
pub const TOKEN_PLACEHOLDER: &str = "{token}";

/// Root configuration structure.
///
/// ```toml
/// [bot]
/// token = "123456:ABC-DEF"
/// long_poll_timeout_secs = 60
///
/// [retry]
/// transport_error_delay_ms = 5000
///
/// [logging]
/// level = "debug"
/// filters = { courier_transport = "trace" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CourierConfig {
    /// Bot account and polling settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Delays applied when polling fails.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// Bot account and polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// API token issued for the bot. Required.
    #[serde(default)]
    pub token: String,

    /// API base URL template; `{token}` is replaced by the token.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// File download URL template; `{token}` is replaced by the token.
    #[serde(default = "default_file_url")]
    pub file_url: String,

    /// Seconds the server may hold a `getUpdates` call open. 0 means short polling.
    #[serde(default = "default_long_poll_timeout")]
    pub long_poll_timeout_secs: u64,

    /// Seconds an update's handlers may take in total. 0 disables the limit.
    #[serde(default = "default_listener_timeout")]
    pub listener_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: default_api_url(),
            file_url: default_file_url(),
            long_poll_timeout_secs: default_long_poll_timeout(),
            listener_timeout_secs: default_listener_timeout(),
        }
    }
}

impl BotConfig {
    /// Returns the API base URL with the token filled in.
    pub fn api_base_url(&self) -> String {
        self.api_url.replace(TOKEN_PLACEHOLDER, &self.token)
    }

    /// Returns the file base URL with the token filled in.
    pub fn file_base_url(&self) -> String {
        self.file_url.replace(TOKEN_PLACEHOLDER, &self.token)
    }

    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.long_poll_timeout_secs)
    }

    pub fn listener_timeout(&self) -> Duration {
        Duration::from_secs(self.listener_timeout_secs)
    }
}

fn default_api_url() -> String {
    "https://api.telegram.org/bot{token}".to_string()
}

fn default_file_url() -> String {
    "https://api.telegram.org/file/bot{token}".to_string()
}

fn default_long_poll_timeout() -> u64 {
    60
}

fn default_listener_timeout() -> u64 {
    10
}

// =============================================================================
// Retry
// =============================================================================

/// Delays before polling again after a failed `getUpdates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay after the request itself failed, in milliseconds.
    #[serde(default = "default_transport_error_delay_ms")]
    pub transport_error_delay_ms: u64,

    /// Delay after the API answered with an error, in milliseconds.
    #[serde(default = "default_api_error_delay_ms")]
    pub api_error_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            transport_error_delay_ms: default_transport_error_delay_ms(),
            api_error_delay_ms: default_api_error_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn transport_error_delay(&self) -> Duration {
        Duration::from_millis(self.transport_error_delay_ms)
    }

    pub fn api_error_delay(&self) -> Duration {
        Duration::from_millis(self.api_error_delay_ms)
    }
}

fn default_transport_error_delay_ms() -> u64 {
    5000
}

fn default_api_error_delay_ms() -> u64 {
    1000
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Newline-delimited JSON. Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// The file at [`LoggingConfig::file_path`].
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level for every target without a filter.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file used when `output` is `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Per-target levels, e.g. `courier_transport = "trace"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids in each line.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line in each line.
    #[serde(default)]
    pub file_location: bool,
}
