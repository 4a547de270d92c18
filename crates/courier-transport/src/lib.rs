//! # Courier Transport
//!
//! The HTTP layer of the Courier bot client.
//!
//! ```text
//! ┌─────────────────────┐
//! │  courier-runtime    │  (HttpBot, poller)
//! ├─────────────────────┤
//! │  courier-transport  │  <- This crate (HttpApiClient)
//! ├─────────────────────┤
//! │  Network (HTTP)     │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier_transport::HttpApiClient;
//!
//! let client = HttpApiClient::new("https://api.telegram.org/bot123:abc")?;
//! let me = client.get("getMe", &[]).await?;
//! ```

pub mod error;
pub mod http_client;

pub use error::{TransportError, TransportResult};
pub use http_client::{DEFAULT_REQUEST_TIMEOUT, FormFields, HttpApiClient};
