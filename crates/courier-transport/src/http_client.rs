//! HTTP API client.
//!
//! Every API method lives at `{base_url}/{method}`. Requests go out either as
//! a GET with query parameters or as a POST with a urlencoded form; both
//! return the parsed JSON body.
//!
//! A non-success status whose body is still JSON is returned as `Ok`: bot
//! APIs report errors through an `{ok: false, ...}` envelope with a 4xx
//! status, and decoding that envelope is the caller's job.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, Response};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{TransportError, TransportResult};

/// A key-value list sent as query string or form body.
pub type FormFields = [(String, String)];

/// Timeout applied when none is given.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(70);

/// A JSON-over-HTTP client bound to one API base URL.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: String,
}

impl HttpApiClient {
    /// Creates a client for `base_url` with the default request timeout.
    pub fn new(base_url: impl Into<String>) -> TransportResult<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client for `base_url`.
    ///
    /// `timeout` bounds each request from connect to the last body byte, so
    /// it must be longer than any long-poll timeout sent to the server.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> TransportResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(TransportError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{base_url}'"
            )));
        }

        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// Returns the base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the full URL of `method`.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Calls `method` with a GET request carrying `query`.
    pub async fn get(&self, method: &str, query: &FormFields) -> TransportResult<Value> {
        trace!(method, fields = query.len(), "GET");
        let response = self
            .client
            .get(self.method_url(method))
            .query(query)
            .send()
            .await?;
        Self::read_json(method, response).await
    }

    /// Calls `method` with a POST request carrying `form` as a urlencoded body.
    pub async fn post_form(&self, method: &str, form: &FormFields) -> TransportResult<Value> {
        trace!(method, fields = form.len(), "POST");
        let response = self
            .client
            .post(self.method_url(method))
            .form(form)
            .send()
            .await?;
        Self::read_json(method, response).await
    }

    async fn read_json(method: &str, response: Response) -> TransportResult<Value> {
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<Value>(&body) {
            Ok(value) => {
                if !status.is_success() {
                    debug!(method, status = status.as_u16(), "API answered with error status");
                }
                Ok(value)
            }
            Err(_) if !status.is_success() => Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }),
            Err(e) => Err(TransportError::Decode(e.to_string())),
        }
    }
}
