//! The `getUpdates` long-polling loop.

use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use courier_framework::{ApiParams, ApiResult, BoxedBot, Update};

use crate::config::CourierConfig;

/// Timing of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// How long the server may hold each request open.
    pub long_poll_timeout: Duration,
    /// Wait after a request that never got an answer.
    pub transport_error_delay: Duration,
    /// Wait after the API answered with an error or an unreadable batch.
    pub api_error_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_config(&CourierConfig::default())
    }
}

impl PollSettings {
    pub fn from_config(config: &CourierConfig) -> Self {
        Self {
            long_poll_timeout: config.bot.long_poll_timeout(),
            transport_error_delay: config.retry.transport_error_delay(),
            api_error_delay: config.retry.api_error_delay(),
        }
    }
}

/// Fetches updates in order, acknowledging each batch through the offset.
pub struct Poller {
    bot: BoxedBot,
    settings: PollSettings,
    last_update_id: i64,
}

impl Poller {
    pub fn new(bot: BoxedBot, settings: PollSettings) -> Self {
        Self {
            bot,
            settings,
            last_update_id: 0,
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Id of the newest update handed out so far, 0 before the first batch.
    pub fn last_update_id(&self) -> i64 {
        self.last_update_id
    }

    /// The `offset` sent with the next request.
    pub fn next_offset(&self) -> i64 {
        self.last_update_id + 1
    }

    /// Performs one `getUpdates` call.
    ///
    /// On success the offset moves past the last update in the batch, even
    /// when some of its updates fail to decode. Those are logged and skipped.
    pub async fn poll_once(&mut self) -> ApiResult<Vec<Update>> {
        let mut params = ApiParams::new();
        params.insert(
            "timeout".into(),
            Value::from(self.settings.long_poll_timeout.as_secs()),
        );
        params.insert("offset".into(), Value::from(self.next_offset()));

        let result = self.bot.call_api("getUpdates", params).await?;
        let batch: Vec<Value> = serde_json::from_value(result)?;
        if batch.is_empty() {
            trace!("Long poll returned no updates");
            return Ok(Vec::new());
        }

        let received = batch.len();
        let mut updates = Vec::with_capacity(received);
        for raw in batch {
            if let Some(id) = raw.get("update_id").and_then(Value::as_i64) {
                self.last_update_id = self.last_update_id.max(id);
            }
            match serde_json::from_value::<Update>(raw) {
                Ok(update) => updates.push(update),
                Err(e) => warn!(
                    error = %e,
                    last_update_id = self.last_update_id,
                    "Skipping update that failed to decode"
                ),
            }
        }

        debug!(
            received,
            decoded = updates.len(),
            last_update_id = self.last_update_id,
            "Received updates"
        );
        Ok(updates)
    }

    /// Polls until `cancel` fires, handing every update to `on_update` in order.
    ///
    /// Failures are logged and retried after the matching delay.
    pub async fn run<F>(&mut self, cancel: &CancellationToken, mut on_update: F)
    where
        F: FnMut(Update),
    {
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.poll_once() => result,
            };

            let delay = match result {
                Ok(updates) => {
                    updates.into_iter().for_each(&mut on_update);
                    continue;
                }
                Err(e) if e.is_transport() => {
                    warn!(error = %e, "Polling request failed");
                    self.settings.transport_error_delay
                }
                Err(e) => {
                    warn!(error = %e, "Polling rejected by the API");
                    self.settings.api_error_delay
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        debug!(last_update_id = self.last_update_id, "Polling stopped");
    }
}
