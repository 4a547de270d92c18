//! Runtime orchestration.
//!
//! [`CourierRuntime::run`] walks the bot's whole lifecycle:
//!
//! 1. `getMe`, which also fixes the username used by command handlers
//! 2. every `ready` handler, once
//! 3. long polling, with each update dispatched through an outer serial
//!    queue so updates are handled one at a time and in order
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use courier_runtime::CourierRuntime;
//!
//! let runtime = CourierRuntime::builder()
//!     .config_file("courier.toml")
//!     .build()?;
//!
//! runtime.on(EventKind::Text, |ctx: HandlerContext| async move {
//!     ctx.reply("hi").await.map(|_| ())
//! }).await;
//!
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::signal;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use courier_core::SerialQueue;
use courier_framework::{BoxedBot, CommandSpec, Dispatcher, EventKind, Handler, Update};

use crate::bot::HttpBot;
use crate::config::{ConfigLoader, CourierConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::poller::{PollSettings, Poller};

/// A bot client: one account, one dispatcher, one polling loop.
pub struct CourierRuntime {
    config: CourierConfig,
    bot: Arc<HttpBot>,
    dispatcher: Arc<RwLock<Dispatcher>>,
    /// Cancels the active run; `None` while idle.
    active: Mutex<Option<CancellationToken>>,
}

impl CourierRuntime {
    /// Creates a runtime builder reading `courier.toml` from the current directory.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from a loaded configuration.
    ///
    /// Validates the configuration and installs the global log subscriber.
    pub fn from_config(config: &CourierConfig) -> RuntimeResult<Self> {
        Self::with_dispatcher(config, Dispatcher::new())
    }

    /// Like [`from_config`](Self::from_config), keeping handlers already
    /// registered on `dispatcher`.
    ///
    /// The dispatcher's listener timeout is replaced by the configured one.
    pub fn with_dispatcher(config: &CourierConfig, dispatcher: Dispatcher) -> RuntimeResult<Self> {
        validate_config(config)?;
        logging::init_from_config(&config.logging);

        let bot = HttpBot::from_config(&config.bot)?;
        let dispatcher = dispatcher.listener_timeout(config.bot.listener_timeout());

        info!(
            log_level = %config.logging.level,
            long_poll_timeout_secs = config.bot.long_poll_timeout_secs,
            listener_timeout_secs = config.bot.listener_timeout_secs,
            handlers = dispatcher.handler_count(),
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config: config.clone(),
            bot: Arc::new(bot),
            dispatcher: Arc::new(RwLock::new(dispatcher)),
            active: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    /// Returns the HTTP bot, e.g. to send messages outside handlers.
    pub fn bot(&self) -> Arc<HttpBot> {
        Arc::clone(&self.bot)
    }

    /// Registers `handler` for `kind`.
    pub async fn on<H: Handler>(&self, kind: EventKind, handler: H) {
        self.dispatcher.write().await.on(kind, handler);
    }

    /// Registers a command handler.
    pub async fn on_command<H: Handler>(
        &self,
        spec: CommandSpec,
        handler: H,
    ) -> RuntimeResult<()> {
        self.dispatcher.write().await.on_command(spec, handler)?;
        Ok(())
    }

    pub async fn handler_count(&self) -> usize {
        self.dispatcher.read().await.handler_count()
    }

    /// Returns whether [`run`](Self::run) or [`run_until`](Self::run_until) is active.
    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Stops the active run, if any.
    ///
    /// Polling ends and updates not yet dispatched are dropped; the update
    /// being handled runs to completion in the background.
    pub fn shutdown(&self) {
        if let Some(token) = self.active.lock().as_ref() {
            info!("Shutdown requested");
            token.cancel();
        }
    }

    /// Runs until Ctrl+C, SIGTERM or [`shutdown`](Self::shutdown).
    pub async fn run(&self) -> RuntimeResult<()> {
        info!("Courier runtime is starting. Press Ctrl+C to stop.");
        self.run_until(wait_for_signal()).await
    }

    /// Runs until `shutdown` completes or [`shutdown`](Self::shutdown) is called.
    ///
    /// Fails only if `getMe` fails or the runtime is already running.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let cancel = {
            let mut active = self.active.lock();
            if active.is_some() {
                return Err(RuntimeError::AlreadyRunning);
            }
            let token = CancellationToken::new();
            *active = Some(token.clone());
            token
        };

        let result = self.serve(&cancel, shutdown).await;

        cancel.cancel();
        *self.active.lock() = None;
        info!("Runtime stopped");
        result
    }

    async fn serve<F>(&self, cancel: &CancellationToken, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let me = self.bot.connect().await.map_err(RuntimeError::Startup)?;
        info!(username = me.username.as_deref().unwrap_or(""), "Bot connected");

        let bot: BoxedBot = self.bot.clone();
        self.dispatcher.read().await.dispatch_ready(bot.clone()).await;

        let updates = SerialQueue::with_label("updates");
        let mut poller = Poller::new(bot.clone(), PollSettings::from_config(&self.config));

        let enqueue = |update: Update| {
            let dispatcher = Arc::clone(&self.dispatcher);
            let bot = bot.clone();
            updates.add(move |next| {
                tokio::spawn(async move {
                    let update_id = update.update_id;
                    let reason = dispatcher.read().await.dispatch(update, bot).await;
                    debug!(update_id, reason = reason.as_str(), "Update handled");
                    next.advance();
                });
            });
        };

        tokio::select! {
            _ = poller.run(cancel, enqueue) => {}
            _ = shutdown => info!("Shutdown signal received"),
        }

        let pending = updates.len();
        updates.stop();
        if pending > 0 {
            warn!(pending, "Dropped updates that were not dispatched yet");
        }
        Ok(())
    }
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`CourierRuntime`].
///
/// ```rust,ignore
/// let runtime = CourierRuntime::builder()
///     .config_file("config/courier.toml")
///     .profile("production")
///     .token(std::env::var("BOT_TOKEN")?)
///     .dispatcher(dispatcher)
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    dispatcher: Dispatcher,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Loads exactly this configuration file.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Uses `config` in place of the built-in defaults.
    pub fn merge(mut self, config: CourierConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Sets the bot token, overriding files and environment.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.set("bot.token", token.into());
        self
    }

    /// Starts from a dispatcher with handlers already registered.
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn build(self) -> RuntimeResult<CourierRuntime> {
        let config = self.config_loader.load()?;
        CourierRuntime::with_dispatcher(&config, self.dispatcher)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use courier_framework::{Bot, Flow, HandlerContext};
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    /// Serves `getMe` and hands out `batches` of updates, then long-polls forever.
    async fn fake_api(batches: Vec<Value>) -> String {
        let batches = Arc::new(Mutex::new(std::collections::VecDeque::from(batches)));
        let router = Router::new()
            .route(
                "/botTEST/getMe",
                get(|| async {
                    Json(json!({
                        "ok": true,
                        "result": {"id": 1, "is_bot": true, "first_name": "Courier", "username": "courier_bot"}
                    }))
                }),
            )
            .route(
                "/botTEST/getUpdates",
                get(move |Query(_q): Query<HashMap<String, String>>| {
                    let next = batches.lock().pop_front();
                    async move {
                        match next {
                            Some(batch) => Json(json!({"ok": true, "result": batch})),
                            None => {
                                tokio::time::sleep(Duration::from_millis(200)).await;
                                Json(json!({"ok": true, "result": []}))
                            }
                        }
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/bot{{token}}")
    }

    fn config(api_url: String) -> CourierConfig {
        let mut config = CourierConfig::default();
        config.bot.token = "TEST".to_string();
        config.bot.api_url = api_url;
        config.bot.long_poll_timeout_secs = 1;
        config
    }

    fn text_update(id: i64, text: &str) -> Value {
        json!({
            "update_id": id,
            "message": {"message_id": id, "date": 0, "chat": {"id": 5, "type": "private"}, "text": text}
        })
    }

    #[test]
    fn test_from_config_rejects_missing_token() {
        let result = CourierRuntime::from_config(&CourierConfig::default());
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[test]
    fn test_builder_token_and_dispatcher() {
        let dispatcher = Dispatcher::new().with(EventKind::Update, |_ctx: HandlerContext| async {});
        let dir = std::env::temp_dir().join(format!("courier-runtime-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let runtime = CourierRuntime::builder()
            .without_env()
            .search_path(&dir)
            .token("123:abc")
            .dispatcher(dispatcher)
            .build()
            .unwrap();

        assert_eq!(runtime.config().bot.token, "123:abc");
        assert!(!runtime.is_running());
        assert_eq!(runtime.bot().username(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_dispatches_updates_in_order() {
        let api = fake_api(vec![
            json!([text_update(1, "/ping"), text_update(2, "hello")]),
            json!([text_update(3, "/ping")]),
        ])
        .await;
        let runtime = Arc::new(CourierRuntime::from_config(&config(api)).unwrap());
        let (tx, mut rx) = mpsc::unbounded_channel();

        {
            let tx = tx.clone();
            runtime
                .on(EventKind::Ready, move |ctx: HandlerContext| {
                    let tx = tx.clone();
                    async move {
                        let name = ctx.bot().username().unwrap_or("").to_string();
                        let _ = tx.send(format!("ready:{name}"));
                    }
                })
                .await;
        }
        {
            let tx = tx.clone();
            runtime
                .on_command(CommandSpec::new("ping"), move |ctx: HandlerContext| {
                    let tx = tx.clone();
                    async move {
                        let id = ctx.update().map(|u| u.update_id).unwrap_or(0);
                        let _ = tx.send(format!("ping:{id}"));
                        Flow::Stop
                    }
                })
                .await
                .unwrap();
        }
        runtime
            .on(EventKind::Text, move |ctx: HandlerContext| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(format!("text:{}", ctx.text().unwrap_or("")));
                }
            })
            .await;

        let task = {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move { runtime.run_until(std::future::pending()).await })
        };

        let mut seen = Vec::new();
        while seen.len() < 4 {
            let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push(event);
        }
        assert_eq!(seen, vec!["ready:courier_bot", "ping:1", "text:hello", "ping:3"]);
        assert!(runtime.is_running());
        assert!(matches!(
            runtime.run_until(async {}).await,
            Err(RuntimeError::AlreadyRunning)
        ));

        runtime.shutdown();
        task.await.unwrap().unwrap();
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_run_fails_when_get_me_fails() {
        let router = Router::new().route(
            "/botTEST/getMe",
            get(|| async {
                Json(json!({"ok": false, "error_code": 401, "description": "Unauthorized"}))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let api = format!("http://{addr}/bot{{token}}");
        let runtime = CourierRuntime::from_config(&config(api)).unwrap();
        let err = runtime.run_until(std::future::pending()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Startup(_)));
        assert!(!runtime.is_running());
    }
}
