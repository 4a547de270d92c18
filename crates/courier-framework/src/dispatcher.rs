//! Update dispatcher for the Courier framework.
//!
//! The [`Dispatcher`] owns an ordered registration table of
//! `(EventKind, handler)` entries. Each dispatched update gets its own
//! [`SerialQueue`]:
//!
//! 1. The update is classified into event kinds (`Update` first)
//! 2. For each kind, every handler registered for it is enqueued in
//!    registration order
//! 3. A final action stops the queue with [`StopReason::Completed`]
//! 4. A watchdog stops it with [`StopReason::TimedOut`] if handlers stall
//!
//! A handler returning [`Flow::Stop`] ends the update early; the remaining
//! handlers never run.
//!
//! ```rust,ignore
//! use courier_framework::{Dispatcher, EventKind, Flow, HandlerContext};
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.on(EventKind::Update, |ctx: HandlerContext| async move {
//!     tracing::info!(update_id = ctx.update().map(|u| u.update_id), "Update");
//! });
//! dispatcher.on_command(CommandSpec::new("ping"), |ctx: HandlerContext| async move {
//!     ctx.reply("pong").await?;
//!     Ok::<_, ApiError>(Flow::Stop)
//! })?;
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span, warn};

use courier_core::{CommandSpec, Flow, SerialQueue, StopReason};

use crate::bot::BoxedBot;
use crate::command::on_command;
use crate::context::HandlerContext;
use crate::error::DispatchResult;
use crate::event::EventKind;
use crate::handler::{BoxedHandler, Handler, into_handler};
use crate::model::Update;

/// Listener timeout used when none is configured.
pub const DEFAULT_LISTENER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct Registration {
    kind: EventKind,
    handler: BoxedHandler,
}

/// The central update dispatcher.
///
/// `Dispatcher` is `Send + Sync`; share it behind an `Arc` once all handlers
/// are registered.
#[derive(Clone)]
pub struct Dispatcher {
    registrations: Vec<Registration>,
    listener_timeout: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates an empty dispatcher with the default listener timeout.
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            listener_timeout: DEFAULT_LISTENER_TIMEOUT,
        }
    }

    /// Sets how long one update may take before its queue is force-stopped.
    ///
    /// [`Duration::ZERO`] disables the watchdog.
    pub fn listener_timeout(mut self, timeout: Duration) -> Self {
        self.listener_timeout = timeout;
        self
    }

    /// Returns the listener timeout.
    pub fn get_listener_timeout(&self) -> Duration {
        self.listener_timeout
    }

    /// Registers a handler for `kind`.
    pub fn on<H: Handler>(&mut self, kind: EventKind, handler: H) -> &mut Self {
        self.on_boxed(kind, into_handler(handler))
    }

    /// Registers an already boxed handler for `kind`.
    pub fn on_boxed(&mut self, kind: EventKind, handler: BoxedHandler) -> &mut Self {
        self.registrations.push(Registration { kind, handler });
        self
    }

    /// Registers a handler for `kind` (builder pattern).
    pub fn with<H: Handler>(mut self, kind: EventKind, handler: H) -> Self {
        self.on(kind, handler);
        self
    }

    /// Registers a `Text` handler that only runs when `spec` matches.
    ///
    /// Fails if the spec does not compile.
    pub fn on_command<H: Handler>(
        &mut self,
        spec: CommandSpec,
        handler: H,
    ) -> DispatchResult<&mut Self> {
        let handler = on_command(spec, handler)?;
        Ok(self.on_boxed(EventKind::Text, handler))
    }

    /// Returns the total number of registrations.
    pub fn handler_count(&self) -> usize {
        self.registrations.len()
    }

    /// Returns the number of handlers registered for `kind`.
    pub fn handler_count_for(&self, kind: EventKind) -> usize {
        self.registrations.iter().filter(|r| r.kind == kind).count()
    }

    /// Removes every registration.
    pub fn clear(&mut self) {
        self.registrations.clear();
    }

    /// Runs every `Ready` handler once, in registration order.
    ///
    /// Ready handlers run outside any queue; their flow is ignored.
    pub async fn dispatch_ready(&self, bot: BoxedBot) {
        let cancel = CancellationToken::new();
        for registration in self.registrations.iter().filter(|r| r.kind == EventKind::Ready) {
            let ctx = HandlerContext::new(EventKind::Ready, None, bot.clone(), cancel.clone());
            let result = AssertUnwindSafe(registration.handler.call(ctx))
                .catch_unwind()
                .await;
            if result.is_err() {
                error!("Ready handler panicked");
            }
        }
        cancel.cancel();
    }

    /// Dispatches one update and waits until its queue stops.
    ///
    /// Returns why the queue stopped: `Completed` when every handler
    /// continued, `Halted` when one returned [`Flow::Stop`], `TimedOut` when
    /// the watchdog fired.
    pub async fn dispatch(&self, update: Update, bot: BoxedBot) -> StopReason {
        let update_id = update.update_id;
        let span = info_span!("dispatch", update_id);
        let reason = self
            .dispatch_inner(Arc::new(update), bot)
            .instrument(span)
            .await;

        if reason.is_timeout() {
            warn!(
                update_id,
                timeout = ?self.listener_timeout,
                "Handlers did not finish in time, update force-stopped"
            );
        }
        reason
    }

    async fn dispatch_inner(&self, update: Arc<Update>, bot: BoxedBot) -> StopReason {
        let kinds = EventKind::classify(&update);
        let queue = SerialQueue::with_label(format!("update-{}", update.update_id));
        let cancel = CancellationToken::new();

        {
            let cancel = cancel.clone();
            queue.on_finalize(move |_| cancel.cancel());
        }
        let finished = queue.finished();

        let mut scheduled = 0usize;
        for kind in &kinds {
            for registration in self.registrations.iter().filter(|r| r.kind == *kind) {
                let ctx = HandlerContext::new(
                    *kind,
                    Some(Arc::clone(&update)),
                    bot.clone(),
                    cancel.clone(),
                );
                let handler = Arc::clone(&registration.handler);
                queue.add_with(
                    move |next| {
                        tokio::spawn(
                            async move {
                                let flow = match AssertUnwindSafe(handler.call(ctx))
                                    .catch_unwind()
                                    .await
                                {
                                    Ok(flow) => flow,
                                    Err(_) => {
                                        error!("Handler panicked, continuing with the next one");
                                        Flow::Continue
                                    }
                                };
                                next.resolve(flow);
                            }
                            .in_current_span(),
                        );
                    },
                    false,
                );
                scheduled += 1;
            }
        }

        {
            let sentinel = queue.clone();
            queue.add_with(
                move |_next| sentinel.stop_with(StopReason::Completed),
                false,
            );
        }

        debug!(kinds = ?kinds, handlers = scheduled, "Dispatching update");

        let watchdog = (!self.listener_timeout.is_zero()).then(|| {
            let queue = queue.clone();
            let timeout = self.listener_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                queue.stop_with(StopReason::TimedOut);
            })
        });

        queue.run();
        let reason = finished.await;

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        debug!(reason = %reason, "Update finished");
        reason
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handler_count", &self.registrations.len())
            .field("listener_timeout", &self.listener_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::{ApiParams, Bot};
    use crate::error::{ApiError, ApiResult};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio::sync::oneshot;

    struct MockBot;

    #[async_trait]
    impl Bot for MockBot {
        fn username(&self) -> Option<&str> {
            Some("mock_bot")
        }

        async fn call_api(&self, _method: &str, _params: ApiParams) -> ApiResult<Value> {
            Err(ApiError::Transport("not connected".into()))
        }

        async fn call_api_post(&self, _method: &str, _form: ApiParams) -> ApiResult<Value> {
            Err(ApiError::Transport("not connected".into()))
        }

        fn file_url(&self, file_path: &str) -> String {
            file_path.to_string()
        }
    }

    fn mock_bot() -> BoxedBot {
        Arc::new(MockBot)
    }

    fn text_update(text: &str) -> Update {
        serde_json::from_value(json!({
            "update_id": 100,
            "message": {"message_id": 1, "date": 0, "chat": {"id": 7}, "text": text}
        }))
        .unwrap()
    }

    type Log = Arc<Mutex<Vec<String>>>;

    /// A handler that records `name` and answers with `flow`.
    fn recorder(log: &Log, name: &str, flow: Flow) -> impl Handler {
        let log = Arc::clone(log);
        let name = name.to_string();
        move |_ctx: HandlerContext| {
            let log = Arc::clone(&log);
            let name = name.clone();
            async move {
                log.lock().push(name);
                flow
            }
        }
    }

    #[tokio::test]
    async fn test_dispatch_no_handlers() {
        let dispatcher = Dispatcher::new();
        let reason = dispatcher.dispatch(text_update("hi"), mock_bot()).await;
        assert_eq!(reason, StopReason::Completed);
    }

    #[tokio::test]
    async fn test_classification_order_before_registration_order() {
        let log = Log::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .on(EventKind::Text, recorder(&log, "text-1", Flow::Continue))
            .on(EventKind::Update, recorder(&log, "update", Flow::Continue))
            .on(EventKind::Photo, recorder(&log, "photo", Flow::Continue))
            .on(EventKind::Text, recorder(&log, "text-2", Flow::Continue));

        let reason = dispatcher.dispatch(text_update("hi"), mock_bot()).await;

        assert_eq!(reason, StopReason::Completed);
        assert_eq!(*log.lock(), vec!["update", "text-1", "text-2"]);
    }

    #[tokio::test]
    async fn test_stop_skips_remaining_handlers() {
        let log = Log::default();
        let dispatcher = Dispatcher::new()
            .with(EventKind::Update, recorder(&log, "first", Flow::Stop))
            .with(EventKind::Text, recorder(&log, "second", Flow::Continue));

        let reason = dispatcher.dispatch(text_update("hi"), mock_bot()).await;

        assert_eq!(reason, StopReason::Halted);
        assert_eq!(*log.lock(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_failing_and_panicking_handlers_continue() {
        let log = Log::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .on(EventKind::Text, |ctx: HandlerContext| async move {
                ctx.reply("unreachable").await?;
                Ok::<_, ApiError>(())
            })
            .on(EventKind::Text, |ctx: HandlerContext| async move {
                if ctx.text().is_some() {
                    panic!("handler bug");
                }
                Flow::Continue
            })
            .on(EventKind::Text, recorder(&log, "last", Flow::Continue));

        let reason = dispatcher.dispatch(text_update("hi"), mock_bot()).await;

        assert_eq!(reason, StopReason::Completed);
        assert_eq!(*log.lock(), vec!["last"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_stops_stalled_update() {
        let log = Log::default();
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let dispatcher = Dispatcher::new()
            .listener_timeout(Duration::from_millis(50))
            .with(EventKind::Update, move |ctx: HandlerContext| {
                let tx = Arc::clone(&tx);
                async move {
                    ctx.cancellation().cancelled().await;
                    if let Some(tx) = tx.lock().take() {
                        let _ = tx.send(());
                    }
                    Flow::Continue
                }
            })
            .with(EventKind::Text, recorder(&log, "never", Flow::Continue));

        let reason = dispatcher.dispatch(text_update("hi"), mock_bot()).await;

        assert_eq!(reason, StopReason::TimedOut);
        rx.await.unwrap();
        assert!(log.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_disables_watchdog() {
        let dispatcher = Dispatcher::new().listener_timeout(Duration::ZERO).with(
            EventKind::Update,
            |_ctx: HandlerContext| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            },
        );

        let reason = dispatcher.dispatch(text_update("hi"), mock_bot()).await;
        assert_eq!(reason, StopReason::Completed);
    }

    #[tokio::test]
    async fn test_handlers_see_update_and_message() {
        // Handler panics are caught by the dispatcher, so observations are
        // recorded and checked here.
        let log = Log::default();
        let update_log = Arc::clone(&log);
        let text_log = Arc::clone(&log);

        let dispatcher = Dispatcher::new()
            .with(EventKind::Update, move |ctx: HandlerContext| {
                let log = Arc::clone(&update_log);
                async move {
                    let update_id = ctx.update().map(|u| u.update_id);
                    log.lock().push(format!(
                        "{}:{update_id:?}:{}",
                        ctx.kind(),
                        ctx.is_cancelled()
                    ));
                }
            })
            .with(EventKind::Text, move |ctx: HandlerContext| {
                let log = Arc::clone(&text_log);
                async move {
                    let chat = ctx.message().map(|m| m.chat.id);
                    log.lock()
                        .push(format!("{}:{:?}:{chat:?}", ctx.kind(), ctx.text()));
                    Flow::Stop
                }
            });

        let reason = dispatcher.dispatch(text_update("hello"), mock_bot()).await;

        assert_eq!(reason, StopReason::Halted);
        assert_eq!(
            *log.lock(),
            vec!["update:Some(100):false", r#"text:Some("hello"):Some(7)"#]
        );
    }

    #[tokio::test]
    async fn test_on_command_registers_text_handler() {
        let log = Log::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .on_command(CommandSpec::new("ping"), recorder(&log, "ping", Flow::Stop))
            .unwrap()
            .on(EventKind::Text, recorder(&log, "fallback", Flow::Continue));
        assert_eq!(dispatcher.handler_count_for(EventKind::Text), 2);

        let reason = dispatcher.dispatch(text_update("/ping@mock_bot"), mock_bot()).await;
        assert_eq!(reason, StopReason::Halted);

        let reason = dispatcher.dispatch(text_update("hello"), mock_bot()).await;
        assert_eq!(reason, StopReason::Completed);

        assert_eq!(*log.lock(), vec!["ping", "fallback"]);
    }

    #[tokio::test]
    async fn test_dispatch_ready_runs_only_ready_handlers() {
        let log = Log::default();
        let dispatcher = Dispatcher::new()
            .with(EventKind::Ready, recorder(&log, "ready-1", Flow::Stop))
            .with(EventKind::Update, recorder(&log, "update", Flow::Continue))
            .with(EventKind::Ready, recorder(&log, "ready-2", Flow::Continue));

        dispatcher.dispatch_ready(mock_bot()).await;
        assert_eq!(*log.lock(), vec!["ready-1", "ready-2"]);

        dispatcher.dispatch(text_update("hi"), mock_bot()).await;
        assert_eq!(*log.lock(), vec!["ready-1", "ready-2", "update"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_updates_are_independent() {
        let log = Log::default();
        let dispatcher = Arc::new(
            Dispatcher::new()
                .with(EventKind::Text, recorder(&log, "a", Flow::Stop))
                .with(EventKind::Text, recorder(&log, "b", Flow::Continue)),
        );

        for _ in 0..3 {
            let reason = dispatcher.dispatch(text_update("x"), mock_bot()).await;
            assert_eq!(reason, StopReason::Halted);
        }
        assert_eq!(*log.lock(), vec!["a", "a", "a"]);
    }
}
