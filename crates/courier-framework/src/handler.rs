//! Handler system for the Courier framework.
//!
//! Any async closure or function taking a [`HandlerContext`] is a handler,
//! as long as its output implements [`IntoFlow`]:
//!
//! ```rust,ignore
//! // Runs and lets the next handler run.
//! async fn log(ctx: HandlerContext) {
//!     tracing::info!(kind = %ctx.kind(), "Update");
//! }
//!
//! // Decides whether later handlers see the update.
//! async fn gate(ctx: HandlerContext) -> Flow {
//!     if ctx.text() == Some("stop") { Flow::Stop } else { Flow::Continue }
//! }
//!
//! // Errors are logged and the queue moves on.
//! async fn ping(ctx: HandlerContext) -> Result<(), ApiError> {
//!     ctx.reply("pong").await?;
//!     Ok(())
//! }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::warn;

use courier_core::Flow;

use crate::context::HandlerContext;

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ============================================================================
// IntoFlow
// ============================================================================

/// Conversion from a handler's output into a queue decision.
pub trait IntoFlow {
    /// Converts `self` into a [`Flow`].
    fn into_flow(self) -> Flow;
}

impl IntoFlow for () {
    fn into_flow(self) -> Flow {
        Flow::Continue
    }
}

impl IntoFlow for Flow {
    fn into_flow(self) -> Flow {
        self
    }
}

impl<T, E> IntoFlow for Result<T, E>
where
    T: IntoFlow,
    E: Display,
{
    fn into_flow(self) -> Flow {
        match self {
            Ok(value) => value.into_flow(),
            Err(e) => {
                warn!(error = %e, "Handler failed, continuing with the next one");
                Flow::Continue
            }
        }
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// An event handler.
///
/// Implemented for every `Fn(HandlerContext) -> impl Future` whose output
/// implements [`IntoFlow`]. Implement it by hand for handlers carrying state
/// that a closure cannot express conveniently.
pub trait Handler: Send + Sync + 'static {
    /// Runs the handler.
    fn call(&self, ctx: HandlerContext) -> BoxFuture<'static, Flow>;
}

impl<F, Fut> Handler for F
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoFlow,
{
    fn call(&self, ctx: HandlerContext) -> BoxFuture<'static, Flow> {
        let fut = (self)(ctx);
        Box::pin(async move { fut.await.into_flow() })
    }
}

/// A type-erased handler that can be stored in collections.
pub type BoxedHandler = Arc<dyn Handler>;

/// Converts a handler into a [`BoxedHandler`].
pub fn into_handler<H: Handler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::{ApiParams, Bot, BoxedBot};
    use crate::error::{ApiError, ApiResult};
    use crate::event::EventKind;
    use async_trait::async_trait;
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;

    struct MockBot;

    #[async_trait]
    impl Bot for MockBot {
        fn username(&self) -> Option<&str> {
            None
        }

        async fn call_api(&self, _method: &str, _params: ApiParams) -> ApiResult<Value> {
            Err(ApiError::Transport("offline".into()))
        }

        async fn call_api_post(&self, _method: &str, _form: ApiParams) -> ApiResult<Value> {
            Err(ApiError::Transport("offline".into()))
        }

        fn file_url(&self, file_path: &str) -> String {
            file_path.to_string()
        }
    }

    fn ctx() -> HandlerContext {
        let bot: BoxedBot = Arc::new(MockBot);
        HandlerContext::new(EventKind::Ready, None, bot, CancellationToken::new())
    }

    #[test]
    fn test_into_flow() {
        assert_eq!(().into_flow(), Flow::Continue);
        assert_eq!(Flow::Stop.into_flow(), Flow::Stop);
        assert_eq!(Ok::<_, String>(Flow::Stop).into_flow(), Flow::Stop);
        assert_eq!(Err::<Flow, _>("boom").into_flow(), Flow::Continue);
    }

    #[tokio::test]
    async fn test_closure_handlers() {
        let unit = into_handler(|_ctx: HandlerContext| async {});
        let stop = into_handler(|_ctx: HandlerContext| async { Flow::Stop });
        let failing = into_handler(|ctx: HandlerContext| async move {
            ctx.reply("hi").await?;
            Ok::<_, ApiError>(Flow::Stop)
        });

        assert_eq!(unit.call(ctx()).await, Flow::Continue);
        assert_eq!(stop.call(ctx()).await, Flow::Stop);
        // No message to reply to: the error is swallowed as Continue.
        assert_eq!(failing.call(ctx()).await, Flow::Continue);
    }

    #[tokio::test]
    async fn test_fn_item_handler() {
        async fn gate(ctx: HandlerContext) -> Flow {
            if ctx.update().is_none() {
                Flow::Stop
            } else {
                Flow::Continue
            }
        }

        assert_eq!(into_handler(gate).call(ctx()).await, Flow::Stop);
    }
}
