//! Command handlers.
//!
//! [`on_command`] wraps a handler so it only runs for text messages matching
//! a [`CommandSpec`]. A non-matching message lets the next handler run.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use courier_core::{CommandMatcher, CommandSpec, Flow};

use crate::context::HandlerContext;
use crate::error::DispatchResult;
use crate::handler::{BoxFuture, BoxedHandler, Handler, into_handler};

/// A handler gated by a command pattern.
///
/// When the spec has no bot name, the bot's own username is filled in at
/// dispatch time, so `/cmd@this_bot` matches while `/cmd@other_bot` does not.
struct CommandHandler {
    spec: CommandSpec,
    /// Compiled from the spec as given.
    base: Arc<CommandMatcher>,
    /// Compiled with the bot's username, keyed by that username.
    with_username: Mutex<Option<(String, Arc<CommandMatcher>)>>,
    inner: BoxedHandler,
}

impl CommandHandler {
    fn matcher_for(&self, username: Option<&str>) -> Arc<CommandMatcher> {
        let username = match username {
            Some(name) if self.spec.get_bot_name().is_none() && !name.is_empty() => name,
            _ => return Arc::clone(&self.base),
        };

        let mut cached = self.with_username.lock();
        if let Some((name, matcher)) = cached.as_ref() {
            if name == username {
                return Arc::clone(matcher);
            }
        }

        match self.spec.clone().bot_name(username).compile() {
            Ok(matcher) => {
                let matcher = Arc::new(matcher);
                *cached = Some((username.to_string(), Arc::clone(&matcher)));
                matcher
            }
            Err(e) => {
                warn!(error = %e, username, "Failed to compile command with bot name");
                Arc::clone(&self.base)
            }
        }
    }

    fn run(self: Arc<Self>, ctx: HandlerContext) -> BoxFuture<'static, Flow> {
        Box::pin(async move {
            let Some(text) = ctx.text() else {
                return Flow::Continue;
            };

            let matcher = self.matcher_for(ctx.bot().username());
            match matcher.find(text) {
                Some(found) => {
                    debug!(command = found.command(), "Command matched");
                    self.inner.call(ctx.with_command(found)).await
                }
                None => Flow::Continue,
            }
        })
    }
}

/// Wraps `handler` so it only runs for messages matching `spec`.
///
/// The spec is compiled here; a malformed fragment is reported immediately
/// rather than at the first message. The returned handler belongs under
/// [`EventKind::Text`](crate::event::EventKind::Text).
pub fn on_command<H: Handler>(spec: CommandSpec, handler: H) -> DispatchResult<BoxedHandler> {
    let base = Arc::new(spec.compile()?);
    let command = Arc::new(CommandHandler {
        spec,
        base,
        with_username: Mutex::new(None),
        inner: into_handler(handler),
    });

    Ok(into_handler(move |ctx: HandlerContext| {
        Arc::clone(&command).run(ctx)
    }))
}
