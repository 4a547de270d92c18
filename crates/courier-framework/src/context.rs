//! The context handed to every handler call.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use courier_core::CommandMatch;

use crate::bot::{ApiParams, BotExt, BoxedBot};
use crate::error::{ApiError, ApiResult};
use crate::event::EventKind;
use crate::model::{Message, Update};

/// Everything a handler needs for one call.
///
/// Contexts are cheap to clone. Handlers registered for `Update` and for a
/// message kind see the same update; `Ready` handlers see none.
#[derive(Clone)]
pub struct HandlerContext {
    kind: EventKind,
    update: Option<Arc<Update>>,
    bot: BoxedBot,
    cancel: CancellationToken,
    command: Option<Arc<CommandMatch>>,
}

impl HandlerContext {
    /// Creates a context for `kind`.
    pub fn new(
        kind: EventKind,
        update: Option<Arc<Update>>,
        bot: BoxedBot,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            kind,
            update,
            bot,
            cancel,
            command: None,
        }
    }

    /// Attaches the result of a command match.
    pub fn with_command(mut self, found: CommandMatch) -> Self {
        self.command = Some(Arc::new(found));
        self
    }

    /// Returns the kind this handler was registered for.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns the bot that received the update.
    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    /// Returns the update being dispatched, absent for `Ready`.
    pub fn update(&self) -> Option<&Update> {
        self.update.as_deref()
    }

    /// Returns the update's message, if it has one.
    pub fn message(&self) -> Option<&Message> {
        self.update()?.message.as_ref()
    }

    /// Returns the message text, if any.
    pub fn text(&self) -> Option<&str> {
        self.message()?.text.as_deref()
    }

    /// Returns the command match, for handlers registered through `on_command`.
    pub fn command(&self) -> Option<&CommandMatch> {
        self.command.as_deref()
    }

    /// Shorthand for a named command argument.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.command()?.get(name)
    }

    /// Returns the token cancelled when this update's dispatch ends.
    ///
    /// A handler outliving its watchdog can select on
    /// [`cancelled`](CancellationToken::cancelled) to give up early.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns `true` once the dispatch this handler belongs to has ended.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Replies with `text` in the chat the message came from.
    pub async fn reply(&self, text: &str) -> ApiResult<Message> {
        self.reply_with(text, None).await
    }

    /// Replies with `text` and extra request parameters.
    pub async fn reply_with(&self, text: &str, extra: Option<ApiParams>) -> ApiResult<Message> {
        let message = self.message().ok_or(ApiError::NoMessage)?;
        self.bot.reply(message, text, extra).await
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("kind", &self.kind)
            .field("update_id", &self.update.as_ref().map(|u| u.update_id))
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}
