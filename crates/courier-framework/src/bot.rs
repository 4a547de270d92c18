//! The bot API surface handlers talk to.
//!
//! [`Bot`] is the raw seam: a username plus two ways of calling an API
//! method. [`BotExt`] layers the typed send wrappers on top of it and is
//! implemented for every bot, so a test double only has to provide the raw
//! calls.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};
use crate::model::{File, Message, User};

/// Request parameters: a JSON object whose values become query or form fields.
pub type ApiParams = Map<String, Value>;

/// A type-erased, shareable bot.
pub type BoxedBot = Arc<dyn Bot>;

/// The target of a send call: a numeric chat id or an `@channel` username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Id(i64),
    Username(String),
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ChatId {
    fn from(username: &str) -> Self {
        Self::Username(username.to_string())
    }
}

impl From<String> for ChatId {
    fn from(username: String) -> Self {
        Self::Username(username)
    }
}

impl From<ChatId> for Value {
    fn from(chat_id: ChatId) -> Self {
        match chat_id {
            ChatId::Id(id) => Value::from(id),
            ChatId::Username(username) => Value::String(username),
        }
    }
}

/// A connected bot account.
///
/// Both call methods return the `result` field of a successful response;
/// an `ok: false` response surfaces as [`ApiError::Api`].
#[async_trait]
pub trait Bot: Send + Sync {
    /// Returns the bot's username once it is known.
    fn username(&self) -> Option<&str>;

    /// Calls `method` with `params` sent as query parameters.
    async fn call_api(&self, method: &str, params: ApiParams) -> ApiResult<Value>;

    /// Calls `method` with `form` sent as a urlencoded form body.
    async fn call_api_post(&self, method: &str, form: ApiParams) -> ApiResult<Value>;

    /// Returns the download URL for a `file_path` obtained from `getFile`.
    fn file_url(&self, file_path: &str) -> String;
}

fn chat_value<C: Into<ChatId>>(chat_id: C) -> Value {
    let chat_id: ChatId = chat_id.into();
    chat_id.into()
}

fn decode<T: DeserializeOwned>(value: Value) -> ApiResult<T> {
    serde_json::from_value(value).map_err(ApiError::from)
}

/// Builds a parameter object from explicit fields and caller extras.
///
/// Explicit fields win over extras with the same key.
fn params<const N: usize>(fields: [(&str, Value); N], extra: Option<ApiParams>) -> ApiParams {
    let mut params = extra.unwrap_or_default();
    for (key, value) in fields {
        params.insert(key.to_string(), value);
    }
    params
}

/// Typed wrappers over the raw API calls.
///
/// Every wrapper accepting `extra` merges it into the request, which is how
/// optional API parameters such as `parse_mode` or `reply_markup` are sent.
#[async_trait]
pub trait BotExt: Bot {
    /// Fetches the bot's own account.
    async fn get_me(&self) -> ApiResult<User> {
        decode(self.call_api("getMe", ApiParams::new()).await?)
    }

    /// Sends a text message.
    async fn send_message<C>(
        &self,
        chat_id: C,
        text: &str,
        extra: Option<ApiParams>,
    ) -> ApiResult<Message>
    where
        C: Into<ChatId> + Send,
    {
        let params = params(
            [("chat_id", chat_value(chat_id)), ("text", Value::from(text))],
            extra,
        );
        decode(self.call_api("sendMessage", params).await?)
    }

    /// Sends a text message to the chat `message` came from.
    async fn reply(
        &self,
        message: &Message,
        text: &str,
        extra: Option<ApiParams>,
    ) -> ApiResult<Message> {
        self.send_message(message.chat.id, text, extra).await
    }

    /// Forwards a message from one chat to another.
    async fn forward_message<C, F>(
        &self,
        chat_id: C,
        from_chat_id: F,
        message_id: i64,
    ) -> ApiResult<Message>
    where
        C: Into<ChatId> + Send,
        F: Into<ChatId> + Send,
    {
        let params = params(
            [
                ("chat_id", chat_value(chat_id)),
                ("from_chat_id", chat_value(from_chat_id)),
                ("message_id", Value::from(message_id)),
            ],
            None,
        );
        decode(self.call_api("forwardMessage", params).await?)
    }

    /// Sends a photo by file id or URL.
    async fn send_photo<C>(
        &self,
        chat_id: C,
        photo: &str,
        extra: Option<ApiParams>,
    ) -> ApiResult<Message>
    where
        C: Into<ChatId> + Send,
    {
        self.send_media("sendPhoto", "photo", chat_id.into(), photo, extra).await
    }

    /// Sends an audio file by file id or URL.
    async fn send_audio<C>(
        &self,
        chat_id: C,
        audio: &str,
        extra: Option<ApiParams>,
    ) -> ApiResult<Message>
    where
        C: Into<ChatId> + Send,
    {
        self.send_media("sendAudio", "audio", chat_id.into(), audio, extra).await
    }

    /// Sends a general file by file id or URL.
    async fn send_document<C>(
        &self,
        chat_id: C,
        document: &str,
        extra: Option<ApiParams>,
    ) -> ApiResult<Message>
    where
        C: Into<ChatId> + Send,
    {
        self.send_media("sendDocument", "document", chat_id.into(), document, extra)
            .await
    }

    /// Sends a sticker by file id or URL.
    async fn send_sticker<C>(
        &self,
        chat_id: C,
        sticker: &str,
        extra: Option<ApiParams>,
    ) -> ApiResult<Message>
    where
        C: Into<ChatId> + Send,
    {
        self.send_media("sendSticker", "sticker", chat_id.into(), sticker, extra)
            .await
    }

    /// Sends a video by file id or URL.
    async fn send_video<C>(
        &self,
        chat_id: C,
        video: &str,
        extra: Option<ApiParams>,
    ) -> ApiResult<Message>
    where
        C: Into<ChatId> + Send,
    {
        self.send_media("sendVideo", "video", chat_id.into(), video, extra).await
    }

    /// Sends a voice note by file id or URL.
    async fn send_voice<C>(
        &self,
        chat_id: C,
        voice: &str,
        extra: Option<ApiParams>,
    ) -> ApiResult<Message>
    where
        C: Into<ChatId> + Send,
    {
        self.send_media("sendVoice", "voice", chat_id.into(), voice, extra).await
    }

    /// Sends a point on the map.
    async fn send_location<C>(
        &self,
        chat_id: C,
        latitude: f64,
        longitude: f64,
        extra: Option<ApiParams>,
    ) -> ApiResult<Message>
    where
        C: Into<ChatId> + Send,
    {
        let form = params(
            [
                ("chat_id", chat_value(chat_id)),
                ("latitude", Value::from(latitude)),
                ("longitude", Value::from(longitude)),
            ],
            extra,
        );
        decode(self.call_api_post("sendLocation", form).await?)
    }

    /// Shows a status such as `typing` in the chat.
    async fn send_chat_action<C>(&self, chat_id: C, action: &str) -> ApiResult<bool>
    where
        C: Into<ChatId> + Send,
    {
        let form = params(
            [("chat_id", chat_value(chat_id)), ("action", Value::from(action))],
            None,
        );
        decode(self.call_api_post("sendChatAction", form).await?)
    }

    /// Lists a user's profile pictures.
    async fn get_user_profile_photos(
        &self,
        user_id: i64,
        extra: Option<ApiParams>,
    ) -> ApiResult<Value> {
        let params = params([("user_id", Value::from(user_id))], extra);
        self.call_api("getUserProfilePhotos", params).await
    }

    /// Registers a webhook URL. Long polling stops receiving updates while one is set.
    async fn set_webhook(&self, url: &str, extra: Option<ApiParams>) -> ApiResult<bool> {
        let form = params([("url", Value::from(url))], extra);
        decode(self.call_api_post("setWebhook", form).await?)
    }

    /// Resolves a file id to a downloadable [`File`].
    async fn get_file(&self, file_id: &str) -> ApiResult<File> {
        let params = params([("file_id", Value::from(file_id))], None);
        decode(self.call_api("getFile", params).await?)
    }

    /// Answers an inline query. `results` is sent JSON-encoded.
    async fn answer_inline_query(
        &self,
        inline_query_id: &str,
        results: Value,
        extra: Option<ApiParams>,
    ) -> ApiResult<bool> {
        let results = match results {
            Value::String(encoded) => encoded,
            other => other.to_string(),
        };
        let form = params(
            [
                ("inline_query_id", Value::from(inline_query_id)),
                ("results", Value::String(results)),
            ],
            extra,
        );
        decode(self.call_api_post("answerInlineQuery", form).await?)
    }

    #[doc(hidden)]
    async fn send_media(
        &self,
        method: &str,
        field: &str,
        chat_id: ChatId,
        media: &str,
        extra: Option<ApiParams>,
    ) -> ApiResult<Message> {
        let form = params(
            [("chat_id", chat_id.into()), (field, Value::from(media))],
            extra,
        );
        decode(self.call_api_post(method, form).await?)
    }
}

impl<B: Bot + ?Sized> BotExt for B {}
