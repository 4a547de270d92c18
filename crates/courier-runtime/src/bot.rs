//! The HTTP-backed [`Bot`].
//!
//! Every response is an envelope `{ok, result, description, error_code}`.
//! Successful calls yield `result`; `ok: false` becomes [`ApiError::Api`].

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use courier_framework::{ApiError, ApiParams, ApiResult, Bot, BotExt, User};
use courier_transport::{HttpApiClient, TransportError, TransportResult};

use crate::config::BotConfig;

/// Added to the long-poll timeout to get the per-request timeout.
pub const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// A bot account reached over the HTTP API.
pub struct HttpBot {
    client: HttpApiClient,
    file_base_url: String,
    me: OnceLock<User>,
}

impl HttpBot {
    /// Creates a bot for already-resolved base URLs.
    pub fn new(
        api_base_url: impl Into<String>,
        file_base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> TransportResult<Self> {
        Ok(Self {
            client: HttpApiClient::with_timeout(api_base_url, request_timeout)?,
            file_base_url: file_base_url.into().trim_end_matches('/').to_string(),
            me: OnceLock::new(),
        })
    }

    /// Creates a bot from the `[bot]` config section.
    ///
    /// Requests may take up to the long-poll timeout plus
    /// [`REQUEST_TIMEOUT_MARGIN`].
    pub fn from_config(config: &BotConfig) -> TransportResult<Self> {
        Self::new(
            config.api_base_url(),
            config.file_base_url(),
            config.long_poll_timeout() + REQUEST_TIMEOUT_MARGIN,
        )
    }

    /// Calls `getMe` once and remembers the account.
    ///
    /// Later calls return the remembered account without a request.
    pub async fn connect(&self) -> ApiResult<&User> {
        if let Some(me) = self.me.get() {
            return Ok(me);
        }

        let user = self.get_me().await?;
        info!(
            id = user.id,
            username = user.username.as_deref().unwrap_or(""),
            "Bot account identified"
        );
        Ok(self.me.get_or_init(|| user))
    }

    /// Returns the account fetched by [`connect`](Self::connect).
    pub fn me(&self) -> Option<&User> {
        self.me.get()
    }

    pub fn client(&self) -> &HttpApiClient {
        &self.client
    }
}

impl std::fmt::Debug for HttpBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Base URLs embed the token.
        f.debug_struct("HttpBot")
            .field("username", &self.username())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Bot for HttpBot {
    fn username(&self) -> Option<&str> {
        self.me.get().and_then(|me| me.username.as_deref())
    }

    async fn call_api(&self, method: &str, params: ApiParams) -> ApiResult<Value> {
        let fields = encode_params(params);
        let body = self
            .client
            .get(method, &fields)
            .await
            .map_err(transport_error)?;
        open_envelope(method, body)
    }

    async fn call_api_post(&self, method: &str, form: ApiParams) -> ApiResult<Value> {
        let fields = encode_params(form);
        let body = self
            .client
            .post_form(method, &fields)
            .await
            .map_err(transport_error)?;
        open_envelope(method, body)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/{}", self.file_base_url, file_path.trim_start_matches('/'))
    }
}

/// Flattens parameters into string pairs.
///
/// Strings go as-is, `null` is dropped and anything else is sent as JSON.
fn encode_params(params: ApiParams) -> Vec<(String, String)> {
    params
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

fn open_envelope(method: &str, body: Value) -> ApiResult<Value> {
    let Value::Object(mut envelope) = body else {
        return Err(ApiError::Decode(format!(
            "{method}: response is not a JSON object"
        )));
    };

    if envelope.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(envelope.remove("result").unwrap_or(Value::Null));
    }

    let description = envelope
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("no description")
        .to_string();
    let code = envelope.get("error_code").and_then(Value::as_i64);
    debug!(method, ?code, %description, "API call rejected");
    Err(ApiError::api(code, description))
}

fn transport_error(err: TransportError) -> ApiError {
    match err {
        TransportError::Decode(reason) => ApiError::Decode(reason),
        other => ApiError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use axum::extract::{Form, Query};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/botTEST")
    }

    fn bot(base: &str) -> HttpBot {
        HttpBot::new(base, "http://files.local/file/botTEST/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_encode_params() {
        let mut params = ApiParams::new();
        params.insert("chat_id".into(), json!(42));
        params.insert("text".into(), json!("hi"));
        params.insert("skip".into(), Value::Null);
        params.insert("markup".into(), json!({"a": [1]}));

        let mut fields = encode_params(params);
        fields.sort();
        assert_eq!(
            fields,
            vec![
                ("chat_id".to_string(), "42".to_string()),
                ("markup".to_string(), r#"{"a":[1]}"#.to_string()),
                ("text".to_string(), "hi".to_string()),
            ]
        );
    }

    #[test]
    fn test_open_envelope() {
        let ok = open_envelope("m", json!({"ok": true, "result": [1, 2]})).unwrap();
        assert_eq!(ok, json!([1, 2]));

        let err = open_envelope(
            "m",
            json!({"ok": false, "error_code": 409, "description": "Conflict"}),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Api { code: Some(409), ref description } if description == "Conflict"
        ));

        assert!(matches!(open_envelope("m", json!([])), Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_file_url() {
        let bot = bot("http://127.0.0.1:1/botTEST");
        assert_eq!(
            bot.file_url("photos/file_1.jpg"),
            "http://files.local/file/botTEST/photos/file_1.jpg"
        );
    }

    #[tokio::test]
    async fn test_connect_caches_username() {
        let router = Router::new().route(
            "/botTEST/getMe",
            get(|| async {
                Json(json!({
                    "ok": true,
                    "result": {"id": 7, "is_bot": true, "first_name": "Courier", "username": "courier_bot"}
                }))
            }),
        );
        let bot = bot(&serve(router).await);

        assert_eq!(bot.username(), None);
        let me = bot.connect().await.unwrap();
        assert_eq!(me.id, 7);
        assert_eq!(bot.username(), Some("courier_bot"));
        assert_eq!(bot.me().map(|u| u.first_name.as_str()), Some("Courier"));
    }

    #[tokio::test]
    async fn test_get_sends_query_and_post_sends_form() {
        let router = Router::new()
            .route(
                "/botTEST/getUpdates",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    Json(json!({"ok": true, "result": q}))
                }),
            )
            .route(
                "/botTEST/sendChatAction",
                post(|Form(f): Form<HashMap<String, String>>| async move {
                    Json(json!({"ok": true, "result": f}))
                }),
            );
        let bot = bot(&serve(router).await);

        let mut params = ApiParams::new();
        params.insert("offset".into(), json!(5));
        let echoed = bot.call_api("getUpdates", params).await.unwrap();
        assert_eq!(echoed, json!({"offset": "5"}));

        let mut form = ApiParams::new();
        form.insert("action".into(), json!("typing"));
        let echoed = bot.call_api_post("sendChatAction", form).await.unwrap();
        assert_eq!(echoed, json!({"action": "typing"}));
    }

    #[tokio::test]
    async fn test_error_envelope_with_error_status() {
        let router = Router::new().route(
            "/botTEST/sendMessage",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"})),
                )
            }),
        );
        let bot = bot(&serve(router).await);

        let err = bot.call_api("sendMessage", ApiParams::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Api { code: Some(400), .. }));
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let bot = bot(&format!("http://{addr}/botTEST"));
        let err = bot.call_api("getMe", ApiParams::new()).await.unwrap_err();
        assert!(err.is_transport());
    }
}
