//! WeCom application-message client.
//!
//! Wraps `gettoken`, `message/send`, and `media/upload`. The access token is
//! cached and refreshed shortly before it expires; a send rejected for an
//! invalid token clears the cache and is retried once.

use std::path::Path;
use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::WeComConfig;
use crate::{AppError, Result};

use super::chunk::{split_labelled, split_markdown};
use super::{DeliveryFuture, Messenger};

/// Refresh the token this long before the server-side expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_TTL_SECS: u64 = 7200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Error codes meaning the access token is invalid or expired.
const TOKEN_ERRCODES: &[i64] = &[40014, 42001];

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    access_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    #[serde(default)]
    media_id: String,
}

/// [`Messenger`] over the WeCom HTTP API.
pub struct WeComClient {
    http: reqwest::Client,
    api_base: String,
    corp_id: String,
    corp_secret: String,
    agent_id: i64,
    text_limit: usize,
    markdown_limit: usize,
    markdown_pause: Duration,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for WeComClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeComClient")
            .field("api_base", &self.api_base)
            .field("corp_id", &self.corp_id)
            .field("agent_id", &self.agent_id)
            .finish_non_exhaustive()
    }
}

impl WeComClient {
    /// Build a client from the `[wecom]` section (with the secret loaded).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Delivery` if the HTTP client cannot be built.
    pub fn new(config: &WeComConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AppError::Delivery(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            corp_id: config.corp_id.clone(),
            corp_secret: config.corp_secret.clone(),
            agent_id: config.agent_id,
            text_limit: config.text_limit_bytes,
            markdown_limit: config.markdown_limit_bytes,
            markdown_pause: Duration::from_millis(config.markdown_pause_ms),
            token: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/cgi-bin/{path}", self.api_base)
    }

    /// Current access token, fetching a new one when missing or near expiry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Delivery` when the token request fails or the API
    /// answers with a non-zero `errcode`.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let response: TokenResponse = self
            .http
            .get(self.endpoint("gettoken"))
            .query(&[("corpid", &self.corp_id), ("corpsecret", &self.corp_secret)])
            .send()
            .await
            .map_err(|err| AppError::Delivery(format!("token request failed: {err}")))?
            .json()
            .await
            .map_err(|err| AppError::Delivery(format!("malformed token response: {err}")))?;

        if response.errcode != 0 {
            return Err(AppError::Delivery(format!(
                "token request rejected ({}): {}",
                response.errcode, response.errmsg
            )));
        }
        let value = response
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::Delivery("token response without access_token".into()))?;

        let ttl = Duration::from_secs(response.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS));
        info!(ttl_secs = ttl.as_secs(), "refreshed wecom access token");
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn post_message(&self, payload: &Value) -> Result<()> {
        for attempt in 0..2 {
            let token = self.access_token().await?;
            let status: ApiStatus = self
                .http
                .post(self.endpoint("message/send"))
                .query(&[("access_token", token.as_str())])
                .json(payload)
                .send()
                .await
                .map_err(|err| AppError::Delivery(format!("message send failed: {err}")))?
                .json()
                .await
                .map_err(|err| AppError::Delivery(format!("malformed send response: {err}")))?;

            if status.errcode == 0 {
                return Ok(());
            }
            if attempt == 0 && TOKEN_ERRCODES.contains(&status.errcode) {
                warn!(errcode = status.errcode, "access token rejected, refreshing");
                self.invalidate_token().await;
                continue;
            }
            return Err(AppError::Delivery(format!(
                "message rejected ({}): {}",
                status.errcode, status.errmsg
            )));
        }
        Err(AppError::Delivery("message rejected after token refresh".into()))
    }

    fn message(&self, user_id: &str, msgtype: &str, body: Value) -> Value {
        let mut payload = json!({
            "touser": user_id,
            "msgtype": msgtype,
            "agentid": self.agent_id,
        });
        payload[msgtype] = body;
        payload
    }

    async fn deliver_text(&self, user_id: &str, content: &str) -> Result<()> {
        let parts = split_labelled(content, self.text_limit);
        debug!(user_id, parts = parts.len(), "sending text");
        for part in &parts {
            self.post_message(&self.message(user_id, "text", json!({ "content": part })))
                .await?;
        }
        Ok(())
    }

    async fn deliver_markdown(&self, user_id: &str, content: &str) -> Result<()> {
        let parts = split_markdown(content, self.markdown_limit);
        let total = parts.len();
        debug!(user_id, parts = total, "sending markdown");

        let mut delivered = 0_usize;
        for (index, part) in parts.iter().enumerate() {
            let payload = self.message(user_id, "markdown", json!({ "content": part }));
            match self.post_message(&payload).await {
                Ok(()) => delivered += 1,
                Err(err) => warn!(user_id, part = index + 1, total, %err, "markdown part failed"),
            }
            if total > 1 {
                tokio::time::sleep(self.markdown_pause).await;
            }
        }

        if total > 0 && delivered == 0 {
            return Err(AppError::Delivery(format!(
                "none of {total} markdown parts were delivered"
            )));
        }
        Ok(())
    }

    async fn upload(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload.bin".to_owned(), |n| n.to_string_lossy().into_owned());
        let token = self.access_token().await?;

        let form = Form::new().part("media", Part::bytes(bytes).file_name(file_name));
        let response: UploadResponse = self
            .http
            .post(self.endpoint("media/upload"))
            .query(&[("access_token", token.as_str()), ("type", "file")])
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(|err| AppError::Delivery(format!("upload failed: {err}")))?
            .json()
            .await
            .map_err(|err| AppError::Delivery(format!("malformed upload response: {err}")))?;

        if response.errcode != 0 {
            return Err(AppError::Delivery(format!(
                "upload rejected ({}): {}",
                response.errcode, response.errmsg
            )));
        }
        if response.media_id.is_empty() {
            return Err(AppError::Delivery("upload response without media_id".into()));
        }
        Ok(response.media_id)
    }
}

impl Messenger for WeComClient {
    fn send_text<'a>(&'a self, user_id: &'a str, content: &'a str) -> DeliveryFuture<'a, ()> {
        Box::pin(self.deliver_text(user_id, content))
    }

    fn send_markdown<'a>(
        &'a self,
        user_id: &'a str,
        content: &'a str,
    ) -> DeliveryFuture<'a, ()> {
        Box::pin(self.deliver_markdown(user_id, content))
    }

    fn upload_file<'a>(&'a self, path: &'a Path) -> DeliveryFuture<'a, String> {
        Box::pin(self.upload(path))
    }

    fn send_file<'a>(&'a self, user_id: &'a str, media_id: &'a str) -> DeliveryFuture<'a, ()> {
        Box::pin(async move {
            self.post_message(&self.message(user_id, "file", json!({ "media_id": media_id })))
                .await
        })
    }
}
