//! HTTP client for OpenAI-compatible chat and transcription endpoints.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::{AppError, Result};

use super::types::{ChatCompletion, ChatRequest, ResponseContent};
use super::{ChatBackend, SpeechToText};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// One logical AI endpoint: base URL plus the key issued for it.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    label: String,
}

impl std::fmt::Debug for OpenAiCompatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatClient")
            .field("api_base", &self.api_base)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatClient {
    /// Build a client for `api_base` authenticated with `api_key`.
    ///
    /// `label` names the endpoint in logs and error messages.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Ai` if the HTTP client cannot be constructed.
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|err| AppError::Ai(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_owned(),
            api_key: api_key.into(),
            label: label.into(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn transcription_url(&self) -> String {
        format!("{}/audio/transcriptions", self.api_base)
    }

    async fn post_chat(&self, request: &ChatRequest, timeout: Duration) -> Result<ResponseContent> {
        debug!(endpoint = %self.label, model = %request.model, "chat completion request");
        let response = self
            .http
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|err| AppError::Ai(format!("{} request failed: {err}", self.label)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Ai(format!(
                "{} returned {status}: {}",
                self.label,
                truncate(&body, 300)
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|err| AppError::Ai(format!("{} sent malformed body: {err}", self.label)))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::Ai(format!("{} returned no choices", self.label)))
    }

    async fn post_transcription(
        &self,
        audio: &Path,
        model: &str,
        language: &str,
        timeout: Duration,
    ) -> Result<String> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map_or_else(|| "audio.mp3".to_owned(), |n| n.to_string_lossy().into_owned());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|err| AppError::Ai(format!("invalid audio mime type: {err}")))?;
        let form = Form::new()
            .part("file", part)
            .text("model", model.to_owned())
            .text("language", language.to_owned());

        debug!(endpoint = %self.label, model, "speech-to-text request");
        let response = self
            .http
            .post(self.transcription_url())
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|err| AppError::Ai(format!("{} transcription failed: {err}", self.label)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| AppError::Ai(format!("{} transcription body: {err}", self.label)))?;
        if !status.is_success() {
            return Err(AppError::Ai(format!(
                "{} transcription returned {status}: {}",
                self.label,
                truncate(&body, 300)
            )));
        }

        Ok(transcript_from_body(&body))
    }
}

impl ChatBackend for OpenAiCompatClient {
    fn complete(
        &self,
        request: ChatRequest,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<ResponseContent>> + Send + '_>> {
        Box::pin(async move { self.post_chat(&request, timeout).await })
    }
}

/// Speech-to-text over the `/audio/transcriptions` endpoint.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    client: OpenAiCompatClient,
    model: String,
    language: String,
    timeout: Duration,
}

impl WhisperTranscriber {
    /// Wrap `client` with the model and language hint to request.
    #[must_use]
    pub fn new(client: OpenAiCompatClient, model: String, language: String, timeout: Duration) -> Self {
        Self {
            client,
            model,
            language,
            timeout,
        }
    }
}

impl SpeechToText for WhisperTranscriber {
    fn transcribe<'a>(
        &'a self,
        audio: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            self.client
                .post_transcription(audio, &self.model, &self.language, self.timeout)
                .await
        })
    }
}

/// Accept both the JSON (`{"text": ...}`) and plain-text response formats.
pub(crate) fn transcript_from_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("text").and_then(|t| t.as_str()).map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_owned())
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
