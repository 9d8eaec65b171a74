//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keychain service name under which secrets are looked up.
pub const KEYRING_SERVICE: &str = "clip-digest";

/// WeCom application-message settings.
///
/// The corp secret is loaded at runtime via OS keychain or environment
/// variables, never from the TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WeComConfig {
    /// Enterprise (corp) identifier.
    pub corp_id: String,
    /// Application agent identifier used on every outbound message.
    pub agent_id: i64,
    /// Base URL of the WeCom API.
    #[serde(default = "default_wecom_api_base")]
    pub api_base: String,
    /// Byte limit for a single text message.
    #[serde(default = "default_text_limit")]
    pub text_limit_bytes: usize,
    /// Byte limit for a single markdown message.
    #[serde(default = "default_markdown_limit")]
    pub markdown_limit_bytes: usize,
    /// Pause between consecutive markdown parts.
    #[serde(default = "default_markdown_pause_ms")]
    pub markdown_pause_ms: u64,
    /// Application secret (populated at runtime).
    #[serde(skip)]
    pub corp_secret: String,
}

fn default_wecom_api_base() -> String {
    "https://qyapi.weixin.qq.com".into()
}

fn default_text_limit() -> usize {
    2000
}

fn default_markdown_limit() -> usize {
    1800
}

fn default_markdown_pause_ms() -> u64 {
    200
}

/// Model selection for one logical AI endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ModelConfig {
    /// Model name sent in the request body.
    pub model: String,
    /// Bearer key for this endpoint (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

/// AI backend settings for the three pipeline stages.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AiConfig {
    /// OpenAI-compatible API base, e.g. `https://api.example.com/v1`.
    pub api_base: String,
    /// Multimodal transcription + draft model (stage 1).
    pub transcription: ModelConfig,
    /// Critical review model (stage 2).
    pub review: ModelConfig,
    /// Web-search capable enrichment model (stage 3).
    pub enrichment: ModelConfig,
    /// Speech-to-text model used by the transcript fallback.
    #[serde(default = "default_speech_model")]
    pub speech_model: String,
    /// Language hint passed to speech-to-text.
    #[serde(default = "default_speech_language")]
    pub speech_language: String,
}

fn default_speech_model() -> String {
    "whisper-1".into()
}

fn default_speech_language() -> String {
    "zh".into()
}

/// Per-user conversation timing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// Wait after a link before processing starts automatically.
    #[serde(default = "default_debounce_seconds")]
    pub debounce_seconds: u64,
    /// How long an inbound message key is remembered for deduplication.
    #[serde(default = "default_dedup_ttl_seconds")]
    pub dedup_ttl_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_seconds: default_debounce_seconds(),
            dedup_ttl_seconds: default_dedup_ttl_seconds(),
        }
    }
}

fn default_debounce_seconds() -> u64 {
    120
}

fn default_dedup_ttl_seconds() -> u64 {
    300
}

/// Summarization pipeline tuning.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Largest audio file sent inline to the multimodal model.
    #[serde(default = "default_inline_audio_limit")]
    pub inline_audio_limit_bytes: u64,
    /// Segment length used when the audio is too large to inline.
    #[serde(default = "default_segment_seconds")]
    pub segment_seconds: u64,
    /// Relay stage progress messages to the requesting user.
    #[serde(default)]
    pub notify_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inline_audio_limit_bytes: default_inline_audio_limit(),
            segment_seconds: default_segment_seconds(),
            notify_progress: false,
        }
    }
}

fn default_inline_audio_limit() -> u64 {
    24 * 1024 * 1024
}

fn default_segment_seconds() -> u64 {
    600
}

/// External command-line tools used by the default adapters.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ToolsConfig {
    /// Video downloader binary (yt-dlp compatible).
    #[serde(default = "default_downloader")]
    pub downloader: String,
    /// `ffmpeg` binary.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    /// `ffprobe` binary.
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
    /// Markdown-to-PDF converter; PDF delivery is disabled when absent.
    #[serde(default)]
    pub pdf_renderer: Option<String>,
    /// Extra arguments passed to the PDF converter.
    #[serde(default)]
    pub pdf_renderer_args: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            downloader: default_downloader(),
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            pdf_renderer: None,
            pdf_renderer_args: Vec::new(),
        }
    }
}

fn default_downloader() -> String {
    "yt-dlp".into()
}

fn default_ffmpeg() -> String {
    "ffmpeg".into()
}

fn default_ffprobe() -> String {
    "ffprobe".into()
}

fn default_http_host() -> String {
    "0.0.0.0".into()
}

fn default_http_port() -> u16 {
    8000
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Scratch directory for downloads, audio, segments, and PDFs.
    pub temp_dir: PathBuf,
    /// `SQLite` file holding the knowledge base.
    pub db_path: PathBuf,
    /// Bind address for the webhook server.
    #[serde(default = "default_http_host")]
    pub http_host: String,
    /// Bind port for the webhook server.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Messaging channel settings.
    pub wecom: WeComConfig,
    /// AI backend settings.
    pub ai: AiConfig,
    /// Conversation timing.
    #[serde(default)]
    pub session: SessionConfig,
    /// Pipeline tuning.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// External tools.
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load secrets from OS keychain with env-var fallback.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if neither keychain nor env vars provide
    /// a required secret.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.wecom.corp_secret = load_credential("wecom_corp_secret", "WECOM_CORP_SECRET").await?;
        self.ai.transcription.api_key =
            load_credential("transcription_api_key", "TRANSCRIPTION_API_KEY").await?;
        self.ai.review.api_key = load_credential("review_api_key", "REVIEW_API_KEY").await?;
        self.ai.enrichment.api_key =
            load_credential("enrichment_api_key", "ENRICHMENT_API_KEY").await?;
        Ok(())
    }

    /// Debounce window as a [`Duration`].
    #[must_use]
    pub fn debounce_window(&self) -> Duration {
        Duration::from_secs(self.session.debounce_seconds)
    }

    /// Deduplication TTL as a [`Duration`].
    #[must_use]
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.session.dedup_ttl_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.session.debounce_seconds == 0 {
            return Err(AppError::Config(
                "session.debounce_seconds must be greater than zero".into(),
            ));
        }

        if self.session.dedup_ttl_seconds == 0 {
            return Err(AppError::Config(
                "session.dedup_ttl_seconds must be greater than zero".into(),
            ));
        }

        if self.pipeline.segment_seconds == 0 {
            return Err(AppError::Config(
                "pipeline.segment_seconds must be greater than zero".into(),
            ));
        }

        if self.wecom.text_limit_bytes < 64 || self.wecom.markdown_limit_bytes < 64 {
            return Err(AppError::Config(
                "wecom message limits must be at least 64 bytes".into(),
            ));
        }

        if self.ai.api_base.trim().is_empty() {
            return Err(AppError::Config("ai.api_base must not be empty".into()));
        }

        for (name, model) in [
            ("transcription", &self.ai.transcription),
            ("review", &self.ai.review),
            ("enrichment", &self.ai.enrichment),
        ] {
            if model.model.trim().is_empty() {
                return Err(AppError::Config(format!("ai.{name}.model must not be empty")));
            }
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    env::var(env_key)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::Config(format!(
                "credential {keyring_key} not found in keychain or {env_key} env var"
            ))
        })
}
