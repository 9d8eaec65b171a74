//! Three-stage summarization pipeline.
//!
//! 1. **Draft**: transcribe the audio and write a structured note
//!    ([`draft`]), with fallbacks and a segmented path for long recordings.
//! 2. **Review**: critical audit of the draft ([`review`]).
//! 3. **Finalize**: search-backed rewrite into the deliverable
//!    ([`finalize`]).
//!
//! Stage 1 absorbs failures through its fallback chains; a failure in stage 2
//! or 3 aborts the run. No partial result is ever returned.

pub mod draft;
pub mod fallback;
pub mod finalize;
pub mod prompts;
pub mod review;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, info_span, Instrument};

use crate::ai::types::{ChatMessage, ChatRequest};
use crate::ai::{ChatBackend, SpeechToText};
use crate::config::PipelineConfig;
use crate::media::MediaSegmenter;
use crate::models::video::VideoMeta;
use crate::{AppError, Result};

/// Timeout of a chat call without a stage-specific override.
pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(180);

/// Progress message sent before stage 1.
pub const PROGRESS_DRAFT: &str = "🔬 [1/3] 转写音频并生成初稿...";
/// Progress message sent before stage 2.
pub const PROGRESS_REVIEW: &str = "🧠 [2/3] 深度审视初稿...";
/// Progress message sent before stage 3.
pub const PROGRESS_FINALIZE: &str = "🌐 [3/3] 联网搜索生成终稿...";
/// Progress message sent after stage 3.
pub const PROGRESS_DONE: &str = "✅ 处理完成";

/// Receives human-readable progress updates.
pub trait ProgressSink: Send + Sync {
    /// Report `message`. Implementations swallow their own failures.
    fn notify<'a>(&'a self, message: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// [`ProgressSink`] that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn notify<'a>(&'a self, message: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            info!(message, "pipeline progress");
        })
    }
}

/// A chat backend bound to the model it should be asked for.
#[derive(Clone)]
pub struct StageModel {
    backend: Arc<dyn ChatBackend>,
    model: String,
}

impl std::fmt::Debug for StageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageModel")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl StageModel {
    /// Bind `backend` to `model`.
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request for this model with the default limits.
    #[must_use]
    pub fn request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest::new(self.model.clone(), messages)
    }

    /// Send `request` and return its text.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or `AppError::Ai` when the response holds
    /// no text.
    pub async fn complete(&self, request: ChatRequest, timeout: Duration) -> Result<String> {
        let text = self.backend.complete(request, timeout).await?.into_text();
        if text.trim().is_empty() {
            return Err(AppError::Ai(format!("{} returned no text", self.model)));
        }
        Ok(text)
    }
}

/// Backends used by the pipeline.
#[derive(Clone)]
pub struct PipelineBackends {
    /// Stage 1 multimodal model.
    pub transcription: StageModel,
    /// Stage 2 review model.
    pub review: StageModel,
    /// Stage 3 web-search capable model.
    pub enrichment: StageModel,
    /// Speech-to-text used by the transcript fallback and segmented path.
    pub speech: Arc<dyn SpeechToText>,
}

/// Tunables of stage 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Largest audio file sent inline.
    pub inline_audio_limit_bytes: u64,
    /// Window length of the segmented path.
    pub segment_length: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            inline_audio_limit_bytes: config.inline_audio_limit_bytes,
            segment_length: Duration::from_secs(config.segment_seconds),
        }
    }
}

/// Draft → review → final note.
pub struct SummaryPipeline {
    backends: PipelineBackends,
    segmenter: Arc<dyn MediaSegmenter>,
    settings: PipelineSettings,
}

impl SummaryPipeline {
    /// Assemble a pipeline.
    #[must_use]
    pub fn new(
        backends: PipelineBackends,
        segmenter: Arc<dyn MediaSegmenter>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            backends,
            segmenter,
            settings,
        }
    }

    /// Produce the final markdown note for the recording at `audio`.
    ///
    /// `progress` is notified before each stage and after completion.
    ///
    /// # Errors
    ///
    /// Returns the first fatal stage error: `AppError::Exhausted` or
    /// `AppError::Media` from stage 1, or the backend error of stage 2 or 3.
    pub async fn run(
        &self,
        audio: &Path,
        meta: &VideoMeta,
        requirement: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<String> {
        progress.notify(PROGRESS_DRAFT).await;
        let draft = draft::transcribe_and_draft(self, audio, meta, requirement)
            .instrument(info_span!("pipeline_stage", stage = "draft"))
            .await?;
        info!(chars = draft.chars().count(), "draft ready");

        progress.notify(PROGRESS_REVIEW).await;
        let review = review::critical_review(&self.backends.review, &draft)
            .instrument(info_span!("pipeline_stage", stage = "review"))
            .await?;
        info!(chars = review.chars().count(), "review ready");

        progress.notify(PROGRESS_FINALIZE).await;
        let final_note =
            finalize::enrich_and_finalize(&self.backends.enrichment, &draft, &review, requirement)
                .instrument(info_span!("pipeline_stage", stage = "finalize"))
                .await?;
        info!(chars = final_note.chars().count(), "final note ready");

        progress.notify(PROGRESS_DONE).await;
        Ok(final_note)
    }
}
