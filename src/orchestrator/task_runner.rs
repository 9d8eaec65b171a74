//! Execution of a claimed task.
//!
//! [`SummaryTaskRunner`] resolves the shared link, runs the summarization
//! pipeline, stores the result, and delivers it. It records the resolved
//! content id in a [`ContentSlot`] as soon as it is known so the caller can
//! clean up temporary files even when the run fails later.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::delivery::{replies, Messenger};
use crate::models::knowledge::{extract_tags_from_markdown, generate_video_code, KnowledgeEntry};
use crate::models::task::ClaimedTask;
use crate::models::video::VideoMeta;
use crate::persistence::KnowledgeStore;
use crate::pipeline::{ProgressSink, SummaryPipeline, TracingProgress};
use crate::render::DocumentRenderer;
use crate::video::VideoSource;
use crate::Result;

/// Content id resolved during a run, shared with the cleanup step.
#[derive(Debug, Clone, Default)]
pub struct ContentSlot(Arc<Mutex<Option<String>>>);

impl ContentSlot {
    /// Empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the resolved content id.
    pub fn set(&self, content_id: impl Into<String>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(content_id.into());
    }

    /// Resolved content id, if any.
    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Work performed once a task enters `Processing`.
pub trait TaskExecutor: Send + Sync {
    /// Run `task` end to end, recording the content id in `content`.
    ///
    /// # Errors
    ///
    /// Any error aborts the run; the caller reports it to the user.
    fn execute<'a>(
        &'a self,
        task: &'a ClaimedTask,
        content: &'a ContentSlot,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Remove temporary artifacts of `content_id`. Best effort.
    fn cleanup<'a>(&'a self, content_id: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// [`ProgressSink`] relaying progress to the requesting user.
pub struct MessengerProgress {
    messenger: Arc<dyn Messenger>,
    user_id: String,
}

impl MessengerProgress {
    /// Relay to `user_id` through `messenger`.
    #[must_use]
    pub fn new(messenger: Arc<dyn Messenger>, user_id: impl Into<String>) -> Self {
        Self {
            messenger,
            user_id: user_id.into(),
        }
    }
}

impl ProgressSink for MessengerProgress {
    fn notify<'a>(&'a self, message: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if let Err(err) = self.messenger.send_text(&self.user_id, message).await {
                warn!(user_id = %self.user_id, %err, "failed to relay progress");
            }
        })
    }
}

/// Collaborators of [`SummaryTaskRunner`].
#[derive(Clone)]
pub struct RunnerDeps {
    /// Link resolution and audio extraction.
    pub source: Arc<dyn VideoSource>,
    /// Summarization pipeline.
    pub pipeline: Arc<SummaryPipeline>,
    /// Knowledge-base sink.
    pub store: Arc<dyn KnowledgeStore>,
    /// PDF renderer.
    pub renderer: Arc<dyn DocumentRenderer>,
    /// Outbound channel.
    pub messenger: Arc<dyn Messenger>,
}

/// Production [`TaskExecutor`].
pub struct SummaryTaskRunner {
    deps: RunnerDeps,
    temp_dir: PathBuf,
    notify_progress: bool,
}

impl SummaryTaskRunner {
    /// Build a runner writing rendered documents to `temp_dir`.
    #[must_use]
    pub fn new(deps: RunnerDeps, temp_dir: impl Into<PathBuf>, notify_progress: bool) -> Self {
        Self {
            deps,
            temp_dir: temp_dir.into(),
            notify_progress,
        }
    }

    fn document_path(&self, content_id: &str) -> PathBuf {
        self.temp_dir.join(format!("{content_id}_summary.pdf"))
    }

    async fn run(&self, task: &ClaimedTask, content: &ContentSlot) -> Result<()> {
        let deps = &self.deps;
        let video = deps.source.resolve_and_download(&task.share_url).await?;
        content.set(video.video_id.clone());
        info!(video_id = %video.video_id, "video resolved");

        let audio = deps.source.extract_audio(&video).await?;
        let meta = VideoMeta::from(&video);
        let video_code = generate_video_code();

        let announcement = replies::video_info(&meta.title, &meta.author, &video_code);
        if let Err(err) = deps.messenger.send_text(&task.user_id, &announcement).await {
            warn!(%err, "failed to announce video");
        }

        let requirement = task.requirement.as_deref();
        let summary = if self.notify_progress {
            let progress = MessengerProgress::new(Arc::clone(&deps.messenger), &task.user_id);
            deps.pipeline.run(&audio, &meta, requirement, &progress).await?
        } else {
            deps.pipeline
                .run(&audio, &meta, requirement, &TracingProgress)
                .await?
        };

        let entry = KnowledgeEntry {
            video_id: video.video_id.clone(),
            title: meta.title.clone(),
            author: meta.author.clone(),
            source_url: task.share_url.clone(),
            tags: extract_tags_from_markdown(&summary),
            summary_markdown: summary,
            user_requirement: requirement.unwrap_or_default().to_owned(),
            video_code,
            created_at: Utc::now(),
        };
        if let Err(err) = deps.store.save(&entry).await {
            error!(%err, video_code = %entry.video_code, "failed to store summary");
        }

        self.deliver(&task.user_id, &video.video_id, &entry.summary_markdown)
            .await?;
        info!(title = %meta.title, "task delivered");
        Ok(())
    }

    async fn deliver(&self, user_id: &str, content_id: &str, summary: &str) -> Result<()> {
        match self.deliver_document(user_id, content_id, summary).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(%err, "document delivery failed, sending markdown");
                let messenger = &self.deps.messenger;
                messenger.send_text(user_id, replies::PDF_FALLBACK).await?;
                messenger.send_markdown(user_id, summary).await
            }
        }
    }

    async fn deliver_document(&self, user_id: &str, content_id: &str, summary: &str) -> Result<()> {
        let path = self.document_path(content_id);
        self.deps.renderer.render(summary, &path).await?;
        let media_id = self.deps.messenger.upload_file(&path).await?;
        self.deps.messenger.send_file(user_id, &media_id).await
    }

    async fn remove_artifacts(&self, content_id: &str) {
        self.deps.source.cleanup(content_id).await;
        let document = self.document_path(content_id);
        if let Err(err) = tokio::fs::remove_file(&document).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %document.display(), %err, "failed to remove document");
            }
        }
    }
}

impl TaskExecutor for SummaryTaskRunner {
    fn execute<'a>(
        &'a self,
        task: &'a ClaimedTask,
        content: &'a ContentSlot,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.run(task, content))
    }

    fn cleanup<'a>(&'a self, content_id: &'a str) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(self.remove_artifacts(content_id))
    }
}
