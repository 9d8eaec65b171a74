//! Share-link resolution, download, and audio extraction.
//!
//! [`CommandVideoSource`] drives a yt-dlp compatible downloader and `ffmpeg`.
//! Every file it writes lives in the scratch directory and is named after the
//! content id, which is what [`VideoSource::cleanup`] keys on.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::models::video::VideoInfo;
use crate::{AppError, Result};

/// Boxed future returned by [`VideoSource`] methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fetches shared videos and prepares their audio.
pub trait VideoSource: Send + Sync {
    /// Resolve `share_url` and download the video.
    fn resolve_and_download<'a>(&'a self, share_url: &'a str)
        -> SourceFuture<'a, Result<VideoInfo>>;

    /// Extract an mp3 audio track from the downloaded video.
    fn extract_audio<'a>(&'a self, video: &'a VideoInfo) -> SourceFuture<'a, Result<PathBuf>>;

    /// Remove every temporary file derived from `video_id`. Best effort.
    fn cleanup<'a>(&'a self, video_id: &'a str) -> SourceFuture<'a, ()>;
}

#[derive(Debug, Deserialize)]
struct DownloadReport {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    creator: Option<String>,
    #[serde(default, rename = "_filename")]
    filename: Option<String>,
}

/// [`VideoSource`] backed by external command-line tools.
#[derive(Debug, Clone)]
pub struct CommandVideoSource {
    downloader: PathBuf,
    ffmpeg: PathBuf,
    temp_dir: PathBuf,
}

impl CommandVideoSource {
    /// Write into `temp_dir` using the given binaries.
    #[must_use]
    pub fn new(
        downloader: impl Into<PathBuf>,
        ffmpeg: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            downloader: downloader.into(),
            ffmpeg: ffmpeg.into(),
            temp_dir: temp_dir.into(),
        }
    }

    /// Scratch directory all files are written to.
    #[must_use]
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    async fn download(&self, share_url: &str) -> Result<VideoInfo> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let template = self.temp_dir.join("%(id)s.%(ext)s");

        info!(share_url, "downloading shared video");
        let output = Command::new(&self.downloader)
            .args(["-j", "--no-simulate", "--no-playlist", "--no-progress", "-o"])
            .arg(&template)
            .arg(share_url)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| AppError::Resolve(format!("failed to run downloader: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Resolve(format!(
                "downloader exited with {}: {}",
                output.status,
                last_line(&stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = parse_download_report(&stdout)?;
        let video_path = self.locate_download(&report).await?;
        debug!(video_id = %report.id, path = %video_path.display(), "video downloaded");

        Ok(VideoInfo {
            video_id: report.id,
            title: report.title,
            author: report.uploader.or(report.creator),
            video_path,
        })
    }

    async fn locate_download(&self, report: &DownloadReport) -> Result<PathBuf> {
        if let Some(name) = report.filename.as_deref() {
            let reported = PathBuf::from(name);
            if tokio::fs::try_exists(&reported).await.unwrap_or(false) {
                return Ok(reported);
            }
        }

        // Merged formats can change the extension after the report is printed.
        let prefix = format!("{}.", report.id);
        let mut entries = tokio::fs::read_dir(&self.temp_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                return Ok(entry.path());
            }
        }
        Err(AppError::Resolve(format!(
            "downloaded file for {} not found",
            report.id
        )))
    }

    async fn run_extract(&self, video: &VideoInfo) -> Result<PathBuf> {
        let audio_path = self.temp_dir.join(format!("{}_audio.mp3", video.video_id));
        let status = Command::new(&self.ffmpeg)
            .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(&video.video_path)
            .args(["-vn", "-acodec", "libmp3lame"])
            .arg(&audio_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|err| AppError::Media(format!("failed to run ffmpeg: {err}")))?;

        if !status.success() {
            return Err(AppError::Media(format!(
                "audio extraction exited with {status}"
            )));
        }
        Ok(audio_path)
    }

    async fn remove_derived(&self, video_id: &str) {
        if !is_safe_id(video_id) {
            warn!(video_id, "refusing to clean up unsafe content id");
            return;
        }
        let mut entries = match tokio::fs::read_dir(&self.temp_dir).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(video_id, %err, "cannot list scratch directory");
                return;
            }
        };

        let mut removed = 0_usize;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn!(video_id, %err, "scratch listing interrupted");
                    break;
                }
            };
            if !is_derived_name(&entry.file_name().to_string_lossy(), video_id) {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(err) => warn!(path = %entry.path().display(), %err, "failed to remove file"),
            }
        }
        debug!(video_id, removed, "temporary files removed");
    }
}

impl VideoSource for CommandVideoSource {
    fn resolve_and_download<'a>(
        &'a self,
        share_url: &'a str,
    ) -> SourceFuture<'a, Result<VideoInfo>> {
        Box::pin(self.download(share_url))
    }

    fn extract_audio<'a>(&'a self, video: &'a VideoInfo) -> SourceFuture<'a, Result<PathBuf>> {
        Box::pin(self.run_extract(video))
    }

    fn cleanup<'a>(&'a self, video_id: &'a str) -> SourceFuture<'a, ()> {
        Box::pin(self.remove_derived(video_id))
    }
}

/// Parse the JSON line the downloader prints for the fetched video.
fn parse_download_report(stdout: &str) -> Result<DownloadReport> {
    let line = stdout
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with('{'))
        .ok_or_else(|| AppError::Resolve("downloader printed no metadata".into()))?;
    let report: DownloadReport = serde_json::from_str(line)
        .map_err(|err| AppError::Resolve(format!("malformed downloader metadata: {err}")))?;
    if !is_safe_id(&report.id) {
        return Err(AppError::Resolve(format!("unusable content id {:?}", report.id)));
    }
    Ok(report)
}

/// Content ids become file-name prefixes.
fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// `{id}.ext` or `{id}_suffix`, but not another id sharing the prefix.
fn is_derived_name(file_name: &str, video_id: &str) -> bool {
    file_name
        .strip_prefix(video_id)
        .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('_'))
}

fn last_line(text: &str) -> &str {
    text.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}
