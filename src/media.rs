//! Audio probing and segmentation.
//!
//! Long recordings exceed what the multimodal model accepts inline, so the
//! pipeline cuts them into fixed-length windows and transcribes each one.
//! [`FfmpegSegmenter`] shells out to `ffprobe`/`ffmpeg`; tests substitute an
//! in-process [`MediaSegmenter`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::{AppError, Result};

/// One window of a segmented recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentWindow {
    /// Zero-based position in chronological order.
    pub index: usize,
    /// Offset of the window start, in seconds.
    pub start_secs: u64,
    /// Requested window length, in seconds.
    pub length_secs: u64,
}

impl SegmentWindow {
    /// File name used for this window's audio.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("seg{:03}_{}.mp3", self.index, self.start_secs)
    }
}

/// Split a recording of `duration_secs` into consecutive windows of `window`.
///
/// Yields `ceil(duration / window)` windows; the last one may extend past the
/// end of the recording. A non-finite or non-positive duration yields none.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn plan_segments(duration_secs: f64, window: Duration) -> Vec<SegmentWindow> {
    let length_secs = window.as_secs();
    if length_secs == 0 || !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Vec::new();
    }

    let mut windows = Vec::new();
    let mut start_secs = 0_u64;
    while (start_secs as f64) < duration_secs {
        windows.push(SegmentWindow {
            index: windows.len(),
            start_secs,
            length_secs,
        });
        start_secs += length_secs;
    }
    windows
}

/// Probes and cuts audio files.
pub trait MediaSegmenter: Send + Sync {
    /// Duration of the recording at `audio`, in seconds.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Media` when the file cannot be probed.
    fn probe_duration<'a>(
        &'a self,
        audio: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<f64>> + Send + 'a>>;

    /// Write the `window` of `audio` to `output` as mp3.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Media` when the cut fails or produces no file.
    fn cut<'a>(
        &'a self,
        audio: &'a Path,
        window: SegmentWindow,
        output: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// [`MediaSegmenter`] backed by the `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegSegmenter {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegSegmenter {
    /// Use the given binaries (names are resolved through `PATH`).
    #[must_use]
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    async fn probe(&self, audio: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(audio)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| AppError::Media(format!("failed to run ffprobe: {err}")))?;

        if !output.status.success() {
            return Err(AppError::Media(format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }

    async fn run_cut(&self, audio: &Path, window: SegmentWindow, output: &Path) -> Result<()> {
        debug!(index = window.index, start = window.start_secs, "cutting audio segment");
        let status = Command::new(&self.ffmpeg)
            .arg("-ss")
            .arg(window.start_secs.to_string())
            .arg("-i")
            .arg(audio)
            .arg("-t")
            .arg(window.length_secs.to_string())
            .args(["-acodec", "libmp3lame", "-y"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|err| AppError::Media(format!("failed to run ffmpeg: {err}")))?;

        if !status.success() {
            return Err(AppError::Media(format!(
                "ffmpeg exited with {status} for segment {}",
                window.index
            )));
        }
        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(AppError::Media(format!(
                "segment {} was not written",
                window.index
            )));
        }
        Ok(())
    }
}

impl MediaSegmenter for FfmpegSegmenter {
    fn probe_duration<'a>(
        &'a self,
        audio: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<f64>> + Send + 'a>> {
        Box::pin(self.probe(audio))
    }

    fn cut<'a>(
        &'a self,
        audio: &'a Path,
        window: SegmentWindow,
        output: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.run_cut(audio, window, output))
    }
}

/// Parse the bare seconds value printed by `ffprobe`.
///
/// # Errors
///
/// Returns `AppError::Media` when the output is not a positive number.
pub fn parse_duration(raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::Media(format!("unparseable duration: {:?}", raw.trim())))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(AppError::Media(format!("invalid duration: {value}")))
    }
}
