//! Stage 1: transcribe the recording and write the draft note.

use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, info, warn};

use crate::ai::types::{ChatMessage, ContentPart, InputAudio};
use crate::media::plan_segments;
use crate::models::video::VideoMeta;
use crate::{AppError, Result};

use super::fallback::FallbackChain;
use super::prompts::{build_context, transcript_prompt, DRAFT_SYSTEM, TRANSCRIBE_INSTRUCTION};
use super::{SummaryPipeline, DEFAULT_CHAT_TIMEOUT};

const MULTIMODAL_DRAFT_TIMEOUT: Duration = Duration::from_secs(240);
const TRANSCRIPTION_TEMPERATURE: f32 = 0.1;
const AUDIO_FORMAT: &str = "mp3";

/// Draft note for `audio`.
///
/// Audio within the inline limit is sent to the multimodal model directly,
/// falling back to transcript-then-summarize. Larger audio is transcribed in
/// segments.
///
/// # Errors
///
/// Returns `AppError::Exhausted` when every strategy failed, or
/// `AppError::Media`/`AppError::Io` when the audio cannot be inspected.
pub async fn transcribe_and_draft(
    pipeline: &SummaryPipeline,
    audio: &Path,
    meta: &VideoMeta,
    requirement: Option<&str>,
) -> Result<String> {
    let context = build_context(meta, requirement);
    let size = tokio::fs::metadata(audio).await?.len();

    if size > pipeline.settings.inline_audio_limit_bytes {
        info!(
            size,
            limit = pipeline.settings.inline_audio_limit_bytes,
            "audio exceeds inline limit, transcribing in segments"
        );
        return segmented_draft(pipeline, audio, &context).await;
    }

    let context = context.as_str();
    FallbackChain::<String>::new("draft")
        .then("multimodal-draft", move || {
            Box::pin(multimodal_draft(pipeline, audio, context))
        })
        .then("transcript-then-summarize", move || {
            Box::pin(async move {
                let transcript = transcribe(pipeline, audio).await?;
                summarize_transcript(pipeline, context, &transcript).await
            })
        })
        .run()
        .await
}

/// Plain transcript of `audio`: speech-to-text, then the multimodal model.
///
/// # Errors
///
/// Returns `AppError::Exhausted` when both strategies failed.
pub async fn transcribe(pipeline: &SummaryPipeline, audio: &Path) -> Result<String> {
    FallbackChain::<String>::new("transcribe")
        .then("speech-to-text", move || {
            pipeline.backends.speech.transcribe(audio)
        })
        .then("multimodal-transcription", move || {
            Box::pin(multimodal_transcription(pipeline, audio))
        })
        .run()
        .await
}

async fn multimodal_draft(pipeline: &SummaryPipeline, audio: &Path, context: &str) -> Result<String> {
    let model = &pipeline.backends.transcription;
    let request = model.request(vec![
        ChatMessage::system(DRAFT_SYSTEM),
        ChatMessage::user_parts(vec![
            audio_part(audio).await?,
            ContentPart::Text {
                text: context.to_owned(),
            },
        ]),
    ]);
    model.complete(request, MULTIMODAL_DRAFT_TIMEOUT).await
}

async fn multimodal_transcription(pipeline: &SummaryPipeline, audio: &Path) -> Result<String> {
    let model = &pipeline.backends.transcription;
    let request = model
        .request(vec![ChatMessage::user_parts(vec![
            audio_part(audio).await?,
            ContentPart::Text {
                text: TRANSCRIBE_INSTRUCTION.to_owned(),
            },
        ])])
        .temperature(TRANSCRIPTION_TEMPERATURE);
    model.complete(request, DEFAULT_CHAT_TIMEOUT).await
}

async fn summarize_transcript(
    pipeline: &SummaryPipeline,
    context: &str,
    transcript: &str,
) -> Result<String> {
    let model = &pipeline.backends.transcription;
    let request = model.request(vec![
        ChatMessage::system(DRAFT_SYSTEM),
        ChatMessage::user(transcript_prompt(context, transcript)),
    ]);
    model.complete(request, DEFAULT_CHAT_TIMEOUT).await
}

async fn segmented_draft(pipeline: &SummaryPipeline, audio: &Path, context: &str) -> Result<String> {
    let duration = pipeline.segmenter.probe_duration(audio).await?;
    let windows = plan_segments(duration, pipeline.settings.segment_length);
    info!(duration, segments = windows.len(), "planned audio segments");

    let scratch_parent = audio.parent().unwrap_or_else(|| Path::new("."));
    let scratch = tempfile::Builder::new()
        .prefix("segments-")
        .tempdir_in(scratch_parent)?;

    let mut transcripts = Vec::with_capacity(windows.len());
    for window in &windows {
        let segment = scratch.path().join(window.file_name());
        let outcome = match pipeline.segmenter.cut(audio, *window, &segment).await {
            Ok(()) => transcribe(pipeline, &segment).await,
            Err(err) => Err(err),
        };

        if let Err(err) = tokio::fs::remove_file(&segment).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(index = window.index, %err, "failed to remove segment file");
            }
        }

        match outcome {
            Ok(text) => {
                debug!(index = window.index, chars = text.chars().count(), "segment transcribed");
                transcripts.push(text);
            }
            Err(err) => warn!(index = window.index, %err, "segment skipped"),
        }
    }

    if transcripts.is_empty() {
        return Err(AppError::Media(format!(
            "none of {} audio segments could be transcribed",
            windows.len()
        )));
    }

    let transcript = transcripts.join("\n");
    summarize_transcript(pipeline, context, &transcript).await
}

async fn audio_part(audio: &Path) -> Result<ContentPart> {
    let bytes = tokio::fs::read(audio).await?;
    Ok(ContentPart::InputAudio {
        input_audio: InputAudio {
            data: STANDARD.encode(bytes),
            format: AUDIO_FORMAT.to_owned(),
        },
    })
}
