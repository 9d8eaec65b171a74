//! AI backend access.
//!
//! The pipeline talks to three logically distinct chat endpoints and one
//! speech-to-text endpoint through the [`ChatBackend`] and [`SpeechToText`]
//! traits, so stages can be exercised against in-process fakes.

pub mod client;
pub mod types;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use crate::Result;

use self::types::{ChatRequest, ResponseContent};

/// A chat-completion endpoint.
pub trait ChatBackend: Send + Sync {
    /// Send `request` and return the first choice's content.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Ai`](crate::AppError::Ai) on network failure,
    /// non-2xx status, timeout, or a malformed body.
    fn complete(
        &self,
        request: ChatRequest,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<ResponseContent>> + Send + '_>>;
}

/// A speech-to-text endpoint.
pub trait SpeechToText: Send + Sync {
    /// Transcribe the audio file at `audio`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Ai`](crate::AppError::Ai) when the service fails
    /// or [`AppError::Io`](crate::AppError::Io) when the file cannot be read.
    fn transcribe<'a>(
        &'a self,
        audio: &'a Path,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}
