//! Callback payload decoding.
//!
//! The platform can sign and encrypt callbacks. The scheme is pluggable
//! through [`CallbackCodec`]; [`PlaintextCodec`] accepts unencrypted
//! callbacks unchanged.

use serde::Deserialize;

use crate::{AppError, Result};

/// Query parameters the platform attaches to every callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackQuery {
    /// Signature over token, timestamp, nonce, and payload.
    #[serde(default)]
    pub msg_signature: String,
    /// Request timestamp.
    #[serde(default)]
    pub timestamp: String,
    /// Request nonce.
    #[serde(default)]
    pub nonce: String,
    /// Challenge sent during URL verification.
    #[serde(default)]
    pub echostr: Option<String>,
}

/// Verifies and decodes callbacks.
pub trait CallbackCodec: Send + Sync {
    /// Answer a URL-verification challenge, returning the text to echo.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Webhook` when the challenge does not verify.
    fn verify_url(&self, query: &CallbackQuery, echostr: &str) -> Result<String>;

    /// Decode a callback body into the inner message XML.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Webhook` when the body does not verify or decode.
    fn decrypt(&self, query: &CallbackQuery, body: &str) -> Result<String>;
}

/// Codec for callbacks delivered without encryption.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextCodec;

impl CallbackCodec for PlaintextCodec {
    fn verify_url(&self, _query: &CallbackQuery, echostr: &str) -> Result<String> {
        if echostr.is_empty() {
            return Err(AppError::Webhook("empty echostr".into()));
        }
        Ok(echostr.to_owned())
    }

    fn decrypt(&self, _query: &CallbackQuery, body: &str) -> Result<String> {
        if body.trim().is_empty() {
            return Err(AppError::Webhook("empty callback body".into()));
        }
        Ok(body.to_owned())
    }
}
