//! Crate-wide error type.

use std::fmt::{Display, Formatter};

/// Result alias used throughout the bot.
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure raised anywhere between the webhook and delivery.
#[derive(Debug)]
pub enum AppError {
    /// Config file unreadable, malformed, or failing validation.
    Config(String),
    /// AI backend failure (network, non-2xx status, malformed response).
    Ai(String),
    /// Audio probing, segmentation, or extraction failure.
    Media(String),
    /// Outbound message delivery or upload failure.
    Delivery(String),
    /// Knowledge-base storage failure.
    Db(String),
    /// Share link could not be resolved or the video could not be fetched.
    Resolve(String),
    /// Document rendering failure.
    Render(String),
    /// Inbound callback could not be decoded or verified.
    Webhook(String),
    /// Every strategy of a fallback chain failed.
    Exhausted(String),
    /// Local file or process I/O failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Ai(msg) => write!(f, "ai: {msg}"),
            Self::Media(msg) => write!(f, "media: {msg}"),
            Self::Delivery(msg) => write!(f, "delivery: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Resolve(msg) => write!(f, "resolve: {msg}"),
            Self::Render(msg) => write!(f, "render: {msg}"),
            Self::Webhook(msg) => write!(f, "webhook: {msg}"),
            Self::Exhausted(msg) => write!(f, "all strategies failed: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
