//! Outbound delivery to the messaging channel.
//!
//! [`Messenger`] is the capability the rest of the service sends through;
//! [`wecom::WeComClient`] is the production implementation.

pub mod chunk;
pub mod replies;
pub mod wecom;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::Result;

/// Boxed future returned by [`Messenger`] methods.
pub type DeliveryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Sends messages and files to a user.
pub trait Messenger: Send + Sync {
    /// Send plain text, split and labelled to fit the channel limit.
    fn send_text<'a>(&'a self, user_id: &'a str, content: &'a str) -> DeliveryFuture<'a, ()>;

    /// Send markdown, split on line boundaries.
    fn send_markdown<'a>(&'a self, user_id: &'a str, content: &'a str)
        -> DeliveryFuture<'a, ()>;

    /// Upload `path` as a temporary file and return its media id.
    fn upload_file<'a>(&'a self, path: &'a Path) -> DeliveryFuture<'a, String>;

    /// Send a previously uploaded file.
    fn send_file<'a>(&'a self, user_id: &'a str, media_id: &'a str) -> DeliveryFuture<'a, ()>;
}
