#![forbid(unsafe_code)]

//! Chat bot that turns shared short-video links into enriched study notes.
//!
//! Inbound callbacks are deduplicated, grouped per user behind a debounce
//! window, and run through a draft → review → finalize AI pipeline. Results
//! are stored in a local knowledge base and delivered back in chunks.

pub mod ai;
pub mod config;
pub mod delivery;
pub mod errors;
pub mod links;
pub mod media;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod pipeline;
pub mod render;
pub mod video;
pub mod webhook;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
