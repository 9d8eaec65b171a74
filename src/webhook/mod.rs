//! Inbound callback handling.

pub mod codec;
pub mod server;
pub mod xml;
