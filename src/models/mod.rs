//! Domain model module declarations.

pub mod knowledge;
pub mod message;
pub mod task;
pub mod video;
