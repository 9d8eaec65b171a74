//! Task orchestration: deduplication, per-user lifecycle, and execution.

pub mod debounce;
pub mod dedup;
pub mod dispatcher;
pub mod registry;
pub mod task_manager;
pub mod task_runner;
