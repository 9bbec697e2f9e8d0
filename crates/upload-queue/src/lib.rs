//! Multi-file upload queue for the LanSend upload service.
//!
//! This crate implements the **client-side orchestration** of uploads. It
//! is a library crate with no UI: the host enqueues files, starts a drain,
//! and renders the published [`TransferSnapshot`] and [`QueueEvent`]s.
//!
//! # Pipeline
//!
//! 1. **Enqueue**: files join a FIFO and the aggregate totals at once
//! 2. **Drain**: single-flight; files go one at a time
//! 3. **Upload**: small files in one request, large files through the
//!    [`ChunkPool`] (init, concurrent chunks, complete)
//! 4. **Finish**: refresh hook, settle delay, completion notice, reset

pub mod aggregate;
pub mod config;
pub mod pool;
pub mod queue;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience.
pub use aggregate::{AggregateState, format_file_size};
pub use config::{ConfigError, UploadSettings};
pub use pool::ChunkPool;
pub use queue::UploadQueue;
pub use types::{
    DrainHandle, DrainOutcome, DrainParams, DrainSummary, HaltReason, QueueEvent,
    TransferSnapshot,
};
