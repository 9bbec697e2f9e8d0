//! Chunk planning, upload session bookkeeping and speed estimation.
//!
//! Everything here is transport-agnostic: the upload client and queue
//! crates decide when to call the server, this crate only answers which
//! bytes belong to which chunk and how much has been acknowledged.

mod chunked;
mod progress;
mod types;
mod validation;

pub use chunked::{ChunkPlan, ChunkTask, FileSource};
pub use progress::SpeedEstimator;
pub use types::{UploadFile, UploadSession};
pub use validation::normalize_destination;

/// Default chunk size: 4 MiB.
///
/// Small enough to stay under typical reverse-proxy body limits, large
/// enough that per-request overhead stays negligible on a LAN.
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("{file_size} bytes in {chunk_size}-byte chunks exceeds the chunk index range")]
    TooManyChunks { file_size: u64, chunk_size: u64 },
}
