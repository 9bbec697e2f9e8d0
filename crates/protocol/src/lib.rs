pub mod constants;
pub mod envelope;
pub mod messages;

// Re-export primary types for convenience.
pub use constants::ServerErrorKind;
pub use envelope::{ErrorReply, ServerReply};
pub use messages::{
    ChunkAck, ChunkQuery, CompleteUploadResponse, InitUploadRequest, InitUploadResponse,
    UploadFileResponse, UploadIdRequest, VerifyPasswordResponse,
};
