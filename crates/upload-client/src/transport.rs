//! Transport trait for the upload wire protocol.
//!
//! `HttpTransport` implements this over reqwest; tests implement it in
//! memory. Keeping the wire behind a trait lets the pool and queue logic be
//! exercised without sockets.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use lansend_protocol::messages::{
    ChunkAck, ChunkQuery, CompleteUploadResponse, InitUploadRequest, InitUploadResponse,
    UploadFileResponse, UploadIdRequest, VerifyPasswordResponse,
};
use lansend_protocol::ServerErrorKind;

/// Boxed future returned by every transport operation.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Callback receiving the cumulative number of body bytes handed to the
/// network during a single-request upload.
pub type SendProgress = Arc<dyn Fn(u64) + Send + Sync>;

/// Raw transport failures, before classification.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an `{ "error": ... }` body.
    #[error("server error {status}: {message}")]
    Remote { status: u16, message: String },

    /// Non-success status without a usable error body.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransportError {
    /// Classifies a server-reported error; `None` for network/decoding failures.
    pub fn server_kind(&self) -> Option<ServerErrorKind> {
        match self {
            TransportError::Remote { message, .. } => Some(ServerErrorKind::classify(message)),
            _ => None,
        }
    }

    /// Human-readable cause: the bare server message when there is one.
    pub fn message(&self) -> String {
        match self {
            TransportError::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Everything the single-request upload sends.
#[derive(Debug, Clone)]
pub struct WholeFileRequest {
    pub filename: String,
    pub path: String,
    pub size: u64,
    pub password: Option<String>,
    pub data: Bytes,
}

/// Wire operations of the upload service.
pub trait UploadTransport: Send + Sync {
    /// `POST /upload/init`.
    fn init_upload<'a>(
        &'a self,
        req: &'a InitUploadRequest,
    ) -> TransportFuture<'a, InitUploadResponse>;

    /// `POST /upload/chunk` with the raw chunk bytes.
    fn upload_chunk<'a>(
        &'a self,
        query: &'a ChunkQuery,
        data: Bytes,
        password: Option<&'a str>,
    ) -> TransportFuture<'a, ChunkAck>;

    /// `POST /upload/complete`.
    fn complete_upload<'a>(
        &'a self,
        req: &'a UploadIdRequest,
    ) -> TransportFuture<'a, CompleteUploadResponse>;

    /// `POST /upload/abort`. The reply body is ignored.
    fn abort_upload<'a>(&'a self, req: &'a UploadIdRequest) -> TransportFuture<'a, ()>;

    /// `POST /upload` multipart, reporting body progress through `on_progress`.
    fn upload_file<'a>(
        &'a self,
        req: WholeFileRequest,
        on_progress: SendProgress,
    ) -> TransportFuture<'a, UploadFileResponse>;

    /// `POST /upload` carrying only the password.
    fn verify_password<'a>(
        &'a self,
        password: &'a str,
    ) -> TransportFuture<'a, VerifyPasswordResponse>;
}
