//! Protocol client: one call per upload step, with per-chunk retry and
//! error normalization.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use lansend_protocol::ServerErrorKind;
use lansend_protocol::messages::{ChunkQuery, InitUploadRequest, UploadIdRequest};
use lansend_transfer::{ChunkPlan, ChunkTask};

use crate::error::UploadError;
use crate::transport::{SendProgress, TransportError, UploadTransport, WholeFileRequest};

/// Chunk retry policy. `retries` is the number of extra attempts after the
/// first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    /// Total attempts per chunk, first try included.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Final name of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub filename: String,
    pub renamed: bool,
}

/// Maps a transport failure to its upload error kind.
///
/// The two credential messages become their dedicated kinds; anything else
/// is wrapped by `other` with the server message or transport description.
fn normalize(err: TransportError, other: impl FnOnce(String) -> UploadError) -> UploadError {
    match err.server_kind() {
        Some(ServerErrorKind::WrongPassword) => UploadError::CredentialRejected,
        Some(ServerErrorKind::PasswordRequired) => UploadError::CredentialRequired,
        _ => other(err.message()),
    }
}

/// Client for the upload protocol on top of an [`UploadTransport`].
#[derive(Clone)]
pub struct ProtocolClient {
    transport: Arc<dyn UploadTransport>,
    retry: RetryPolicy,
}

impl ProtocolClient {
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Opens a chunked upload session and returns its id.
    pub async fn init(
        &self,
        file_name: &str,
        destination: &str,
        plan: &ChunkPlan,
        password: Option<&str>,
    ) -> Result<String, UploadError> {
        let req = InitUploadRequest {
            filename: file_name.to_string(),
            size: plan.file_size(),
            path: destination.to_string(),
            chunk_size: plan.chunk_size(),
            total_chunks: plan.total_chunks(),
            password: password.map(str::to_string),
        };

        let resp = self
            .transport
            .init_upload(&req)
            .await
            .map_err(|e| normalize(e, UploadError::SessionInit))?;

        let id = resp
            .session_id()
            .ok_or_else(|| UploadError::SessionInit("server returned no upload id".into()))?;
        debug!(file = %file_name, upload_id = %id, chunks = plan.total_chunks(), "upload session opened");
        Ok(id.to_string())
    }

    /// Sends one chunk, retrying transient failures.
    ///
    /// Credential failures are returned at once. Any other failure is retried
    /// until the policy's attempts are used up.
    pub async fn put_chunk(
        &self,
        upload_id: &str,
        task: &ChunkTask,
        data: Bytes,
        password: Option<&str>,
    ) -> Result<(), UploadError> {
        let query = ChunkQuery {
            upload_id: upload_id.to_string(),
            index: task.index,
        };
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self
                .transport
                .upload_chunk(&query, data.clone(), password)
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) => normalize(e, |message| UploadError::ChunkTransfer {
                    index: task.index,
                    attempts: attempt,
                    message,
                }),
            };

            if err.is_credential() || attempt >= max_attempts {
                return Err(err);
            }

            warn!(
                upload_id = %upload_id,
                index = task.index,
                attempt,
                error = %err,
                "chunk upload failed, retrying"
            );
            tokio::time::sleep(self.retry.delay).await;
        }
    }

    /// Finalizes a session. `file_name` is used when the server omits the
    /// final name.
    pub async fn complete(
        &self,
        upload_id: &str,
        file_name: &str,
        password: Option<&str>,
    ) -> Result<UploadReceipt, UploadError> {
        let req = UploadIdRequest {
            upload_id: upload_id.to_string(),
            password: password.map(str::to_string),
        };
        let resp = self
            .transport
            .complete_upload(&req)
            .await
            .map_err(|e| normalize(e, UploadError::SessionComplete))?;

        let filename = if resp.filename.is_empty() {
            file_name.to_string()
        } else {
            resp.filename
        };
        Ok(UploadReceipt {
            filename,
            renamed: resp.renamed,
        })
    }

    /// Best-effort abort. Failures are logged and swallowed.
    pub async fn abort(&self, upload_id: &str, password: Option<&str>) {
        let req = UploadIdRequest {
            upload_id: upload_id.to_string(),
            password: password.map(str::to_string),
        };
        if let Err(e) = self.transport.abort_upload(&req).await {
            debug!(upload_id = %upload_id, error = %e, "abort failed, ignoring");
        }
    }

    /// Uploads a whole file in one multipart request.
    pub async fn upload_whole(
        &self,
        file_name: &str,
        destination: &str,
        data: Bytes,
        password: Option<&str>,
        on_progress: SendProgress,
    ) -> Result<UploadReceipt, UploadError> {
        let req = WholeFileRequest {
            filename: file_name.to_string(),
            path: destination.to_string(),
            size: data.len() as u64,
            password: password.map(str::to_string),
            data,
        };
        let resp = self
            .transport
            .upload_file(req, on_progress)
            .await
            .map_err(|e| normalize(e, UploadError::Upload))?;

        Ok(UploadReceipt {
            filename: resp
                .filename
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| file_name.to_string()),
            renamed: resp.renamed,
        })
    }

    /// Checks a password against the server without uploading anything.
    pub async fn verify_password(&self, password: &str) -> Result<(), UploadError> {
        self.transport
            .verify_password(password)
            .await
            .map(|_| ())
            .map_err(|e| normalize(e, UploadError::Upload))
    }
}
