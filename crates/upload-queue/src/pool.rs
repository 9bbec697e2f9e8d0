//! Bounded worker pool uploading the chunks of one session.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use lansend_transfer::{ChunkTask, FileSource, UploadSession};
use lansend_upload_client::{ProtocolClient, UploadError};

/// State shared by the workers of one run.
struct Claims {
    next: AtomicU32,
    halted: AtomicBool,
    first_error: Mutex<Option<UploadError>>,
}

impl Claims {
    /// Claims the next index, or `None` once the pool has stopped.
    fn claim(&self, cancel: &CancellationToken) -> Option<u32> {
        if self.halted.load(Ordering::SeqCst) || cancel.is_cancelled() {
            return None;
        }
        Some(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Stops further claims and keeps the first error seen.
    fn fail(&self, err: UploadError) {
        self.halted.store(true, Ordering::SeqCst);
        let mut slot = self.first_error.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
    }
}

/// Uploads the chunks of a session with at most `concurrency` requests in
/// flight.
///
/// Workers claim indices from a shared counter, so each index is claimed
/// once, in ascending order. When a chunk fails for good no new index is
/// claimed, but requests already in flight are allowed to settle. The
/// caller aborts the session.
pub struct ChunkPool {
    client: ProtocolClient,
    concurrency: usize,
    cancel: CancellationToken,
}

impl ChunkPool {
    pub fn new(client: ProtocolClient, concurrency: usize, cancel: CancellationToken) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Uploads every chunk of `session`, reading bytes from `source`.
    ///
    /// `on_progress(uploaded_bytes, file_size)` fires once per newly
    /// acknowledged chunk.
    pub async fn run(
        &self,
        session: &UploadSession,
        source: &FileSource,
        password: Option<&str>,
        on_progress: &(dyn Fn(u64, u64) + Send + Sync),
    ) -> Result<(), UploadError> {
        let total = session.plan().total_chunks();
        let workers = self.concurrency.min(total as usize).max(1);
        let claims = Claims {
            next: AtomicU32::new(0),
            halted: AtomicBool::new(false),
            first_error: Mutex::new(None),
        };

        debug!(
            upload_id = %session.id(),
            chunks = total,
            workers,
            "chunk pool started"
        );

        join_all(
            (0..workers).map(|_| self.worker(&claims, session, source, password, on_progress)),
        )
        .await;

        let first_error = claims
            .first_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(err) = first_error {
            return Err(err);
        }
        if !session.is_complete() {
            let missing = session.missing_chunks();
            debug!(
                upload_id = %session.id(),
                missing = missing.len(),
                first_missing = ?missing.first(),
                "chunk pool cancelled before completion"
            );
            return Err(UploadError::Cancelled);
        }
        Ok(())
    }

    async fn worker(
        &self,
        claims: &Claims,
        session: &UploadSession,
        source: &FileSource,
        password: Option<&str>,
        on_progress: &(dyn Fn(u64, u64) + Send + Sync),
    ) {
        while let Some(index) = claims.claim(&self.cancel) {
            let Some(task) = session.plan().task(index) else {
                break;
            };

            match self.send(session, source, &task, password).await {
                Ok(()) => {
                    if let Some(uploaded) = session.acknowledge(index) {
                        on_progress(uploaded, session.file_size());
                    }
                }
                Err(e) => {
                    debug!(upload_id = %session.id(), index, error = %e, "chunk pool halting");
                    claims.fail(e);
                    break;
                }
            }
        }
    }

    async fn send(
        &self,
        session: &UploadSession,
        source: &FileSource,
        task: &ChunkTask,
        password: Option<&str>,
    ) -> Result<(), UploadError> {
        let data = source.read_chunk(task).await?;
        self.client
            .put_chunk(session.id(), task, data, password)
            .await
    }
}
