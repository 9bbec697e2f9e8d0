//! Transfer queue: FIFO of files, single-flight drain, aggregate progress.
//!
//! Files are uploaded one at a time; the chunks of one file go through a
//! [`ChunkPool`]. The host reads state through [`UploadQueue::snapshot`]
//! and the event channel.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lansend_transfer::{
    ChunkPlan, SpeedEstimator, UploadFile, UploadSession, normalize_destination,
};
use lansend_upload_client::{
    ProtocolClient, SendProgress, UploadError, UploadReceipt, UploadTransport,
};

use crate::aggregate::AggregateState;
use crate::config::UploadSettings;
use crate::pool::ChunkPool;
use crate::types::{
    DrainHandle, DrainOutcome, DrainParams, DrainSummary, HaltReason, QueueEvent,
    TransferSnapshot,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

const WRONG_PASSWORD_NOTICE: &str = "Wrong password, please try again";
const EMPTY_PASSWORD_NOTICE: &str = "Please enter the password";

const HINT_IDLE: &str = "Drop files here or click to choose";
const HINT_UPLOADING: &str = "Uploading... drop more files to add them to the queue";

/// One queued file.
struct QueueEntry {
    file: UploadFile,
    destination: String,
}

struct QueueState {
    pending: VecDeque<QueueEntry>,
    aggregate: AggregateState,
    uploading: bool,
    speed: SpeedEstimator,
    /// Running drain and its generation.
    drain: Option<(u64, DrainHandle)>,
    generation: u64,
    cancel: CancellationToken,
    /// Completion notice and the instant it expires.
    notice: Option<(String, Instant)>,
    credential_verified: bool,
    credential_error: Option<String>,
}

impl QueueState {
    /// Clears the drain slot if it still belongs to `generation`.
    fn release(&mut self, generation: u64) {
        if matches!(self.drain, Some((g, _)) if g == generation) {
            self.drain = None;
            self.uploading = false;
        }
    }

    fn active_notice(&self) -> Option<&str> {
        match &self.notice {
            Some((text, expires)) if Instant::now() < *expires => Some(text.as_str()),
            _ => None,
        }
    }

    fn status_text(&self) -> String {
        match self.active_notice() {
            Some(notice) if !self.uploading => notice.to_string(),
            _ => self.aggregate.status_text(self.uploading),
        }
    }

    fn sample_speed(&mut self) {
        let transferred = self.aggregate.transferred_bytes();
        self.speed.sample_at(Instant::now().into_std(), transferred);
    }
}

struct QueueInner {
    client: ProtocolClient,
    settings: UploadSettings,
    state: Mutex<QueueState>,
    events_tx: mpsc::Sender<QueueEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<QueueEvent>>>,
}

/// Clears the drain slot when the drain task ends, however it ends.
struct DrainSlot {
    inner: Arc<QueueInner>,
    generation: u64,
}

impl Drop for DrainSlot {
    fn drop(&mut self) {
        self.inner.lock().release(self.generation);
    }
}

/// Multi-file upload queue. Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct UploadQueue {
    inner: Arc<QueueInner>,
}

impl UploadQueue {
    /// Creates a queue uploading through `transport`.
    pub fn new(transport: Arc<dyn UploadTransport>, settings: UploadSettings) -> Self {
        let client = ProtocolClient::new(transport).with_retry(settings.retry_policy());
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let state = QueueState {
            pending: VecDeque::new(),
            aggregate: AggregateState::default(),
            uploading: false,
            speed: settings.speed_estimator(),
            drain: None,
            generation: 0,
            cancel: CancellationToken::new(),
            notice: None,
            credential_verified: false,
            credential_error: None,
        };
        Self {
            inner: Arc::new(QueueInner {
                client,
                settings,
                state: Mutex::new(state),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
            }),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&self) -> Option<mpsc::Receiver<QueueEvent>> {
        self.inner
            .events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.inner.settings
    }

    /// Appends files for `destination` (relative to the share root).
    ///
    /// Totals grow at once. Allowed while a drain runs: the running drain
    /// picks the files up, no second drain starts.
    pub fn enqueue(&self, destination: impl Into<String>, files: impl IntoIterator<Item = UploadFile>) {
        let destination = destination.into();
        let mut s = self.inner.lock();
        let mut added = 0usize;
        for file in files {
            s.aggregate.add_file(file.size);
            s.pending.push_back(QueueEntry {
                file,
                destination: destination.clone(),
            });
            added += 1;
        }
        debug!(added, pending = s.pending.len(), destination = %destination, "files enqueued");
    }

    /// Starts draining the queue, or joins the drain already running.
    ///
    /// Must be called within a tokio runtime. Every caller during one run
    /// gets a clone of the same handle.
    pub fn process_queue(&self, params: DrainParams) -> DrainHandle {
        let mut s = self.inner.lock();
        if let Some((generation, handle)) = &s.drain {
            debug!(generation, "drain already running, joining");
            return handle.clone();
        }

        s.generation += 1;
        let generation = s.generation;
        s.cancel = CancellationToken::new();
        let cancel = s.cancel.clone();

        let task = tokio::spawn(Arc::clone(&self.inner).drain(generation, params, cancel));
        let handle: DrainHandle = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "upload drain task failed");
                    DrainOutcome::Aborted(e.to_string())
                }
            }
        }
        .boxed()
        .shared();

        s.drain = Some((generation, handle.clone()));
        handle
    }

    /// Cancels the running drain. Chunks already in flight settle first.
    ///
    /// Returns `false` if nothing was running.
    pub fn cancel(&self) -> bool {
        let s = self.inner.lock();
        if s.drain.is_none() {
            return false;
        }
        info!(generation = s.generation, "upload queue cancel requested");
        s.cancel.cancel();
        true
    }

    /// Drops pending files and clears the totals. Refused while a drain runs.
    pub fn reset(&self) -> bool {
        let mut s = self.inner.lock();
        if s.drain.is_some() {
            return false;
        }
        s.pending.clear();
        s.aggregate.reset();
        s.speed.reset();
        s.notice = None;
        true
    }

    /// Checks `password` against the server and records the verdict.
    ///
    /// A blank password is refused without a request.
    pub async fn verify_credential(&self, password: &str) -> Result<(), UploadError> {
        if password.trim().is_empty() {
            self.inner.lock().credential_error = Some(EMPTY_PASSWORD_NOTICE.to_string());
            return Err(UploadError::CredentialRequired);
        }

        let result = self.inner.client.verify_password(password).await;

        let mut s = self.inner.lock();
        match &result {
            Ok(()) => {
                s.credential_verified = true;
                s.credential_error = None;
            }
            Err(e) => {
                s.credential_verified = false;
                s.credential_error = Some(match e {
                    UploadError::CredentialRejected => WRONG_PASSWORD_NOTICE.to_string(),
                    other => other.to_string(),
                });
            }
        }
        result
    }

    pub fn is_credential_verified(&self) -> bool {
        self.inner.lock().credential_verified
    }

    /// Message for the last credential failure, if any.
    pub fn credential_error(&self) -> Option<String> {
        self.inner.lock().credential_error.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_uploading(&self) -> bool {
        self.inner.lock().uploading
    }

    /// Returns `true` while there is anything to show in a progress area.
    pub fn show_progress(&self) -> bool {
        let s = self.inner.lock();
        s.uploading || !s.pending.is_empty()
    }

    pub fn upload_hint(&self) -> &'static str {
        if self.is_uploading() {
            HINT_UPLOADING
        } else {
            HINT_IDLE
        }
    }

    /// Completion notice of the last drain, until it expires.
    pub fn notice(&self) -> Option<String> {
        self.inner.lock().active_notice().map(str::to_string)
    }

    pub fn status_text(&self) -> String {
        self.inner.lock().status_text()
    }

    pub fn snapshot(&self) -> TransferSnapshot {
        let s = self.inner.lock();
        let agg = &s.aggregate;
        let current = agg.current();
        TransferSnapshot {
            uploading: s.uploading,
            pending: s.pending.len(),
            total_files: agg.total_files,
            total_bytes: agg.total_bytes,
            files_completed: agg.files_completed,
            bytes_completed: agg.bytes_completed,
            files_failed: agg.files_failed,
            current_file: current.map(|c| c.name.clone()),
            current_loaded: current.map_or(0, |c| c.loaded),
            current_size: current.map_or(0, |c| c.size),
            percent: agg.percent(),
            bytes_per_second: if s.uploading {
                s.speed.bytes_per_second()
            } else {
                0.0
            },
            eta: if s.uploading {
                s.speed.eta(agg.remaining_bytes())
            } else {
                None
            },
            renamed: agg.renamed.clone(),
            status: s.status_text(),
        }
    }
}

// ---------------------------------------------------------------------------
// Drain
// ---------------------------------------------------------------------------

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: QueueEvent) {
        let _ = self.events_tx.try_send(event);
    }

    async fn drain(
        self: Arc<Self>,
        generation: u64,
        params: DrainParams,
        cancel: CancellationToken,
    ) -> DrainOutcome {
        let _slot = DrainSlot {
            inner: Arc::clone(&self),
            generation,
        };

        {
            let mut s = self.lock();
            if s.pending.is_empty() {
                debug!("upload queue empty, nothing to drain");
                return DrainOutcome::Idle;
            }
            s.uploading = true;
            s.notice = None;
            s.speed.reset();
            s.sample_speed();
            info!(
                generation,
                pending = s.pending.len(),
                total_bytes = s.aggregate.total_bytes,
                "upload queue draining"
            );
        }

        loop {
            if cancel.is_cancelled() {
                return self.finish_cancelled();
            }

            let next = {
                let mut s = self.lock();
                let entry = s.pending.pop_front();
                if let Some(entry) = &entry {
                    s.aggregate.start_file(&entry.file.name, entry.file.size);
                }
                entry
            };

            let Some(entry) = next else {
                params.refresh();
                tokio::select! {
                    _ = cancel.cancelled() => return self.finish_cancelled(),
                    _ = tokio::time::sleep(self.settings.refresh_settle()) => {}
                }
                match self.finish_drained(generation) {
                    Some(summary) => return DrainOutcome::Drained(summary),
                    None => continue,
                }
            };

            self.emit(QueueEvent::FileStarted {
                name: entry.file.name.clone(),
                size: entry.file.size,
            });

            match self.upload_one(&entry, &params, &cancel).await {
                Ok(receipt) => self.record_completed(&entry, receipt),
                Err(UploadError::Cancelled) => return self.finish_cancelled(),
                Err(e) if e.is_credential() => return self.halt(&entry, &e, &params),
                Err(e) => self.record_failed(&entry, &e),
            }
        }
    }

    /// Uploads one file through the short or the chunked path.
    async fn upload_one(
        self: &Arc<Self>,
        entry: &QueueEntry,
        params: &DrainParams,
        cancel: &CancellationToken,
    ) -> Result<UploadReceipt, UploadError> {
        let destination = normalize_destination(&entry.destination)?;
        let password = params.credential();
        let password = password.as_deref();
        let file = &entry.file;

        if self.settings.use_single_request(file.size) {
            let data = file.source.read_range(0, file.size).await?;
            let inner = Arc::clone(self);
            let on_progress: SendProgress = Arc::new(move |sent| inner.on_progress(sent));
            return self
                .client
                .upload_whole(&file.name, &destination, data, password, on_progress)
                .await;
        }

        let plan = ChunkPlan::new(file.size, self.settings.chunk_size)?;
        let upload_id = self
            .client
            .init(&file.name, &destination, &plan, password)
            .await?;
        let session = UploadSession::new(upload_id, &file.name, destination, plan);

        let pool = ChunkPool::new(self.client.clone(), self.settings.concurrency(), cancel.clone());
        let on_progress = |uploaded: u64, _size: u64| self.on_progress(uploaded);
        if let Err(e) = pool
            .run(&session, &file.source, password, &on_progress)
            .await
        {
            self.client.abort(session.id(), password).await;
            return Err(e);
        }

        self.client
            .complete(session.id(), &file.name, password)
            .await
    }

    fn on_progress(&self, loaded: u64) {
        let event = {
            let mut s = self.lock();
            s.aggregate.update_current(loaded);
            s.sample_speed();
            s.aggregate.current().map(|c| QueueEvent::Progress {
                name: c.name.clone(),
                loaded: c.loaded,
                size: c.size,
                overall_percent: s.aggregate.percent(),
            })
        };
        if let Some(event) = event {
            self.emit(event);
        }
    }

    fn record_completed(&self, entry: &QueueEntry, receipt: UploadReceipt) {
        {
            let mut s = self.lock();
            s.aggregate.update_current(entry.file.size);
            s.aggregate.complete_current(&receipt.filename, receipt.renamed);
            s.sample_speed();
        }
        info!(
            file = %entry.file.name,
            stored_as = %receipt.filename,
            renamed = receipt.renamed,
            size = entry.file.size,
            "file uploaded"
        );
        self.emit(QueueEvent::FileCompleted {
            name: entry.file.name.clone(),
            stored_as: receipt.filename,
            renamed: receipt.renamed,
        });
    }

    fn record_failed(&self, entry: &QueueEntry, err: &UploadError) {
        self.lock().aggregate.fail_current();
        warn!(file = %entry.file.name, error = %err, "file upload failed, skipping");
        self.emit(QueueEvent::FileFailed {
            name: entry.file.name.clone(),
            error: err.to_string(),
        });
    }

    /// Stops the drain on a credential error. The current file is dropped;
    /// the rest stay pending.
    fn halt(&self, entry: &QueueEntry, err: &UploadError, params: &DrainParams) -> DrainOutcome {
        let reason = match err {
            UploadError::CredentialRejected => HaltReason::CredentialRejected,
            _ => HaltReason::CredentialRequired,
        };

        let pending = {
            let mut s = self.lock();
            s.aggregate.fail_current();
            s.uploading = false;
            s.credential_verified = false;
            if reason == HaltReason::CredentialRejected {
                s.credential_error = Some(WRONG_PASSWORD_NOTICE.to_string());
            }
            s.pending.len()
        };

        warn!(file = %entry.file.name, pending, reason = ?reason, "upload queue halted");
        self.emit(match reason {
            HaltReason::CredentialRejected => QueueEvent::CredentialRejected,
            HaltReason::CredentialRequired => QueueEvent::CredentialRequired,
        });
        params.prompt(reason);
        DrainOutcome::Halted(reason)
    }

    /// Publishes the completion notice and resets the totals, unless files
    /// arrived while settling.
    fn finish_drained(&self, generation: u64) -> Option<DrainSummary> {
        let summary = {
            let mut s = self.lock();
            if !s.pending.is_empty() {
                debug!(pending = s.pending.len(), "files arrived while settling, continuing");
                return None;
            }
            let agg = &s.aggregate;
            let summary = DrainSummary {
                files_completed: agg.files_completed,
                files_failed: agg.files_failed,
                bytes_completed: agg.bytes_completed,
                renamed: agg.renamed.clone(),
                message: agg.completion_message(),
            };
            s.notice = Some((
                summary.message.clone(),
                Instant::now() + self.settings.notice_display(),
            ));
            s.aggregate.reset();
            s.speed.reset();
            s.release(generation);
            summary
        };

        info!(
            files = summary.files_completed,
            failed = summary.files_failed,
            renamed = summary.renamed.len(),
            bytes = summary.bytes_completed,
            "upload queue drained"
        );
        self.emit(QueueEvent::DrainCompleted(summary.clone()));
        Some(summary)
    }

    fn finish_cancelled(&self) -> DrainOutcome {
        let dropped = {
            let mut s = self.lock();
            let dropped = s.pending.len();
            s.pending.clear();
            s.aggregate.reset();
            s.speed.reset();
            s.uploading = false;
            dropped
        };
        info!(dropped, "upload queue cancelled");
        self.emit(QueueEvent::Cancelled);
        DrainOutcome::Cancelled
    }
}
