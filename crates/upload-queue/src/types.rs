//! Data types for the upload queue.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, Shared};

/// Completion handle of a drain. Every caller of
/// [`UploadQueue::process_queue`](crate::UploadQueue::process_queue) during
/// the same run receives a clone of the same handle.
pub type DrainHandle = Shared<BoxFuture<'static, DrainOutcome>>;

/// Why a drain stopped before the queue was empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The server rejected the supplied password.
    CredentialRejected,
    /// The server wants a password and none was supplied.
    CredentialRequired,
}

/// Summary of a fully drained run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainSummary {
    pub files_completed: usize,
    pub files_failed: usize,
    pub bytes_completed: u64,
    /// Server-assigned names of renamed files.
    pub renamed: Vec<String>,
    /// Human-readable completion notice.
    pub message: String,
}

/// How a drain ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Nothing was pending.
    Idle,
    /// Every pending file was processed.
    Drained(DrainSummary),
    /// A credential error stopped the run; remaining files stay pending.
    Halted(HaltReason),
    /// [`UploadQueue::cancel`](crate::UploadQueue::cancel) stopped the run.
    Cancelled,
    /// The drain task itself died.
    Aborted(String),
}

/// Event emitted while the queue drains.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    FileStarted {
        name: String,
        size: u64,
    },
    /// Progress of the current file plus the byte-weighted run percentage.
    Progress {
        name: String,
        loaded: u64,
        size: u64,
        overall_percent: f64,
    },
    FileCompleted {
        name: String,
        stored_as: String,
        renamed: bool,
    },
    /// The file was skipped; the drain continues.
    FileFailed {
        name: String,
        error: String,
    },
    CredentialRejected,
    CredentialRequired,
    DrainCompleted(DrainSummary),
    Cancelled,
}

/// Point-in-time view of the queue for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSnapshot {
    pub uploading: bool,
    pub pending: usize,
    pub total_files: usize,
    pub total_bytes: u64,
    pub files_completed: usize,
    pub bytes_completed: u64,
    pub files_failed: usize,
    pub current_file: Option<String>,
    pub current_loaded: u64,
    pub current_size: u64,
    /// Byte-weighted run progress in percent.
    pub percent: f64,
    /// Smoothed speed in bytes/second, 0 when idle.
    pub bytes_per_second: f64,
    /// `None` when idle or while the speed is still unknown.
    pub eta: Option<Duration>,
    pub renamed: Vec<String>,
    pub status: String,
}

/// Returns the password for the next file, or `None`.
pub type CredentialFn = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Called when a credential error halts the drain.
pub type CredentialPromptFn = Arc<dyn Fn(HaltReason) + Send + Sync>;

/// Called once the queue has drained, before the completion notice.
pub type RefreshFn = Arc<dyn Fn() + Send + Sync>;

/// Caller hooks for one drain.
///
/// The credential accessor is asked once per file and its answer is never
/// cached.
#[derive(Clone, Default)]
pub struct DrainParams {
    pub credential: Option<CredentialFn>,
    pub on_credential_prompt: Option<CredentialPromptFn>,
    pub on_refresh: Option<RefreshFn>,
}

impl DrainParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(
        mut self,
        credential: impl Fn() -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.credential = Some(Arc::new(credential));
        self
    }

    pub fn on_credential_prompt(
        mut self,
        hook: impl Fn(HaltReason) + Send + Sync + 'static,
    ) -> Self {
        self.on_credential_prompt = Some(Arc::new(hook));
        self
    }

    pub fn on_refresh(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_refresh = Some(Arc::new(hook));
        self
    }

    pub(crate) fn credential(&self) -> Option<String> {
        self.credential
            .as_ref()
            .and_then(|get| get())
            .filter(|password| !password.is_empty())
    }

    pub(crate) fn prompt(&self, reason: HaltReason) {
        if let Some(hook) = &self.on_credential_prompt {
            hook(reason);
        }
    }

    pub(crate) fn refresh(&self) {
        if let Some(hook) = &self.on_refresh {
            hook();
        }
    }
}

impl fmt::Debug for DrainParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrainParams")
            .field("credential", &self.credential.is_some())
            .field("on_credential_prompt", &self.on_credential_prompt.is_some())
            .field("on_refresh", &self.on_refresh.is_some())
            .finish()
    }
}
