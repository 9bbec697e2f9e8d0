//! Upload tuning knobs, loadable from JSON.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use lansend_transfer::{DEFAULT_CHUNK_SIZE, SpeedEstimator};
use lansend_upload_client::RetryPolicy;

/// Errors loading [`UploadSettings`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Queue and pool settings. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Chunk size in bytes for the chunked path.
    pub chunk_size: u64,
    /// Concurrent chunk workers per file.
    pub concurrency: usize,
    /// Extra attempts per chunk after the first.
    pub chunk_retries: u32,
    pub retry_delay_ms: u64,
    /// Files up to this size (and empty files) go in one request.
    pub single_request_threshold: u64,
    pub speed_sample_interval_ms: u64,
    /// Weight of the newest instantaneous rate.
    pub speed_smoothing: f64,
    /// Delay between the refresh hook and the completion notice.
    pub refresh_settle_ms: u64,
    /// How long the completion notice stays visible.
    pub notice_display_ms: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: 3,
            chunk_retries: 2,
            retry_delay_ms: 300,
            single_request_threshold: DEFAULT_CHUNK_SIZE,
            speed_sample_interval_ms: 800,
            speed_smoothing: 0.3,
            refresh_settle_ms: 500,
            notice_display_ms: 4000,
        }
    }
}

impl UploadSettings {
    /// Reads settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Worker count, never below one.
    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.chunk_retries,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn refresh_settle(&self) -> Duration {
        Duration::from_millis(self.refresh_settle_ms)
    }

    pub fn notice_display(&self) -> Duration {
        Duration::from_millis(self.notice_display_ms)
    }

    pub fn speed_estimator(&self) -> SpeedEstimator {
        SpeedEstimator::new(
            Some(Duration::from_millis(self.speed_sample_interval_ms)),
            Some(self.speed_smoothing),
        )
    }

    /// Returns `true` when a file of `size` bytes skips the chunked protocol.
    pub fn use_single_request(&self, size: u64) -> bool {
        size == 0 || size <= self.single_request_threshold
    }
}
