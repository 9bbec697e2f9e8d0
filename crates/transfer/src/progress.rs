use std::time::{Duration, Instant};

/// Default minimum spacing between two speed samples.
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(800);

/// Default weight of the newest instantaneous rate in the moving average.
const DEFAULT_SMOOTHING: f64 = 0.3;

/// Estimates transfer speed from a monotonically increasing byte counter.
///
/// Samples closer together than the minimum interval are ignored. The
/// exposed speed is an exponential moving average of the instantaneous
/// rates: `old * (1 - a) + instant * a`, or just `instant` for the first one.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    min_interval: Duration,
    smoothing: f64,
    last: Option<(Instant, u64)>,
    smoothed: Option<f64>,
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl SpeedEstimator {
    /// Creates a new estimator.
    ///
    /// - `min_interval`: minimum time between samples (default 800 ms).
    /// - `smoothing`: weight of the newest rate, clamped to `(0, 1]` (default 0.3).
    pub fn new(min_interval: Option<Duration>, smoothing: Option<f64>) -> Self {
        let smoothing = smoothing
            .filter(|a| a.is_finite() && *a > 0.0)
            .map(|a| a.min(1.0))
            .unwrap_or(DEFAULT_SMOOTHING);
        Self {
            min_interval: min_interval.unwrap_or(DEFAULT_MIN_INTERVAL),
            smoothing,
            last: None,
            smoothed: None,
        }
    }

    /// Records the counter value at `now`.
    ///
    /// The first call only sets the baseline. Returns the new smoothed speed
    /// when a sample was taken, `None` when it was too soon.
    pub fn sample_at(&mut self, now: Instant, total_bytes: u64) -> Option<f64> {
        let Some((last_at, last_bytes)) = self.last else {
            self.last = Some((now, total_bytes));
            return None;
        };

        let elapsed = now.saturating_duration_since(last_at);
        if elapsed < self.min_interval || elapsed.is_zero() {
            return None;
        }

        let instant = total_bytes.saturating_sub(last_bytes) as f64 / elapsed.as_secs_f64();
        let smoothed = match self.smoothed {
            Some(old) => old * (1.0 - self.smoothing) + instant * self.smoothing,
            None => instant,
        };
        self.smoothed = Some(smoothed);
        self.last = Some((now, total_bytes));
        Some(smoothed)
    }

    /// Smoothed speed in bytes/second (0.0 before the first full sample).
    pub fn bytes_per_second(&self) -> f64 {
        self.smoothed.unwrap_or(0.0)
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero or negative.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(remaining_bytes as f64 / speed).ok()
    }

    /// Forgets the baseline and the average.
    pub fn reset(&mut self) {
        self.last = None;
        self.smoothed = None;
    }
}
