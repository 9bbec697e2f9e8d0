//! Cross-file aggregate state and the status text derived from it.

/// Size units for [`format_file_size`], 1024-based.
const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Formats a byte count as `1.5 MB`: 1024-based, at most two decimals,
/// trailing zeros dropped, `GB` as the largest unit.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let text = format!("{:.2}", (value * 100.0).round() / 100.0);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} {}", SIZE_UNITS[unit])
}

/// The file currently being uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentFile {
    pub name: String,
    pub size: u64,
    /// Acknowledged (chunked) or sent (single request) bytes.
    pub loaded: u64,
}

impl CurrentFile {
    /// Whole-number percentage of this file, 0 when the size is unknown.
    pub fn percent(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        ((self.loaded as f64 / self.size as f64) * 100.0).round() as u64
    }
}

/// Totals for one queue run.
///
/// Initialized when the queue goes from empty to non-empty and reset once
/// the run's completion notice is published. `bytes_completed` and
/// `bytes_failed` only ever cover whole files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateState {
    pub total_files: usize,
    pub total_bytes: u64,
    pub files_completed: usize,
    pub bytes_completed: u64,
    pub files_failed: usize,
    pub bytes_failed: u64,
    /// Bytes already sent for files that later failed. Kept so the speed
    /// counter never moves backwards.
    pub abandoned_bytes: u64,
    /// Names the server stored renamed files under, in completion order.
    pub renamed: Vec<String>,
    current: Option<CurrentFile>,
}

impl AggregateState {
    pub fn add_file(&mut self, size: u64) {
        self.total_files += 1;
        self.total_bytes += size;
    }

    pub fn start_file(&mut self, name: impl Into<String>, size: u64) {
        self.current = Some(CurrentFile {
            name: name.into(),
            size,
            loaded: 0,
        });
    }

    /// Records progress of the current file. Never moves backwards and
    /// never exceeds the file size.
    pub fn update_current(&mut self, loaded: u64) {
        if let Some(current) = self.current.as_mut() {
            current.loaded = current.loaded.max(loaded.min(current.size));
        }
    }

    /// Moves the current file into the completed totals.
    pub fn complete_current(&mut self, stored_as: &str, renamed: bool) -> Option<CurrentFile> {
        let current = self.current.take()?;
        self.files_completed += 1;
        self.bytes_completed += current.size;
        if renamed {
            self.renamed.push(stored_as.to_string());
        }
        Some(current)
    }

    /// Moves the current file into the failed totals.
    pub fn fail_current(&mut self) -> Option<CurrentFile> {
        let current = self.current.take()?;
        self.files_failed += 1;
        self.bytes_failed += current.size;
        self.abandoned_bytes += current.loaded;
        Some(current)
    }

    pub fn current(&self) -> Option<&CurrentFile> {
        self.current.as_ref()
    }

    fn current_loaded(&self) -> u64 {
        self.current.as_ref().map_or(0, |c| c.loaded)
    }

    /// Monotonic byte counter the speed estimate is sampled from.
    pub fn transferred_bytes(&self) -> u64 {
        self.bytes_completed + self.abandoned_bytes + self.current_loaded()
    }

    /// Bytes still to send for this run, failed files excluded.
    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes
            .saturating_sub(self.bytes_completed)
            .saturating_sub(self.bytes_failed)
            .saturating_sub(self.current_loaded())
    }

    /// Byte-weighted progress of the run in percent. Failed files count as
    /// processed so a run with failures still reaches 100.
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return if self.total_files > 0 && self.current.is_none() {
                let done = self.files_completed + self.files_failed;
                (done as f64 / self.total_files as f64 * 100.0).min(100.0)
            } else {
                0.0
            };
        }
        let done = self.bytes_completed + self.bytes_failed + self.current_loaded();
        (done as f64 / self.total_bytes as f64 * 100.0).min(100.0)
    }

    /// Summary shown once a run has drained.
    pub fn completion_message(&self) -> String {
        let mut message = if self.files_failed == 0 {
            format!("All done! Uploaded {} files", self.files_completed)
        } else {
            format!(
                "Finished: uploaded {}/{} files, {} failed",
                self.files_completed, self.total_files, self.files_failed
            )
        };
        if !self.renamed.is_empty() {
            message.push_str(&renamed_suffix(self.renamed.len()));
        }
        message
    }

    /// One-line status for the progress area.
    pub fn status_text(&self, uploading: bool) -> String {
        let processed = self.files_completed + self.files_failed;
        if !uploading && processed == 0 {
            return String::new();
        }
        if !uploading && processed == self.total_files {
            return self.completion_message();
        }

        if let Some(current) = &self.current {
            return if current.size > 0 {
                format!(
                    "Uploading: {} ({} / {}) - {}%",
                    current.name,
                    format_file_size(current.loaded),
                    format_file_size(current.size),
                    current.percent()
                )
            } else {
                format!("Uploading: {} - {}%", current.name, current.percent())
            };
        }

        let mut text = format!(
            "Uploaded {}/{} files",
            self.files_completed, self.total_files
        );
        if !self.renamed.is_empty() {
            text.push_str(&renamed_suffix(self.renamed.len()));
        }
        text
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn renamed_suffix(count: usize) -> String {
    format!(", {count} renamed to avoid name conflicts")
}
