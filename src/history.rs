use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_dirs::AppDirs;
use crate::orchestrator::SessionSummary;

/// One finished session as stored in the local history file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: DateTime<Local>,
    pub category: String,
    pub words_completed: u32,
    pub elapsed_secs: f64,
    pub wpm: f64,
    pub accuracy: f64,
    pub correct: u32,
    pub mistakes: u32,
    pub confirmed: bool,
}

impl HistoryEntry {
    /// Recorded duration. Unrepresentable values from an edited file read as zero.
    pub fn elapsed(&self) -> Duration {
        Duration::try_from_secs_f64(self.elapsed_secs).unwrap_or_default()
    }

    pub fn from_summary(summary: &SessionSummary, date: DateTime<Local>) -> Self {
        Self {
            date,
            category: summary.category.clone(),
            words_completed: summary.counters.words_completed,
            elapsed_secs: (summary.elapsed.as_secs_f64() * 100.0).round() / 100.0,
            wpm: summary.metrics.wpm,
            accuracy: summary.metrics.accuracy,
            correct: summary.counters.correct_keystrokes,
            mistakes: summary.counters.mistake_keystrokes,
            confirmed: summary.metrics.is_confirmed(),
        }
    }
}

/// Append-only CSV log of finished sessions
#[derive(Debug, Clone)]
pub struct History {
    path: PathBuf,
}

impl History {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn default_location() -> Option<Self> {
        AppDirs::history_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &HistoryEntry) -> csv::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // If the file doesn't exist yet, we need to emit a header
        let needs_header = !self.path.exists();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(entry)?;
        writer.flush()?;
        Ok(())
    }

    /// The last `n` entries, oldest first. An absent file is an empty history.
    pub fn recent(&self, n: usize) -> csv::Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let entries = reader
            .deserialize()
            .collect::<csv::Result<Vec<HistoryEntry>>>()?;
        let skip = entries.len().saturating_sub(n);
        Ok(entries.into_iter().skip(skip).collect())
    }
}
