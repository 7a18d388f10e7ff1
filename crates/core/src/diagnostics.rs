//! Append-only record of analysis attempts.
//!
//! One line per attempt:
//!
//! ```text
//! 2026-10-18 14:03:27.512 - SUCCESS - ### Extracted text ...
//! 2026-10-18 14:05:02.004 - AUTH_ERROR - HTTP 401: Incorrect API key provided
//! ```

use crate::vision::AnalysisResult;
use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Longest message kept per line, in characters.
pub const MAX_MESSAGE_CHARS: usize = 200;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub struct DiagnosticLog {
    path: PathBuf,
}

impl DiagnosticLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one line for `result` and flushes it to disk.
    pub fn record(&self, result: &AnalysisResult) -> io::Result<()> {
        let line = format_line(Local::now(), result);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        file.sync_data()
    }
}

fn format_line(timestamp: DateTime<Local>, result: &AnalysisResult) -> String {
    let (outcome, message) = match result {
        AnalysisResult::Success(text) => ("SUCCESS", text.as_str()),
        AnalysisResult::Failure { kind, message } => (kind.log_label(), message.as_str()),
    };

    format!(
        "{} - {} - {}\n",
        timestamp.format(TIMESTAMP_FORMAT),
        outcome,
        truncate_message(message)
    )
}

/// Flattens `message` onto one line and caps its length.
fn truncate_message(message: &str) -> String {
    let flat: String = message
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if flat.chars().count() <= MAX_MESSAGE_CHARS {
        flat
    } else {
        let mut cut: String = flat.chars().take(MAX_MESSAGE_CHARS).collect();
        cut.push_str("...");
        cut
    }
}
