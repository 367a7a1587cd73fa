//! JSONL event log: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object, assembled in memory and
//! written with a single `write_all` so concurrent tailing never observes a
//! partial line. Logging must never affect the check result, so the writer
//! degrades instead of failing:
//! 1. Primary file path
//! 2. stderr with `[MHS-LOG]` prefix
//! 3. Silent discard

#![allow(missing_docs)]

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warning,
    Critical,
}

/// Event types matching the check lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CheckStart,
    CheckComplete,
    FstabMissing,
    MountMissing,
    ProbeTimeout,
    ThresholdBreach,
    DirectoryMissing,
    WriteTestFailed,
    TableDegraded,
    Error,
}

/// A single event-log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: LogSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// New entry stamped with the current UTC time.
    #[must_use]
    pub fn new(event: EventType, severity: LogSeverity) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
            severity,
            mount_point: None,
            elapsed_secs: None,
            deadline_secs: None,
            error_code: None,
            details: None,
        }
    }

    #[must_use]
    pub fn mount(mut self, mount_point: impl Into<String>) -> Self {
        self.mount_point = Some(mount_point.into());
        self
    }

    #[must_use]
    pub fn timing(mut self, elapsed_secs: f64, deadline_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self.deadline_secs = Some(deadline_secs);
        self
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Degradation state of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Append-only JSONL event log.
pub struct EventLog {
    path: Option<PathBuf>,
    state: Mutex<WriterState>,
}

impl EventLog {
    /// Log to the given file, or run disabled when `path` is `None`.
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        let state = if path.is_some() {
            WriterState::Normal
        } else {
            WriterState::Discard
        };
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// A log that drops every entry; used by tests and `--no-log` runs.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Record one entry, degrading on failure rather than erroring.
    pub fn record(&self, entry: &LogEntry) {
        let Ok(mut line) = serde_json::to_string(entry) else {
            return;
        };
        line.push('\n');

        let mut state = self.state.lock();
        if *state == WriterState::Normal && !self.append(&line) {
            *state = WriterState::Stderr;
        }
        if *state == WriterState::Stderr {
            let mut stderr = std::io::stderr().lock();
            if stderr.write_all(b"[MHS-LOG] ").is_err() || stderr.write_all(line.as_bytes()).is_err()
            {
                *state = WriterState::Discard;
            }
        }
    }

    fn append(&self, line: &str) -> bool {
        let Some(path) = &self.path else {
            return false;
        };
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .is_ok()
    }
}
