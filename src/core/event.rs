//! Events emitted by a pipeline run
//!
//! The serde representation of [`RunEvent`] is the websocket wire format:
//!
//! ```json
//! { "type": "log", "data": { "timestamp": "14:03:07", "message": "...", "type": "info" } }
//! { "type": "progress", "data": { "progress": 50 } }
//! ```

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// A log line for the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Wall-clock time of emission (`HH:MM:SS`)
    pub timestamp: String,

    pub message: String,

    #[serde(rename = "type")]
    pub severity: Severity,
}

/// A coarse progress update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Percentage in `0..=100`
    pub progress: u8,
}

/// Event produced during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum RunEvent {
    Log(LogEntry),
    Progress(ProgressUpdate),
}

impl RunEvent {
    /// Create a log event stamped with the current local time
    pub fn log(message: impl Into<String>, severity: Severity) -> Self {
        RunEvent::Log(LogEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
            severity,
        })
    }

    /// Create a progress event, clamped to 100
    pub fn progress(percent: u8) -> Self {
        RunEvent::Progress(ProgressUpdate {
            progress: percent.min(100),
        })
    }

    /// Severity of a log event, `None` for progress
    pub fn severity(&self) -> Option<Severity> {
        match self {
            RunEvent::Log(entry) => Some(entry.severity),
            RunEvent::Progress(_) => None,
        }
    }

    /// Percentage of a progress event, `None` for logs
    pub fn percent(&self) -> Option<u8> {
        match self {
            RunEvent::Progress(update) => Some(update.progress),
            RunEvent::Log(_) => None,
        }
    }

    /// Message of a log event, `None` for progress
    pub fn message(&self) -> Option<&str> {
        match self {
            RunEvent::Log(entry) => Some(&entry.message),
            RunEvent::Progress(_) => None,
        }
    }
}
