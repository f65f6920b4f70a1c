//! Append-only diagnostic log.
//!
//! Every entry is kept in memory for the console's log panel and mirrored to
//! `tracing` so the same events show up in structured logs.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::mpsc;

/// Severity tag of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// Function-call activity from the remote peer.
    Function,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Function => write!(f, "FUNCTION"),
        }
    }
}

/// One immutable log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp_ms: u64,
    pub severity: Severity,
    pub message: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            format_timestamp(self.timestamp_ms),
            self.severity,
            self.message
        )
    }
}

/// Current Unix epoch in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Render an epoch-millisecond timestamp as `HH:MM:SS` (UTC).
pub fn format_timestamp(timestamp_ms: u64) -> String {
    let secs_of_day = (timestamp_ms / 1000) % 86_400;
    format!(
        "{:02}:{:02}:{:02}",
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60,
        secs_of_day % 60
    )
}

#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Vec<LogEntry>,
    /// When set, every new entry is also forwarded here (terminal printer).
    tap: Option<mpsc::UnboundedSender<LogEntry>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tap(tap: mpsc::UnboundedSender<LogEntry>) -> Self {
        Self {
            entries: Vec::new(),
            tap: Some(tap),
        }
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp_ms: now_ms(),
            severity,
            message: message.into(),
        };

        match severity {
            Severity::Info => tracing::info!("{}", entry.message),
            Severity::Warning => tracing::warn!("{}", entry.message),
            Severity::Error => tracing::error!("{}", entry.message),
            Severity::Function => tracing::info!(kind = "function", "{}", entry.message),
        }

        if let Some(tap) = &self.tap {
            // A dropped printer is not an error for the log itself.
            let _ = tap.send(entry.clone());
        }
        self.entries.push(entry);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    pub fn function(&mut self, message: impl Into<String>) {
        self.push(Severity::Function, message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when any entry of `severity` contains `needle`.
    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.severity == severity && e.message.contains(needle))
    }

    /// Discard every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
