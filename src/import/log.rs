use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Longest entry kept when the log is persisted
pub const MAX_ENTRY_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    /// Feed reference of the listing the entry concerns
    pub agent_ref: Option<String>,
    pub message: String,
}

impl LogEntry {
    /// Message with its `AGENT_REF` prefix, cut to [`MAX_ENTRY_LEN`] chars
    pub fn entry(&self) -> String {
        let full = match &self.agent_ref {
            Some(r) => format!("AGENT_REF: {} - {}", r, self.message),
            None => self.message.clone(),
        };
        full.chars().take(MAX_ENTRY_LEN).collect()
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = self
            .agent_ref
            .as_ref()
            .map(|r| format!("AGENT_REF: {} - ", r))
            .unwrap_or_default();
        write!(
            f,
            "{} - {}{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            prefix,
            self.message
        )
    }
}

/// Log of one import run. Every entry is also emitted through `tracing`.
#[derive(Debug, Default, Serialize)]
pub struct ImportLog {
    entries: Vec<LogEntry>,
}

impl ImportLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, message: impl Into<String>, agent_ref: Option<&str>) {
        self.push(Severity::Info, message.into(), agent_ref);
    }

    pub fn error(&mut self, message: impl Into<String>, agent_ref: Option<&str>) {
        self.push(Severity::Error, message.into(), agent_ref);
    }

    fn push(&mut self, severity: Severity, message: String, agent_ref: Option<&str>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            severity,
            agent_ref: agent_ref.filter(|r| !r.is_empty()).map(str::to_string),
            message,
        };
        match severity {
            Severity::Info => info!("{}", entry.entry()),
            Severity::Error => warn!("{}", entry.entry()),
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn errors(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| e.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// Whether any entry's message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }

    pub fn clear_errors(&mut self) {
        self.entries.retain(|e| e.severity != Severity::Error);
    }

    /// Write the log as pretty JSON
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}
