//! Audit records for every operation the server performs.
//!
//! The sink is chosen by the caller and handed to the [`Gateway`](crate::gateway::Gateway);
//! nothing here reads process state to find a destination. Sink failures are
//! logged and swallowed so an audit problem never fails an operation.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Tool name used for lifecycle records.
pub const SYSTEM_TOOL: &str = "system";

/// One audited operation, written as a single JSON line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonValue>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEntry {
    /// A successful operation.
    pub fn success(tool: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            tool: tool.into(),
            query: None,
            params: None,
            duration_ms,
            success: true,
            result_summary: None,
            error: None,
        }
    }

    /// A failed operation.
    pub fn failure(tool: impl Into<String>, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::success(tool, duration_ms)
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_params(mut self, params: JsonValue) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_summary(mut self, summary: JsonValue) -> Self {
        self.result_summary = Some(summary);
        self
    }
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    /// Record one entry. Must not panic or propagate I/O failures.
    fn record(&self, entry: &AuditEntry);
}

/// Appends entries to `<dir>/mcp-audit-YYYY-MM-DD.jsonl`, one file per local day.
#[derive(Debug)]
pub struct JsonlAuditSink {
    dir: PathBuf,
    // Serializes appends from concurrent calls
    lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file today's entries go to.
    pub fn current_file(&self) -> PathBuf {
        self.dir
            .join(format!("mcp-audit-{}.jsonl", Local::now().format("%Y-%m-%d")))
    }

    fn append(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_file())?;
        file.write_all(line.as_bytes())
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, entry: &AuditEntry) {
        if let Err(e) = self.append(entry) {
            warn!(dir = %self.dir.display(), error = %e, "Failed to write audit log");
        }
    }
}

/// Keeps entries in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: &AuditEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
    }
}

/// Discards every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _entry: &AuditEntry) {}
}
