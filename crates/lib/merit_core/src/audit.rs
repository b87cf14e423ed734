//! Audit recording.
//!
//! Entries are append-only structured records, one JSON object per line, in a
//! file rotated by calendar day. Recording is fire-and-forget: a failed write
//! is logged and never surfaces into the request that produced the entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::warn;

/// A single audit record. Write-once; never updated or deleted.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// Subject ID, or `"anonymous"` before authentication.
    pub subject_id: String,
    /// Role name, or `"guest"` before authentication.
    pub role: String,
    pub action: String,
    pub resource: String,
    pub method: String,
    pub path: String,
    pub source_ip: String,
    pub status_code: u16,
    pub duration_ms: u64,
    /// Request body snapshot with sensitive fields stripped. Best-effort,
    /// only captured for mutating methods under the size ceiling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_excerpt: Option<serde_json::Value>,
    pub headers: BTreeMap<String, String>,
}

/// Cloneable handle to the audit writer task.
///
/// `record` enqueues and returns immediately; the writer task owns the file
/// handle and reopens it whenever the calendar day changes.
#[derive(Debug, Clone)]
pub struct AuditRecorder {
    tx: mpsc::UnboundedSender<AuditEntry>,
}

impl AuditRecorder {
    /// Spawn the writer task appending to `<dir>/audit-YYYY-MM-DD.log`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(writer_loop(dir.into(), rx));
        Self { tx }
    }

    /// Append an entry, best-effort.
    pub fn record(&self, entry: AuditEntry) {
        if self.tx.send(entry).is_err() {
            warn!("audit writer task gone, dropping audit entry");
        }
    }
}

async fn writer_loop(dir: PathBuf, mut rx: mpsc::UnboundedReceiver<AuditEntry>) {
    let mut current: Option<(NaiveDate, File)> = None;
    while let Some(entry) = rx.recv().await {
        let today = Utc::now().date_naive();
        if current.as_ref().map(|(day, _)| *day) != Some(today) {
            current = match open_log(&dir, today).await {
                Ok(file) => Some((today, file)),
                Err(e) => {
                    warn!(error = %e, dir = %dir.display(), "failed to open audit log file");
                    None
                }
            };
        }
        let Some((_, file)) = current.as_mut() else {
            continue;
        };
        let mut line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to serialize audit entry");
                continue;
            }
        };
        line.push('\n');
        if let Err(e) = file.write_all(line.as_bytes()).await {
            warn!(error = %e, "failed to write audit entry");
            // Force a reopen on the next entry.
            current = None;
        }
    }
}

async fn open_log(dir: &Path, day: NaiveDate) -> std::io::Result<File> {
    tokio::fs::create_dir_all(dir).await?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("audit-{day}.log")))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(subject: &str, status: u16) -> AuditEntry {
        AuditEntry {
            timestamp: Utc::now(),
            subject_id: subject.to_string(),
            role: "student".to_string(),
            action: "CREATE".to_string(),
            resource: "achievements".to_string(),
            method: "POST".to_string(),
            path: "/api/v1/achievements".to_string(),
            source_ip: "10.0.0.1".to_string(),
            status_code: status,
            duration_ms: 3,
            request_excerpt: None,
            headers: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn entries_are_appended_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = AuditRecorder::new(dir.path());
        recorder.record(entry("u1", 201));
        recorder.record(entry("u2", 403));

        let log_path = dir
            .path()
            .join(format!("audit-{}.log", Utc::now().date_naive()));
        // The writer is asynchronous; poll briefly for both lines.
        let mut contents = String::new();
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            contents = tokio::fs::read_to_string(&log_path)
                .await
                .unwrap_or_default();
            if contents.lines().count() >= 2 {
                break;
            }
        }
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["subject_id"], "u1");
        assert_eq!(first["status_code"], 201);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["subject_id"], "u2");
    }

    #[tokio::test]
    async fn recorder_survives_unwritable_directory() {
        // Point at a path that cannot be created; record must not panic.
        let recorder = AuditRecorder::new("/dev/null/audit");
        recorder.record(entry("u1", 500));
        tokio::time::sleep(Duration::from_millis(50)).await;
        recorder.record(entry("u2", 500));
    }
}
