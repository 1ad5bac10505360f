//! Command history sink.
//!
//! - `JsonFileHistory`: JSON array on disk, trimmed to the most recent
//!   `limit` entries, written to a temp file then renamed into place
//! - `MemoryHistory`: in-process sink for tests
//!
//! The session submits entries fire-and-forget; a failed append is logged by
//! the caller and never affects the command result.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use oa_protocol::HistoryEntry;
use thiserror::Error;

/// Default number of entries kept on disk.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("history sink unavailable: {0}")]
    Unavailable(String),
}

/// Append-only destination for executed commands.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn append(&self, entry: HistoryEntry) -> Result<(), HistoryError>;
}

// ── File-backed history ─────────────────────────────────────────

/// History stored as a pretty-printed JSON array.
pub struct JsonFileHistory {
    path: PathBuf,
    limit: usize,
    /// Serialises read-modify-write cycles from concurrent appends.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileHistory {
    /// A `limit` of zero keeps every entry.
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// `<user config dir>/oc-ai/history.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("oc-ai").join("history.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all entries, oldest first.
    ///
    /// A missing file is an empty history. An unparseable file is moved
    /// aside to `<path>.bak` and treated as empty.
    pub async fn load(&self) -> Vec<HistoryEntry> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read history file");
                return Vec::new();
            }
        };

        match serde_json::from_slice(&data) {
            Ok(entries) => entries,
            Err(e) => {
                let backup = self.backup_path();
                tracing::warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    error = %e,
                    "history file is corrupt, moving it aside"
                );
                if let Err(e) = tokio::fs::rename(&self.path, &backup).await {
                    tracing::warn!(error = %e, "failed to back up corrupt history file");
                }
                Vec::new()
            }
        }
    }

    async fn save(&self, entries: &[HistoryEntry]) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec_pretty(entries)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, data).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    fn backup_path(&self) -> PathBuf {
        Self::with_suffix(&self.path, ".bak")
    }

    fn temp_path(&self) -> PathBuf {
        Self::with_suffix(&self.path, ".tmp")
    }

    fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
        let mut os = path.as_os_str().to_owned();
        os.push(suffix);
        PathBuf::from(os)
    }
}

#[async_trait]
impl HistorySink for JsonFileHistory {
    async fn append(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.load().await;
        entries.push(entry);
        if self.limit > 0 && entries.len() > self.limit {
            let excess = entries.len() - self.limit;
            entries.drain(..excess);
        }

        self.save(&entries).await?;
        tracing::debug!(path = %self.path.display(), count = entries.len(), "history saved");
        Ok(())
    }
}

// ── In-memory history ───────────────────────────────────────────

/// History sink that keeps entries in memory (for tests).
#[derive(Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<HistoryEntry>>,
    fail: bool,
    delay: Option<Duration>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every append fails.
    pub fn failing() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fail: true,
            delay: None,
        }
    }

    /// A sink that takes `delay` to complete every append.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait (up to one second) until at least `count` entries have arrived.
    /// Appends are fire-and-forget, so tests poll for them.
    pub async fn wait_for(&self, count: usize) -> Vec<HistoryEntry> {
        for _ in 0..100 {
            if self.len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.entries()
    }
}

#[async_trait]
impl HistorySink for MemoryHistory {
    async fn append(&self, entry: HistoryEntry) -> Result<(), HistoryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(HistoryError::Unavailable("memory sink set to fail".into()));
        }
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn history_in(dir: &tempfile::TempDir, limit: usize) -> JsonFileHistory {
        JsonFileHistory::new(dir.path().join("oc-ai").join("history.json"), limit)
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = history_in(&dir, 10);
        assert!(history.load().await.is_empty());
    }

    #[tokio::test]
    async fn append_creates_file_and_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let history = history_in(&dir, 10);

        history
            .append(HistoryEntry::new("oc", "get pods"))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(history.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json[0]["command"], "get pods");
        assert_eq!(json[0]["tool"], "oc");
        assert!(!history.temp_path().exists());
    }

    #[tokio::test]
    async fn append_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let history = history_in(&dir, 10);

        for cmd in ["get pods", "get svc", "get ns"] {
            history.append(HistoryEntry::new("oc", cmd)).await.unwrap();
        }

        let commands: Vec<_> = history
            .load()
            .await
            .into_iter()
            .map(|e| e.command)
            .collect();
        assert_eq!(commands, vec!["get pods", "get svc", "get ns"]);
    }

    #[tokio::test]
    async fn limit_keeps_most_recent() {
        let dir = tempfile::tempdir().unwrap();
        let history = history_in(&dir, 2);

        for cmd in ["get pods", "get svc", "get ns"] {
            history.append(HistoryEntry::new("oc", cmd)).await.unwrap();
        }

        let entries = history.load().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].command, "get svc");
        assert_eq!(entries[1].command, "get ns");
    }

    #[tokio::test]
    async fn corrupt_file_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let history = history_in(&dir, 10);
        std::fs::create_dir_all(history.path().parent().unwrap()).unwrap();
        std::fs::write(history.path(), "{not json").unwrap();

        assert!(history.load().await.is_empty());
        assert_eq!(
            std::fs::read_to_string(history.backup_path()).unwrap(),
            "{not json"
        );

        history
            .append(HistoryEntry::new("kubectl", "get ns"))
            .await
            .unwrap();
        assert_eq!(history.load().await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let history = Arc::new(history_in(&dir, 0));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let history = history.clone();
                tokio::spawn(async move {
                    history
                        .append(HistoryEntry::new("oc", &format!("get pod p{i}")))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(history.load().await.len(), 8);
    }

    #[tokio::test]
    async fn memory_sink_records_and_fails() {
        let sink = MemoryHistory::new();
        sink.append(HistoryEntry::new("oc", "oc get pods"))
            .await
            .unwrap();
        assert_eq!(sink.entries()[0].command, "get pods");

        let failing = MemoryHistory::failing();
        assert!(failing.append(HistoryEntry::new("oc", "get pods")).await.is_err());
        assert!(failing.is_empty());
    }
}
