//! Append-only audit log of stage outcomes.
//!
//! The log is a single JSON array rewritten on every append. Entries are never
//! edited or removed, and the pipeline never reads them back; only the
//! `status` command does.
use crate::util::{now_epoch_ms, write_atomic};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    Success,
    #[serde(alias = "Failed")]
    Failure,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.pad("Success"),
            Self::Failure => f.pad("Failure"),
        }
    }
}

/// One stage attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Artifact document name, e.g. `models.json`.
    pub file: String,
    pub status: StageStatus,
    pub details: String,
    /// Epoch milliseconds when the record was appended.
    #[serde(default)]
    pub ts: u64,
}

#[derive(Debug, Clone)]
pub struct StatusRecorder {
    path: PathBuf,
}

impl StatusRecorder {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the log as an empty array if needed.
    pub fn record(&self, file: &str, status: StageStatus, details: &str) -> Result<()> {
        let mut records = load_records(&self.path)?;
        records.push(StatusRecord {
            file: file.to_string(),
            status,
            details: details.to_string(),
            ts: now_epoch_ms(),
        });
        let mut text = serde_json::to_string_pretty(&records).context("serialize status log")?;
        text.push('\n');
        write_atomic(&self.path, text.as_bytes())
            .with_context(|| format!("update status log {}", self.path.display()))?;
        tracing::debug!(file, %status, "status recorded");
        Ok(())
    }
}

/// Read every record from the log. A missing log has no records.
pub fn load_records(path: &Path) -> Result<Vec<StatusRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text =
        fs::read_to_string(path).with_context(|| format!("read status log {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&text).map_err(|err| {
        anyhow!(
            "status log {} is not a JSON array of records: {err}",
            path.display()
        )
    })
}
