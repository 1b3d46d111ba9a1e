//! Generation call log.
//!
//! Every call is appended to `logs/generation.jsonl` as one JSON line so an
//! operator can see what was sent, how long it took and what came back:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"purpose":"structure.json","model":"gpt-4o-mini","duration_ms":4200,"outcome":"success",...}
//! ```
//!
//! With transcripts enabled the full prompt and response are also stored in
//! `logs/transcripts/<purpose>_<ts>_{prompt,response}.txt`.
//!
//! This log is diagnostic. The audit trail of stage outcomes lives in the
//! status log.
use super::GenerationRequest;
use crate::util::{now_epoch_ms, truncate_string};
use crate::workspace::WorkspacePaths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::time::Instant;

/// Current schema version for generation.jsonl entries.
pub const GENERATION_LOG_SCHEMA_VERSION: u32 = 1;

const PROMPT_PREVIEW_BYTES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationOutcome {
    Success,
    Failed,
}

/// A single generation log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationLogEntry {
    pub schema_version: u32,

    /// Unix timestamp in milliseconds when the call started.
    pub ts: u64,

    /// Document being generated.
    pub purpose: String,

    pub model: String,

    pub duration_ms: u64,

    pub outcome: GenerationOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_bytes: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// First ~500 bytes of the rendered prompt.
    pub prompt_preview: String,
}

/// Times one call and produces its entry.
pub struct GenerationLogBuilder {
    start: Instant,
    ts: u64,
    purpose: String,
    model: String,
    prompt_preview: String,
}

impl GenerationLogBuilder {
    pub fn start(request: &GenerationRequest, prompt: &str) -> Self {
        Self {
            start: Instant::now(),
            ts: now_epoch_ms(),
            purpose: request.purpose.clone(),
            model: request.model.clone(),
            prompt_preview: truncate_string(prompt, PROMPT_PREVIEW_BYTES),
        }
    }

    pub fn success(self, response: &str) -> GenerationLogEntry {
        let bytes = response.len();
        self.build(GenerationOutcome::Success, Some(bytes), None)
    }

    pub fn failed(self, error: impl Into<String>) -> GenerationLogEntry {
        self.build(GenerationOutcome::Failed, None, Some(error.into()))
    }

    fn build(
        self,
        outcome: GenerationOutcome,
        response_bytes: Option<usize>,
        error: Option<String>,
    ) -> GenerationLogEntry {
        GenerationLogEntry {
            schema_version: GENERATION_LOG_SCHEMA_VERSION,
            ts: self.ts,
            purpose: self.purpose,
            model: self.model,
            duration_ms: self.start.elapsed().as_millis() as u64,
            outcome,
            response_bytes,
            error,
            prompt_preview: self.prompt_preview,
        }
    }
}

/// Where generation calls are recorded.
#[derive(Debug, Clone)]
pub struct GenerationLog {
    paths: WorkspacePaths,
    keep_transcripts: bool,
}

impl GenerationLog {
    pub fn new(paths: WorkspacePaths, keep_transcripts: bool) -> Self {
        Self {
            paths,
            keep_transcripts,
        }
    }

    /// Record one call. Failures only warn; this log never stops a run.
    pub fn record(&self, entry: &GenerationLogEntry, prompt: &str, response: Option<&str>) {
        if let Err(err) = append_entry(&self.paths, entry) {
            tracing::warn!(error = %format!("{err:#}"), "could not append generation log");
        }
        if !self.keep_transcripts {
            return;
        }
        if let Err(err) = store_transcript(&self.paths, entry, prompt, response) {
            tracing::warn!(error = %format!("{err:#}"), "could not store generation transcript");
        }
    }
}

/// Append an entry to `logs/generation.jsonl`.
pub fn append_entry(paths: &WorkspacePaths, entry: &GenerationLogEntry) -> Result<()> {
    let log_path = paths.generation_log_path();
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("create logs directory")?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open generation log for append: {}", log_path.display()))?;

    let line = serde_json::to_string(entry).context("serialize generation log entry")?;
    writeln!(file, "{line}").context("write generation log entry")?;
    Ok(())
}

fn store_transcript(
    paths: &WorkspacePaths,
    entry: &GenerationLogEntry,
    prompt: &str,
    response: Option<&str>,
) -> Result<()> {
    let dir = paths.transcripts_dir();
    fs::create_dir_all(&dir).context("create transcripts directory")?;

    let stem = format!("{}_{}", entry.purpose.replace('.', "_"), entry.ts);
    let prompt_path = dir.join(format!("{stem}_prompt.txt"));
    fs::write(&prompt_path, prompt)
        .with_context(|| format!("write prompt: {}", prompt_path.display()))?;
    if let Some(response) = response {
        let response_path = dir.join(format!("{stem}_response.txt"));
        fs::write(&response_path, response)
            .with_context(|| format!("write response: {}", response_path.display()))?;
    }
    Ok(())
}

/// Load every entry, skipping lines that do not parse.
pub fn load_entries(paths: &WorkspacePaths) -> Result<Vec<GenerationLogEntry>> {
    let log_path = paths.generation_log_path();
    if !log_path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(&log_path)
        .with_context(|| format!("read generation log: {}", log_path.display()))?;
    let mut entries = Vec::new();
    for (line_num, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<GenerationLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::warn!(line = line_num + 1, error = %err, "skip corrupt generation log entry");
            }
        }
    }
    Ok(entries)
}
