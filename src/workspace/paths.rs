//! Typed paths into a workspace.
//!
//! Centralizing path construction keeps file access consistent between the
//! pipeline, the `subject` command and the `status` command.
use super::{AlignerConfig, CONFIG_FILE_NAME};
use crate::artifact::ArtifactKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    root: PathBuf,
    config: AlignerConfig,
}

impl WorkspacePaths {
    pub fn new(root: PathBuf, config: &AlignerConfig) -> Self {
        Self {
            root,
            config: config.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the default `aligner.json` path.
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join(&self.config.artifacts_dir)
    }

    pub fn artifact_path(&self, kind: ArtifactKind) -> PathBuf {
        self.artifacts_dir().join(kind.file_name())
    }

    pub fn subject_path(&self) -> PathBuf {
        self.root.join(&self.config.subject_path)
    }

    pub fn status_log_path(&self) -> PathBuf {
        self.root.join(&self.config.status_log)
    }

    /// Schema for `kind`: the configured override, else the last accepted
    /// artifact of that kind.
    pub fn schema_path(&self, kind: ArtifactKind) -> PathBuf {
        match self.config.schemas.get(&kind) {
            Some(rel) => self.root.join(rel),
            None => self.artifact_path(kind),
        }
    }

    /// Return the `logs/` directory path.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Return the `logs/generation.jsonl` path.
    pub fn generation_log_path(&self) -> PathBuf {
        self.logs_dir().join("generation.jsonl")
    }

    /// Return the `logs/transcripts/` directory for full prompt/response text.
    pub fn transcripts_dir(&self) -> PathBuf {
        self.logs_dir().join("transcripts")
    }
}
