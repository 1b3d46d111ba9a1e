//! Named JSON documents in the artifacts folder.
use crate::util::write_atomic;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("document {} is not valid JSON: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },
}

/// Read and parse one JSON document.
pub fn read_document(path: &Path) -> Result<Value, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty-print `value` to `path`, replacing any previous document.
pub fn write_document(path: &Path, value: &Value) -> Result<(), StoreError> {
    let mut text = serde_json::to_string_pretty(value).map_err(|err| StoreError::Write {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    text.push('\n');
    write_atomic(path, text.as_bytes()).map_err(|err| StoreError::Write {
        path: path.to_path_buf(),
        message: format!("{err:#}"),
    })
}

/// Artifact documents kept in one folder, created on first write.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Save `value` as `name`, returning the written path.
    pub fn save(&self, value: &Value, name: &str) -> Result<PathBuf, StoreError> {
        let path = self.path_for(name);
        write_document(&path, value)?;
        tracing::info!(path = %path.display(), "saved artifact");
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<Value, StoreError> {
        read_document(&self.path_for(name))
    }
}
