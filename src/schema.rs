//! Per-artifact JSON Schemas, loaded once before any generation.
//!
//! By default the schema for an artifact kind is the last accepted instance of
//! that kind, so new output is checked against the previous shape. Schema
//! paths are configurable, which lets a hand-authored schema replace it.
use crate::artifact::ArtifactKind;
use crate::store::{read_document, StoreError};
use jsonschema::Validator;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaLoadError {
    #[error("schema for {kind} unavailable: {source}")]
    Unreadable {
        kind: ArtifactKind,
        #[source]
        source: StoreError,
    },

    #[error("schema for {kind} at {} is not a usable JSON Schema: {message}", .path.display())]
    Invalid {
        kind: ArtifactKind,
        path: PathBuf,
        message: String,
    },
}

/// An instance that does not conform to its schema.
#[derive(Debug, Error)]
#[error("{kind} does not match its schema: {message}")]
pub struct ValidationError {
    pub kind: ArtifactKind,
    /// Description of the first violated constraint.
    pub message: String,
    /// Total number of violations found.
    pub violations: usize,
}

struct LoadedSchema {
    path: PathBuf,
    validator: Validator,
}

/// Compiled schemas keyed by artifact kind.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<ArtifactKind, LoadedSchema>,
}

impl SchemaRegistry {
    /// Read and compile one schema document per `(kind, path)` pair.
    pub fn load<I>(sources: I) -> Result<Self, SchemaLoadError>
    where
        I: IntoIterator<Item = (ArtifactKind, PathBuf)>,
    {
        let mut registry = Self::default();
        for (kind, path) in sources {
            let document = read_document(&path)
                .map_err(|source| SchemaLoadError::Unreadable { kind, source })?;
            registry.insert(kind, path, &document)?;
        }
        Ok(registry)
    }

    /// Compile `schema` and register it for `kind`, replacing any earlier one.
    pub fn insert(
        &mut self,
        kind: ArtifactKind,
        path: PathBuf,
        schema: &Value,
    ) -> Result<(), SchemaLoadError> {
        let validator =
            jsonschema::validator_for(schema).map_err(|err| SchemaLoadError::Invalid {
                kind,
                path: path.clone(),
                message: err.to_string(),
            })?;
        tracing::debug!(%kind, path = %path.display(), "loaded schema");
        self.schemas.insert(kind, LoadedSchema { path, validator });
        Ok(())
    }

    pub fn contains(&self, kind: ArtifactKind) -> bool {
        self.schemas.contains_key(&kind)
    }

    pub fn schema_path(&self, kind: ArtifactKind) -> Option<&Path> {
        self.schemas.get(&kind).map(|schema| schema.path.as_path())
    }

    /// Check `instance` against the schema registered for `kind`.
    pub fn validate(&self, kind: ArtifactKind, instance: &Value) -> Result<(), ValidationError> {
        let Some(schema) = self.schemas.get(&kind) else {
            return Err(ValidationError {
                kind,
                message: "no schema loaded".to_string(),
                violations: 0,
            });
        };
        let mut errors = schema.validator.iter_errors(instance);
        let Some(first) = errors.next() else {
            return Ok(());
        };
        let message = first.to_string();
        let violations = 1 + errors.count();
        Err(ValidationError {
            kind,
            message,
            violations,
        })
    }
}
