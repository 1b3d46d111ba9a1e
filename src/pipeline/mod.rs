//! The artifact pipeline.
//!
//! Stages run in a fixed order: structure, models, other values. Each stage
//! generates raw text, extracts and parses its JSON payload, validates it
//! against the kind's schema, persists it, then records the outcome in the
//! status log. The first failing stage is recorded and ends the run; nothing
//! is retried.
use crate::artifact::ArtifactKind;
use crate::extract::extract_json;
use crate::generation::lm_log::GenerationLog;
use crate::generation::{generate_logged, GenerationError, Generator};
use crate::schema::{SchemaRegistry, ValidationError};
use crate::status_log::{StageStatus, StatusRecorder};
use crate::store::{ArtifactStore, StoreError};
use crate::util::truncate_string;
use crate::workspace::GenerationConfig;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

mod stages;
mod subject;

pub use stages::{StageDefinition, STAGES};
pub use subject::{load_subject, subject_from_response, subject_request, Subject};

const SNIPPET_BYTES: usize = 200;

/// Why one stage did not produce its artifact.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("generated content is not valid JSON: {source} (content starts: {snippet:?})")]
    Parse {
        #[source]
        source: serde_json::Error,
        snippet: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persist(#[from] StoreError),

    #[error("{0} was not produced earlier in this run")]
    MissingInput(ArtifactKind),
}

impl StageError {
    /// Storage failed rather than the generated content.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persist(_))
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0:#}")]
    Config(anyhow::Error),

    #[error("stage {file} failed: {source}")]
    Stage {
        file: &'static str,
        #[source]
        source: StageError,
    },

    /// `stage` holds the stage failure that was being recorded, if any.
    #[error(
        "could not record {status} for {file} in the status log: {error:#}{}",
        stage_note(.stage)
    )]
    StatusLog {
        file: &'static str,
        status: StageStatus,
        error: anyhow::Error,
        stage: Option<StageError>,
    },
}

fn stage_note(stage: &Option<StageError>) -> String {
    match stage {
        Some(err) => format!("; stage failure: {err}"),
        None => String::new(),
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub artifacts: Vec<PathBuf>,
}

pub struct Pipeline<'a> {
    generator: &'a dyn Generator,
    schemas: &'a SchemaRegistry,
    store: &'a ArtifactStore,
    recorder: &'a StatusRecorder,
    generation: &'a GenerationConfig,
    log: Option<&'a GenerationLog>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        generator: &'a dyn Generator,
        schemas: &'a SchemaRegistry,
        store: &'a ArtifactStore,
        recorder: &'a StatusRecorder,
        generation: &'a GenerationConfig,
    ) -> Self {
        Self {
            generator,
            schemas,
            store,
            recorder,
            generation,
            log: None,
        }
    }

    pub fn with_generation_log(mut self, log: &'a GenerationLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Run every stage for `subject`, stopping at the first failure.
    pub fn run(&self, subject: &Subject) -> Result<RunSummary, PipelineError> {
        let missing: Vec<&str> = STAGES
            .iter()
            .filter(|stage| !self.schemas.contains(stage.kind))
            .map(|stage| stage.kind.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::Config(anyhow::anyhow!(
                "no schema loaded for {}",
                missing.join(", ")
            )));
        }

        let mut produced: BTreeMap<ArtifactKind, Value> = BTreeMap::new();
        let mut summary = RunSummary::default();
        for stage in &STAGES {
            let file = stage.kind.file_name();
            let start = Instant::now();
            match self.run_stage(stage, subject, &produced) {
                Ok((value, path)) => {
                    tracing::info!(
                        artifact = file,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "stage complete"
                    );
                    let details = format!("{file} generated and validated successfully.");
                    if let Err(error) = self.recorder.record(file, StageStatus::Success, &details)
                    {
                        return Err(self.status_log_error(file, StageStatus::Success, error, None));
                    }
                    produced.insert(stage.kind, value);
                    summary.artifacts.push(path);
                }
                Err(err) => {
                    match &err {
                        _ if err.is_persistence() => {
                            tracing::error!(artifact = file, error = %err, "persistence failure");
                        }
                        StageError::Validation(violation) => {
                            let schema = self
                                .schemas
                                .schema_path(stage.kind)
                                .map(|path| path.display().to_string())
                                .unwrap_or_default();
                            tracing::error!(
                                artifact = file,
                                schema = %schema,
                                violations = violation.violations,
                                error = %err,
                                "stage failed validation"
                            );
                        }
                        _ => tracing::error!(artifact = file, error = %err, "stage failed"),
                    }
                    if let Err(error) =
                        self.recorder
                            .record(file, StageStatus::Failure, &err.to_string())
                    {
                        return Err(self.status_log_error(
                            file,
                            StageStatus::Failure,
                            error,
                            Some(err),
                        ));
                    }
                    return Err(PipelineError::Stage { file, source: err });
                }
            }
        }
        Ok(summary)
    }

    fn run_stage(
        &self,
        stage: &StageDefinition,
        subject: &Subject,
        produced: &BTreeMap<ArtifactKind, Value>,
    ) -> Result<(Value, PathBuf), StageError> {
        let request = stage.build_request(subject, produced, self.generation)?;
        tracing::info!(
            artifact = %request.purpose,
            model = %request.model,
            max_tokens = request.max_tokens,
            "generating"
        );
        let raw = generate_logged(self.generator, self.log, &request)?;

        let payload = extract_json(&raw);
        let value: Value = serde_json::from_str(payload).map_err(|source| StageError::Parse {
            source,
            snippet: truncate_string(payload, SNIPPET_BYTES),
        })?;

        self.schemas.validate(stage.kind, &value)?;
        let path = self.store.save(&value, stage.kind.file_name())?;
        Ok((value, path))
    }

    fn status_log_error(
        &self,
        file: &'static str,
        status: StageStatus,
        error: anyhow::Error,
        stage: Option<StageError>,
    ) -> PipelineError {
        tracing::error!(
            file,
            log = %self.recorder.path().display(),
            error = %format!("{error:#}"),
            "status log write failed"
        );
        PipelineError::StatusLog {
            file,
            status,
            error,
            stage,
        }
    }
}

#[cfg(test)]
mod tests;
