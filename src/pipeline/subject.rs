//! The app subject: loaded once per run, and optionally generated from an idea.
use crate::extract::extract_json;
use crate::generation::{GenerationRequest, Message};
use crate::store::{read_document, StoreError};
use crate::workspace::GenerationConfig;
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SUBJECT_SYSTEM: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/subject_system.md"
));
const SUBJECT_TASK: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/subject_task.md"
));
const SUBJECT_MAX_TOKENS: u32 = 5_000;

/// Document name used for subject generation logs.
const SUBJECT_PURPOSE: &str = "subject.json";

/// Immutable for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub text: String,
}

#[derive(Debug, Error)]
pub enum SubjectError {
    #[error("subject document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("subject document {} is not valid JSON: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("subject document {} has no \"{field}\" field", .path.display())]
    MissingField { path: PathBuf, field: String },

    #[error("\"{field}\" in subject document {} is not text", .path.display())]
    NotText { path: PathBuf, field: String },

    #[error(transparent)]
    Unreadable(StoreError),
}

/// Read the subject text from `field` of the document at `path`.
pub fn load_subject(path: &Path, field: &str) -> Result<Subject, SubjectError> {
    let document = read_document(path).map_err(|err| match err {
        StoreError::NotFound(path) => SubjectError::NotFound(path),
        StoreError::Parse { path, source } => SubjectError::Malformed { path, source },
        other => SubjectError::Unreadable(other),
    })?;
    match document.get(field) {
        None | Some(Value::Null) => Err(SubjectError::MissingField {
            path: path.to_path_buf(),
            field: field.to_string(),
        }),
        Some(Value::String(text)) => Ok(Subject { text: text.clone() }),
        Some(_) => Err(SubjectError::NotText {
            path: path.to_path_buf(),
            field: field.to_string(),
        }),
    }
}

/// Request that expands a short idea into a subject document.
pub fn subject_request(idea: &str, field: &str, generation: &GenerationConfig) -> GenerationRequest {
    // Fill the field first so placeholder-like text in the idea stays verbatim.
    let task = SUBJECT_TASK
        .replace("{subject_field}", field)
        .replace("{idea}", idea.trim());
    GenerationRequest {
        purpose: SUBJECT_PURPOSE.to_string(),
        model: generation.model.clone(),
        temperature: generation.temperature,
        max_tokens: generation.max_tokens.unwrap_or(SUBJECT_MAX_TOKENS),
        messages: vec![Message::system(SUBJECT_SYSTEM.trim()), Message::user(task.trim())],
    }
}

/// Turn a generated response into a subject document.
///
/// The result must be a JSON object whose `field` holds text.
pub fn subject_from_response(raw: &str, field: &str) -> Result<Value> {
    let payload = extract_json(raw);
    let value: Value =
        serde_json::from_str(payload).context("generated subject is not valid JSON")?;
    let Some(object) = value.as_object() else {
        return Err(anyhow!("generated subject is not a JSON object"));
    };
    match object.get(field) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(value),
        Some(Value::String(_)) => Err(anyhow!("generated subject has an empty \"{field}\" field")),
        Some(_) => Err(anyhow!("generated subject field \"{field}\" is not text")),
        None => Err(anyhow!("generated subject has no \"{field}\" field")),
    }
}
