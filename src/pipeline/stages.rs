//! Stage definitions: which prompts and limits produce each artifact.
use super::{StageError, Subject};
use crate::artifact::ArtifactKind;
use crate::generation::{GenerationRequest, Message};
use crate::workspace::GenerationConfig;
use serde_json::Value;
use std::collections::BTreeMap;

// Prompt templates loaded at compile time
const STRUCTURE_SYSTEM: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/structure_system.md"
));
const STRUCTURE_TASK: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/structure_task.md"
));
const MODELS_SYSTEM: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/models_system.md"
));
const MODELS_TASK: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/models_task.md"
));
const OTHER_VALUES_SYSTEM: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/other_values_system.md"
));
const OTHER_VALUES_TASK: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/other_values_task.md"
));

/// How one artifact is generated.
#[derive(Debug)]
pub struct StageDefinition {
    pub kind: ArtifactKind,
    persona: &'static str,
    task: &'static str,
    /// Output limit unless the config overrides it.
    pub max_tokens: u32,
}

/// Every stage, in run order.
pub static STAGES: [StageDefinition; 3] = [
    StageDefinition {
        kind: ArtifactKind::Structure,
        persona: STRUCTURE_SYSTEM,
        task: STRUCTURE_TASK,
        max_tokens: 10_000,
    },
    StageDefinition {
        kind: ArtifactKind::Models,
        persona: MODELS_SYSTEM,
        task: MODELS_TASK,
        max_tokens: 5_000,
    },
    StageDefinition {
        kind: ArtifactKind::OtherValues,
        persona: OTHER_VALUES_SYSTEM,
        task: OTHER_VALUES_TASK,
        max_tokens: 5_000,
    },
];

impl StageDefinition {
    /// Assemble persona, subject and prior-artifact context, then the task.
    pub fn build_request(
        &self,
        subject: &Subject,
        produced: &BTreeMap<ArtifactKind, Value>,
        generation: &GenerationConfig,
    ) -> Result<GenerationRequest, StageError> {
        let mut messages = vec![
            Message::system(self.persona.trim()),
            Message::assistant(format!("Subject:\n{}", subject.text)),
        ];
        for dep in self.kind.dependencies() {
            let value = produced.get(dep).ok_or(StageError::MissingInput(*dep))?;
            let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            messages.push(Message::assistant(format!(
                "{} ({}):\n{}",
                context_label(*dep),
                dep.file_name(),
                pretty
            )));
        }
        messages.push(Message::user(self.task.trim()));

        Ok(GenerationRequest {
            purpose: self.kind.file_name().to_string(),
            model: generation.model.clone(),
            temperature: generation.temperature,
            max_tokens: generation.max_tokens.unwrap_or(self.max_tokens),
            messages,
        })
    }
}

fn context_label(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Structure => "File structure",
        ArtifactKind::Models => "Models",
        ArtifactKind::OtherValues => "Other values",
    }
}
