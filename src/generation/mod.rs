//! Generation service boundary.
//!
//! The pipeline hands a [`GenerationRequest`] to a [`Generator`] and gets raw
//! text back. Two backends exist: an OpenAI-compatible HTTP endpoint and a
//! local command fed the rendered prompt on stdin. Both are synchronous and
//! have no timeout; a hung call blocks the run.
use crate::util::truncate_string;
use crate::workspace::{AlignerConfig, LM_COMMAND_ENV};
use lm_log::{GenerationLog, GenerationLogBuilder};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

mod http_client;
mod lm_client;
pub mod lm_log;

pub use http_client::HttpGenerator;
pub use lm_client::CommandGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Assistant,
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::Assistant => f.write_str("assistant"),
            Self::User => f.write_str("user"),
        }
    }
}

/// A role-tagged prompt fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Everything one generation call needs.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// What is being generated, e.g. `structure.json`. Used for logs.
    pub purpose: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

impl GenerationRequest {
    /// Render the messages as one markdown document for text-in/text-out tools.
    pub fn render_prompt(&self) -> String {
        let mut prompt = format!("# Task: {}\n\n", self.purpose);
        for message in &self.messages {
            prompt.push_str(&format!("## {}\n\n{}\n\n", message.role, message.content.trim()));
        }
        prompt
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("generation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response from generation service: {0}")]
    Malformed(String),

    #[error("generation service returned an empty response")]
    Empty,

    #[error("generation command failed: {0}")]
    Command(String),
}

/// Produces raw text for a request.
pub trait Generator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        (**self).generate(request)
    }
}

/// Run one call, recording it in the generation log when one is given.
pub fn generate_logged(
    generator: &dyn Generator,
    log: Option<&GenerationLog>,
    request: &GenerationRequest,
) -> Result<String, GenerationError> {
    let prompt = request.render_prompt();
    let builder = GenerationLogBuilder::start(request, &prompt);
    let result = generator.generate(request);
    match &result {
        Ok(text) => {
            tracing::debug!(
                purpose = %request.purpose,
                response = %truncate_string(text, 2000),
                "received response"
            );
            if let Some(log) = log {
                log.record(&builder.success(text), &prompt, Some(text));
            }
        }
        Err(err) => {
            if let Some(log) = log {
                log.record(&builder.failed(err.to_string()), &prompt, None);
            }
        }
    }
    result
}

/// Pick the backend.
///
/// Priority: `--lm` flag, `lm_command` in the config, the
/// `ALIGNER_LM_COMMAND` environment variable, then the HTTP service, which
/// needs its API key variable to be set.
pub fn resolve_generator(
    config: &AlignerConfig,
    cli_command: Option<&str>,
) -> Result<Box<dyn Generator>> {
    let env_command = std::env::var(LM_COMMAND_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty());
    let command = cli_command
        .map(str::to_string)
        .or_else(|| config.lm_command.clone())
        .or(env_command);
    if let Some(command) = command {
        tracing::info!(command = %command, "using generation command");
        return Ok(Box::new(CommandGenerator::new(&command)?));
    }

    let key_var = &config.generation.api_key_env;
    let api_key = std::env::var(key_var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| {
            anyhow!("{key_var} environment variable not set (or pass --lm to use a local command)")
        })?;
    tracing::info!(api_base = %config.generation.api_base, "using HTTP generation service");
    Ok(Box::new(HttpGenerator::new(&config.generation.api_base, api_key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_prompt_keeps_message_order() {
        let request = GenerationRequest {
            purpose: "models.json".to_string(),
            model: "m".to_string(),
            temperature: 1.0,
            max_tokens: 10,
            messages: vec![
                Message::system("persona"),
                Message::assistant("{\"lib\": {}}"),
                Message::user("  define the models \n"),
            ],
        };

        let prompt = request.render_prompt();
        assert!(prompt.starts_with("# Task: models.json\n\n"));
        let system = prompt.find("## system\n\npersona").unwrap();
        let assistant = prompt.find("## assistant").unwrap();
        let user = prompt.find("## user\n\ndefine the models\n").unwrap();
        assert!(system < assistant && assistant < user);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
