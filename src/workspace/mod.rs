//! Workspace configuration and layout.
//!
//! A workspace is the directory a run is anchored to: it holds the optional
//! `aligner.json` config, the artifacts folder, the status log and the
//! generation logs. Every configured path is relative to its root.
use crate::artifact::ArtifactKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod config;
mod paths;

pub use config::{load_workspace_config, write_config};
pub use paths::WorkspacePaths;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const CONFIG_FILE_NAME: &str = "aligner.json";

/// Environment variable consulted for the generation command when neither the
/// CLI nor the config names one.
pub const LM_COMMAND_ENV: &str = "ALIGNER_LM_COMMAND";

/// Pack-owned run configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    pub schema_version: u32,
    /// Folder receiving the generated artifacts.
    pub artifacts_dir: String,
    /// Document holding the app subject.
    pub subject_path: String,
    /// Key of the subject text inside the subject document.
    pub subject_field: String,
    /// JSON array of stage outcomes.
    pub status_log: String,
    /// Schema overrides per artifact kind. Kinds not listed are validated
    /// against their own previously accepted artifact.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<ArtifactKind, String>,
    pub generation: GenerationConfig,
    /// Local command used instead of the HTTP service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lm_command: Option<String>,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            artifacts_dir: "alignment_files".to_string(),
            subject_path: "alignment_files/subject.json".to_string(),
            subject_field: "subject".to_string(),
            status_log: "state_report.json".to_string(),
            schemas: BTreeMap::new(),
            generation: GenerationConfig::default(),
            lm_command: None,
        }
    }
}

/// Parameters for the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f64,
    /// Overrides the per-stage output limit when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Base URL of an OpenAI-compatible API.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 1.35,
            max_tokens: None,
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}
