//! Workspace configuration helpers.
//!
//! Loads, validates and writes `aligner.json` so a run starts from a fully
//! resolved, checked configuration.
use super::{AlignerConfig, CONFIG_FILE_NAME, CONFIG_SCHEMA_VERSION};
use crate::util::write_atomic;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

/// Load the config for a workspace.
///
/// An explicit path must exist. Without one, `<root>/aligner.json` is used when
/// present and the defaults otherwise.
pub fn load_workspace_config(root: &Path, explicit: Option<&Path>) -> Result<AlignerConfig> {
    let config = match explicit {
        Some(path) => load_config(path)?,
        None => {
            let path = root.join(CONFIG_FILE_NAME);
            if path.is_file() {
                load_config(&path)?
            } else {
                tracing::debug!(root = %root.display(), "no config file, using defaults");
                AlignerConfig::default()
            }
        }
    };
    validate_config(&config)?;
    Ok(config)
}

fn load_config(path: &Path) -> Result<AlignerConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: AlignerConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Persist a config in a stable JSON format.
pub fn write_config(path: &Path, config: &AlignerConfig) -> Result<()> {
    let mut text = serde_json::to_string_pretty(config).context("serialize config")?;
    text.push('\n');
    write_atomic(path, text.as_bytes()).with_context(|| format!("write config {}", path.display()))
}

/// Validate schema version, paths and generation parameters.
pub fn validate_config(config: &AlignerConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {} (expected {})",
            config.schema_version,
            CONFIG_SCHEMA_VERSION
        ));
    }
    validate_relative_path(&config.artifacts_dir, "artifacts_dir")?;
    validate_relative_path(&config.subject_path, "subject_path")?;
    validate_relative_path(&config.status_log, "status_log")?;
    for (kind, rel) in &config.schemas {
        validate_relative_path(rel, &format!("schemas.{kind}"))?;
    }
    if config.subject_field.trim().is_empty() {
        return Err(anyhow!("subject_field must be non-empty"));
    }
    let generation = &config.generation;
    if generation.model.trim().is_empty() {
        return Err(anyhow!("generation.model must be non-empty"));
    }
    if !(0.0..=2.0).contains(&generation.temperature) {
        return Err(anyhow!(
            "generation.temperature must be within 0.0..=2.0 (got {})",
            generation.temperature
        ));
    }
    if generation.max_tokens == Some(0) {
        return Err(anyhow!("generation.max_tokens must be positive"));
    }
    if let Some(command) = config.lm_command.as_deref() {
        if command.trim().is_empty() {
            return Err(anyhow!("lm_command must be non-empty when set"));
        }
    }
    Ok(())
}

fn validate_relative_path(rel: &str, label: &str) -> Result<()> {
    if rel.trim().is_empty() {
        return Err(anyhow!("{label} must be non-empty"));
    }
    let path = Path::new(rel);
    if path.is_absolute() || has_parent_components(path) {
        return Err(anyhow!(
            "{label} must be a relative path without '..' (got {rel:?})"
        ));
    }
    Ok(())
}

fn has_parent_components(path: &Path) -> bool {
    path.components()
        .any(|component| matches!(component, std::path::Component::ParentDir))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
