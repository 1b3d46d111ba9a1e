//! aligner CLI entry point.
//!
//! Parses arguments, installs logging, and runs one command. Every fallible
//! setup step (config, subject, schemas, generator) happens here, before the
//! pipeline starts.
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod artifact;
mod cli;
mod extract;
mod generation;
mod pipeline;
mod schema;
mod status_log;
mod store;
mod util;
mod workspace;

use artifact::ArtifactKind;
use cli::{Command, InitArgs, RootArgs, RunArgs, StatusArgs, SubjectArgs};
use generation::lm_log::{load_entries, GenerationLog};
use generation::{generate_logged, resolve_generator};
use pipeline::{load_subject, subject_from_response, subject_request, Pipeline, PipelineError};
use schema::SchemaRegistry;
use status_log::{load_records, StatusRecorder};
use store::{write_document, ArtifactStore, StoreError};
use util::display_path;
use workspace::{load_workspace_config, write_config, AlignerConfig, WorkspacePaths};

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    let args = RootArgs::parse();

    if let Err(err) = init_tracing(args.verbose, args.log_file.as_deref()) {
        eprintln!("error: {err:#}");
        return ExitCode::from(EXIT_CONFIG);
    }

    let result = match args.command {
        Command::Init(args) => cmd_init(args),
        Command::Subject(args) => cmd_subject(args),
        Command::Run(args) => cmd_run(args),
        Command::Status(args) => cmd_status(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Log to stderr, and to `log_file` when given. RUST_LOG wins over `--verbose`.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::Config(_)) => EXIT_CONFIG,
        _ => EXIT_FAILURE,
    }
}

fn config_error(err: impl Into<anyhow::Error>) -> anyhow::Error {
    PipelineError::Config(err.into()).into()
}

fn load_paths(root: &Path, config: Option<&Path>) -> Result<(AlignerConfig, WorkspacePaths)> {
    let config = load_workspace_config(root, config).map_err(config_error)?;
    let paths = WorkspacePaths::new(root.to_path_buf(), &config);
    Ok((config, paths))
}

fn cmd_init(args: InitArgs) -> Result<()> {
    let config = AlignerConfig::default();
    let paths = WorkspacePaths::new(args.root, &config);
    let path = paths.config_path();
    if path.exists() && !args.force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    write_config(&path, &config)?;
    tracing::info!(path = %path.display(), "wrote config");
    println!("wrote {}", path.display());
    Ok(())
}

fn cmd_subject(args: SubjectArgs) -> Result<()> {
    let (config, paths) = load_paths(&args.root, args.config.as_deref())?;
    let subject_path = paths.subject_path();
    if subject_path.exists() && !args.force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            subject_path.display()
        ));
    }
    if args.idea.trim().is_empty() {
        return Err(config_error(anyhow!("--idea must not be empty")));
    }
    let generator = resolve_generator(&config, args.lm.as_deref()).map_err(config_error)?;
    let log = GenerationLog::new(paths.clone(), args.keep_transcripts);

    let request = subject_request(&args.idea, &config.subject_field, &config.generation);
    let raw = generate_logged(generator.as_ref(), Some(&log), &request)
        .context("generate subject")?;
    let document = subject_from_response(&raw, &config.subject_field)?;
    write_document(&subject_path, &document)?;

    tracing::info!(path = %subject_path.display(), "wrote subject");
    println!("wrote {}", display_path(&subject_path, Some(paths.root())));
    Ok(())
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let (config, paths) = load_paths(&args.root, args.config.as_deref())?;

    let subject = load_subject(&paths.subject_path(), &config.subject_field).map_err(config_error)?;
    let schemas = SchemaRegistry::load(
        ArtifactKind::ALL
            .iter()
            .map(|kind| (*kind, paths.schema_path(*kind))),
    )
    .map_err(config_error)?;
    let generator = resolve_generator(&config, args.lm.as_deref()).map_err(config_error)?;

    let store = ArtifactStore::new(paths.artifacts_dir());
    let recorder = StatusRecorder::new(paths.status_log_path());
    let log = GenerationLog::new(paths.clone(), args.keep_transcripts);
    let summary = Pipeline::new(
        generator.as_ref(),
        &schemas,
        &store,
        &recorder,
        &config.generation,
    )
    .with_generation_log(&log)
    .run(&subject)?;

    for path in &summary.artifacts {
        println!("wrote {}", display_path(path, Some(paths.root())));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ArtifactState {
    file: &'static str,
    state: String,
}

fn artifact_states(paths: &WorkspacePaths) -> Vec<ArtifactState> {
    let store = ArtifactStore::new(paths.artifacts_dir());
    ArtifactKind::ALL
        .iter()
        .map(|kind| {
            let state = match store.load(kind.file_name()) {
                Ok(_) => "present".to_string(),
                Err(StoreError::NotFound(_)) => "missing".to_string(),
                Err(err) => format!("unreadable: {err}"),
            };
            ArtifactState {
                file: kind.file_name(),
                state,
            }
        })
        .collect()
}

fn cmd_status(args: StatusArgs) -> Result<()> {
    let (_config, paths) = load_paths(&args.root, args.config.as_deref())?;
    let records = load_records(&paths.status_log_path())?;
    let generations = if args.generations {
        Some(load_entries(&paths)?)
    } else {
        None
    };
    let artifacts = args.artifacts.then(|| artifact_states(&paths));

    if args.json {
        let records = serde_json::to_value(&records).context("serialize status records")?;
        let value = if generations.is_none() && artifacts.is_none() {
            records
        } else {
            let mut object = serde_json::Map::new();
            object.insert("records".to_string(), records);
            if let Some(entries) = &generations {
                let entries = serde_json::to_value(entries).context("serialize generations")?;
                object.insert("generations".to_string(), entries);
            }
            if let Some(states) = &artifacts {
                let states = serde_json::to_value(states).context("serialize artifacts")?;
                object.insert("artifacts".to_string(), states);
            }
            Value::Object(object)
        };
        let text = serde_json::to_string_pretty(&value).context("serialize status")?;
        println!("{text}");
        return Ok(());
    }

    for record in &records {
        println!("{:<20} {:<8} {}", record.file, record.status, record.details);
    }
    if let Some(entries) = generations {
        for entry in &entries {
            let outcome = match &entry.error {
                Some(error) => format!("failed: {error}"),
                None => format!("{} bytes", entry.response_bytes.unwrap_or(0)),
            };
            println!(
                "{:<20} {:<12} {:>7}ms {}",
                entry.purpose, entry.model, entry.duration_ms, outcome
            );
        }
    }
    if let Some(states) = artifacts {
        for artifact in &states {
            println!("{:<20} {}", artifact.file, artifact.state);
        }
    }
    Ok(())
}
