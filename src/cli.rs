//! CLI argument parsing for the aligner.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "aligner",
    version,
    about = "Generate schema-validated project artifacts from an app subject",
    after_help = "Commands:\n  init                      Write a default aligner.json into the root\n  subject --idea <TEXT>     Generate the subject document from a short idea\n  run                       Generate structure.json, models.json and other_values.json\n  status                    Show the status log\n\nExamples:\n  aligner init --root ./myapp\n  aligner subject --root ./myapp --idea \"crossword puzzle app\"\n  aligner run --root ./myapp --lm \"llm -m gpt-4o-mini\"\n  aligner status --root ./myapp --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Also append logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Subject(SubjectArgs),
    Run(RunArgs),
    Status(StatusArgs),
}

/// Init command inputs.
#[derive(Parser, Debug)]
#[command(about = "Write a default aligner.json")]
pub struct InitArgs {
    /// Workspace root all configured paths are relative to
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Overwrite an existing aligner.json
    #[arg(long)]
    pub force: bool,
}

/// Subject command inputs.
#[derive(Parser, Debug)]
#[command(about = "Generate the subject document from a short app idea")]
pub struct SubjectArgs {
    /// Workspace root all configured paths are relative to
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Config file (defaults to <root>/aligner.json when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Short description of the app
    #[arg(long, value_name = "TEXT")]
    pub idea: String,

    /// Generation command fed the prompt on stdin, instead of the HTTP service
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Overwrite an existing subject document
    #[arg(long)]
    pub force: bool,

    /// Store full prompts and responses under logs/transcripts
    #[arg(long)]
    pub keep_transcripts: bool,
}

/// Run command inputs.
#[derive(Parser, Debug)]
#[command(about = "Generate, validate and persist every artifact")]
pub struct RunArgs {
    /// Workspace root all configured paths are relative to
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Config file (defaults to <root>/aligner.json when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Generation command fed the prompt on stdin, instead of the HTTP service
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Store full prompts and responses under logs/transcripts
    #[arg(long)]
    pub keep_transcripts: bool,
}

/// Status command inputs.
#[derive(Parser, Debug)]
#[command(about = "Show recorded stage outcomes")]
pub struct StatusArgs {
    /// Workspace root all configured paths are relative to
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Config file (defaults to <root>/aligner.json when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    /// Also list generation calls from logs/generation.jsonl
    #[arg(long)]
    pub generations: bool,

    /// Also report which artifacts are present and readable
    #[arg(long)]
    pub artifacts: bool,
}
