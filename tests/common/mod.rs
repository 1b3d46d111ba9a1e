//! Shared test infrastructure for integration tests.
//!
//! A [`Workspace`] is a scratch root holding a subject document, schemas and a
//! shell script standing in for the generation service. The script reads the
//! prompt from stdin and answers with `responses/<file>.txt`, keyed by the
//! `# Task: <file>` header; a task without a response file exits non-zero.

use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

const FAKE_LM: &str = r##"#!/bin/sh
read -r header
cat >/dev/null
task=${header#"# Task: "}
response="$(dirname "$0")/responses/$task.txt"
if [ ! -f "$response" ]; then
  echo "no scripted response for $task" >&2
  exit 1
fi
cat "$response"
"##;

pub struct Workspace {
    _dir: TempDir,
    pub root: PathBuf,
}

impl Workspace {
    pub fn empty() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let root = dir.path().to_path_buf();
        fs::write(root.join("fake_lm.sh"), FAKE_LM).expect("write fake lm");
        fs::create_dir_all(root.join("responses")).expect("create responses dir");
        Self { _dir: dir, root }
    }

    /// Workspace with a subject, hand-authored schemas and an aligner.json
    /// pointing at them.
    pub fn with_schemas() -> Self {
        let workspace = Self::empty();
        workspace.write("alignment_files/subject.json", r#"{"subject": "Crossword app"}"#);
        workspace.write(
            "schemas/structure.json",
            r#"{"type": "object", "required": ["lib"]}"#,
        );
        workspace.write(
            "schemas/models.json",
            r#"{"type": "object", "required": ["models"]}"#,
        );
        workspace.write("schemas/other_values.json", r#"{"type": "object"}"#);
        workspace.write(
            "aligner.json",
            r#"{
  "schema_version": 1,
  "schemas": {
    "structure": "schemas/structure.json",
    "models": "schemas/models.json",
    "other_values": "schemas/other_values.json"
  }
}"#,
        );
        workspace
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn write(&self, rel: &str, text: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(path, text).expect("write file");
    }

    /// Script the generation response for one task, e.g. `models.json`.
    pub fn respond(&self, task: &str, text: &str) {
        self.write(&format!("responses/{task}.txt"), text);
    }

    pub fn read_json(&self, rel: &str) -> Value {
        let text = fs::read_to_string(self.path(rel)).expect("read json");
        serde_json::from_str(&text).expect("parse json")
    }

    pub fn lm_command(&self) -> String {
        format!("sh {}", self.path("fake_lm.sh").display())
    }

    /// Run `aligner <command> --root <root> [args...]`.
    pub fn aligner(&self, command: &str, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_aligner"))
            .arg(command)
            .arg("--root")
            .arg(&self.root)
            .args(args)
            .env_remove("ALIGNER_LM_COMMAND")
            .env_remove("RUST_LOG")
            .output()
            .expect("run aligner")
    }

    /// Run a generating command with the fake generation script.
    pub fn aligner_with_lm(&self, command: &str, args: &[&str]) -> Output {
        let lm = self.lm_command();
        let mut full = vec!["--lm", lm.as_str()];
        full.extend_from_slice(args);
        self.aligner(command, &full)
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
