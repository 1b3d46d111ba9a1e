//! Local command backend.
//!
//! Runs a user-configured command with the rendered prompt on stdin and takes
//! stdout as the response. Any text-in/text-out tool works (`llm`,
//! `ollama run <model>`, a wrapper script adding caching).
//!
//! The command string is split with shell-words; its program must resolve on
//! `PATH` (or be a path) when the backend is built.
use super::{GenerationError, GenerationRequest, Generator};
use crate::util::truncate_string;
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(command: &str) -> Result<Self> {
        let mut args =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        if args.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        let name = args.remove(0);
        let program =
            which::which(&name).with_context(|| format!("LM command not found: {name}"))?;
        Ok(Self { program, args })
    }
}

impl Generator for CommandGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let prompt = request.render_prompt();
        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                GenerationError::Command(format!("spawn {}: {err}", self.program.display()))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).map_err(|err| {
                GenerationError::Command(format!("write prompt to LM stdin: {err}"))
            })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|err| GenerationError::Command(format!("wait for LM command: {err}")))?;

        tracing::info!(
            purpose = %request.purpose,
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "lm invoke complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GenerationError::Command(format!(
                "exited with {}: {}",
                output.status,
                truncate_string(stderr.trim(), 500)
            )));
        }

        let text = String::from_utf8(output.stdout)
            .map_err(|err| GenerationError::Malformed(format!("LM stdout is not UTF-8: {err}")))?;
        if text.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(text)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::generation::Message;

    fn request() -> GenerationRequest {
        GenerationRequest {
            purpose: "structure.json".to_string(),
            model: "test".to_string(),
            temperature: 0.0,
            max_tokens: 100,
            messages: vec![Message::user("describe the app")],
        }
    }

    #[test]
    fn echoes_prompt_through_cat() {
        let generator = CommandGenerator::new("cat").expect("cat on PATH");
        let text = generator.generate(&request()).expect("generate");
        assert!(text.starts_with("# Task: structure.json"));
        assert!(text.contains("describe the app"));
    }

    #[test]
    fn nonzero_exit_is_command_error() {
        let generator =
            CommandGenerator::new("sh -c 'cat >/dev/null; echo boom >&2; exit 3'").unwrap();
        let err = generator.generate(&request()).unwrap_err();
        match err {
            GenerationError::Command(message) => assert!(message.contains("boom"), "{message}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_output_is_empty_error() {
        let generator = CommandGenerator::new("sh -c 'cat >/dev/null; echo'").unwrap();
        let err = generator.generate(&request()).unwrap_err();
        assert!(matches!(err, GenerationError::Empty));
    }

    #[test]
    fn unknown_program_is_rejected_up_front() {
        let err = CommandGenerator::new("definitely-not-a-real-lm-binary --flag").unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandGenerator::new("   ").is_err());
    }
}
