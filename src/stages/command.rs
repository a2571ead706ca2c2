//! Stage adapters that shell out to external programs.
//!
//! Each stage is configured as a program plus an argument template. The
//! `CommandExecutor` trait keeps the adapters testable without the real
//! engines installed.

use crate::config::StageCommand;
use crate::error::{RelayError, Result};
use crate::stages::language;
use crate::stages::synthesizer::Synthesizer;
use crate::stages::transcriber::{Transcriber, Transcript};
use crate::stages::translator::Translator;
use std::fs;
use std::path::Path;
use std::process::Command;

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use from concurrent requests.
pub trait CommandExecutor: Send + Sync {
    /// Execute `program` with `args` and return its stdout.
    ///
    /// Fails if the program cannot be started or exits non-zero.
    fn execute(&self, program: &str, args: &[String]) -> Result<String>;
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, program: &str, args: &[String]) -> Result<String> {
        let output = Command::new(program).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RelayError::StageToolNotFound {
                    tool: program.to_string(),
                }
            } else {
                RelayError::StageToolFailed {
                    message: format!("Failed to execute {}: {}", program, e),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RelayError::StageToolFailed {
                message: format!(
                    "{} failed with status {:?}: {}",
                    program,
                    output.status.code(),
                    stderr.trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Substitute `{name}` placeholders in every argument.
///
/// Each template is scanned once, left to right; substituted values are
/// emitted verbatim and never rescanned. Unknown placeholders are left
/// untouched.
pub fn expand_args(args: &[String], values: &[(&str, &str)]) -> Vec<String> {
    args.iter().map(|arg| expand_template(arg, values)).collect()
}

fn expand_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Transcriber backed by an external program.
///
/// Placeholder: `{input}`. Stdout is either a JSON object with `text` and
/// optional `language`, or plain text.
pub struct CommandTranscriber<E: CommandExecutor> {
    command: StageCommand,
    executor: E,
}

impl<E: CommandExecutor> CommandTranscriber<E> {
    pub fn new(command: StageCommand, executor: E) -> Self {
        Self { command, executor }
    }
}

impl<E: CommandExecutor> Transcriber for CommandTranscriber<E> {
    fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
        let input = audio_path.to_string_lossy();
        let args = expand_args(&self.command.args, &[("input", input.as_ref())]);
        let stdout = self.executor.execute(&self.command.program, &args)?;
        Ok(parse_transcript(&stdout))
    }

    fn name(&self) -> &str {
        &self.command.program
    }
}

fn parse_transcript(stdout: &str) -> Transcript {
    let trimmed = stdout.trim();
    if trimmed.starts_with('{')
        && let Ok(transcript) = serde_json::from_str::<Transcript>(trimmed)
    {
        return Transcript::new(transcript.text.trim(), transcript.language);
    }
    Transcript::new(trimmed, crate::defaults::UNKNOWN_LANGUAGE)
}

/// Translator backed by an external program.
///
/// Placeholders: `{text}`, `{source}`, `{target}`. When no source hint is
/// given, the source is guessed from the script, or passed as `auto`.
pub struct CommandTranslator<E: CommandExecutor> {
    command: StageCommand,
    executor: E,
}

impl<E: CommandExecutor> CommandTranslator<E> {
    pub fn new(command: StageCommand, executor: E) -> Self {
        Self { command, executor }
    }
}

impl<E: CommandExecutor> Translator for CommandTranslator<E> {
    fn translate(&self, text: &str, source: Option<&str>, target: &str) -> Result<String> {
        let source = source
            .or_else(|| language::detect_language(text))
            .unwrap_or("auto");
        let args = expand_args(
            &self.command.args,
            &[("text", text), ("source", source), ("target", target)],
        );
        let stdout = self.executor.execute(&self.command.program, &args)?;
        Ok(clean_translation(&stdout))
    }

    fn name(&self) -> &str {
        &self.command.program
    }
}

/// First non-empty line, trimmed, without surrounding quotes.
pub fn clean_translation(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_matches(|c| c == '"' || c == '\'').trim().to_string())
        .unwrap_or_default()
}

/// Synthesizer backed by an external program.
///
/// Placeholders: `{text}`, `{lang}`, `{output}`. The program must leave a
/// non-empty file at `{output}`.
pub struct CommandSynthesizer<E: CommandExecutor> {
    command: StageCommand,
    executor: E,
}

impl<E: CommandExecutor> CommandSynthesizer<E> {
    pub fn new(command: StageCommand, executor: E) -> Self {
        Self { command, executor }
    }
}

impl<E: CommandExecutor> Synthesizer for CommandSynthesizer<E> {
    fn synthesize(&self, text: &str, language: &str, output: &Path) -> Result<()> {
        let output_arg = output.to_string_lossy();
        let args = expand_args(
            &self.command.args,
            &[
                ("text", text),
                ("lang", language),
                ("output", output_arg.as_ref()),
            ],
        );
        self.executor.execute(&self.command.program, &args)?;

        match fs::metadata(output) {
            Ok(meta) if meta.len() > 0 => Ok(()),
            Ok(_) => Err(RelayError::Synthesis {
                message: format!("{} produced an empty file", self.command.program),
            }),
            Err(e) => Err(RelayError::Synthesis {
                message: format!(
                    "{} did not write {}: {}",
                    self.command.program,
                    output.display(),
                    e
                ),
            }),
        }
    }

    fn name(&self) -> &str {
        &self.command.program
    }
}
