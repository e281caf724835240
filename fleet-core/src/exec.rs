//! External command execution
//!
//! The engine never spawns processes directly. Everything goes through a
//! [`CommandRunner`], which makes the git-facing code testable with scripted
//! outputs and keeps process mechanics in one place.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{Error, Result};

/// Captured result of one external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Process exit code (`None` when terminated by a signal)
    pub exit_code: Option<i32>,
    /// Lines written to stdout
    pub stdout: Vec<String>,
    /// Lines written to stderr
    pub stderr: Vec<String>,
}

impl CommandOutput {
    /// Build a successful output from stdout text
    pub fn ok(stdout: &str) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.lines().map(str::to_string).collect(),
            stderr: Vec::new(),
        }
    }

    /// Build a failed output with the given exit code and stderr text
    pub fn failed(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: Vec::new(),
            stderr: stderr.lines().map(str::to_string).collect(),
        }
    }

    /// Whether the process exited with code zero
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout lines joined and trimmed
    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n").trim().to_string()
    }

    /// Stderr lines joined and trimmed
    pub fn stderr_text(&self) -> String {
        self.stderr.join("\n").trim().to_string()
    }
}

/// Capability to run an external program and capture its output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` in `workdir`, without shell interpretation
    async fn run(&self, program: &str, args: &[String], workdir: &Path) -> Result<CommandOutput>;
}

/// [`CommandRunner`] backed by real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a new process runner
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String], workdir: &Path) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound && !workdir.exists() {
                    Error::InvalidPath(workdir.to_path_buf())
                } else if e.kind() == std::io::ErrorKind::NotFound {
                    Error::Config(format!(
                        "Executable '{}' not found. Is it installed and on PATH?",
                        program
                    ))
                } else {
                    Error::Io(e)
                }
            })?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(str::to_string)
                .collect(),
            stderr: String::from_utf8_lossy(&output.stderr)
                .lines()
                .map(str::to_string)
                .collect(),
        })
    }
}
