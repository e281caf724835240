//! Command gateway: every git invocation made by the engine goes through here

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::exec::{CommandOutput, CommandRunner, ProcessRunner};
use crate::fs::{FileSystem, OsFileSystem};
use crate::{Error, Result};

use super::workdir;

/// Handle for running git commands against repositories on disk
#[derive(Clone)]
pub struct Git {
    runner: Arc<dyn CommandRunner>,
    fs: Arc<dyn FileSystem>,
    program: String,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

impl Default for Git {
    fn default() -> Self {
        Self::new(Arc::new(ProcessRunner::new()), Arc::new(OsFileSystem))
    }
}

impl Git {
    /// Create a gateway over the given capabilities
    pub fn new(runner: Arc<dyn CommandRunner>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            runner,
            fs,
            program: "git".to_string(),
        }
    }

    /// Use a custom git executable
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// The filesystem capability this gateway reads metadata through
    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// The directory commands for `repo_path` run in
    pub fn working_directory(&self, repo_path: &Path) -> PathBuf {
        workdir::resolve_working_directory(self.fs.as_ref(), repo_path)
    }

    /// Run git and return the raw captured output, whatever the exit code
    pub async fn output(&self, repo_path: &Path, args: &[&str]) -> Result<CommandOutput> {
        let dir = self.working_directory(repo_path);
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        tracing::debug!(repo = %repo_path.display(), "{} {}", self.program, args.join(" "));
        self.runner.run(&self.program, &args, &dir).await
    }

    /// Run git and return trimmed stdout
    ///
    /// Fails only when the exit code is non-zero and stderr has text; a
    /// non-zero exit with silent stderr is returned as success.
    pub async fn run(&self, repo_path: &Path, args: &[&str]) -> Result<String> {
        let output = self.output(repo_path, args).await?;
        let stderr = output.stderr_text();

        if !output.success() && !stderr.is_empty() {
            return Err(Error::Command {
                program: self.program.clone(),
                args: args.join(" "),
                message: stderr,
                exit_code: output.exit_code,
            });
        }

        Ok(output.stdout_text())
    }
}
