//! Test doubles shared by the unit tests in this crate

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::exec::{CommandOutput, CommandRunner};
use crate::fs::OsFileSystem;
use crate::git::Git;
use crate::Result;

/// One recorded call to [`ScriptedRunner`]
#[derive(Debug, Clone)]
pub struct Invocation {
    pub args: String,
    pub workdir: PathBuf,
}

#[derive(Default)]
struct Script {
    responses: HashMap<String, VecDeque<CommandOutput>>,
    calls: Vec<Invocation>,
}

/// A [`CommandRunner`] that answers from a table keyed by the space-joined
/// argument list. Unscripted commands succeed with empty output.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    script: Arc<Mutex<Script>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `args` with `output`
    pub fn on(self, args: &str, output: CommandOutput) -> Self {
        self.set(args, output);
        self
    }

    /// Answer successive calls of `args` with `outputs` in turn; the last
    /// answer repeats once the others are used up
    pub fn on_each(self, args: &str, outputs: Vec<CommandOutput>) -> Self {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(args.to_string(), outputs.into());
        self
    }

    /// Answer `args` with `output`, replacing any earlier answer
    pub fn set(&self, args: &str, output: CommandOutput) {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(args.to_string(), VecDeque::from([output]));
    }

    /// A gateway that runs through this script on the real filesystem
    pub fn git(&self) -> Git {
        Git::new(Arc::new(self.clone()), Arc::new(OsFileSystem))
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Argument strings of every call, in order
    pub fn commands(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.args).collect()
    }

    /// Whether a call with exactly these arguments was made
    pub fn ran(&self, args: &str) -> bool {
        self.commands().iter().any(|c| c == args)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, _program: &str, args: &[String], workdir: &Path) -> Result<CommandOutput> {
        let key = args.join(" ");
        let mut script = self.script.lock().unwrap();
        script.calls.push(Invocation {
            args: key.clone(),
            workdir: workdir.to_path_buf(),
        });
        let output = match script.responses.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(output.unwrap_or_else(|| CommandOutput::ok("")))
    }
}

/// A temporary directory with a `.git` directory inside
pub fn git_repo() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join(".git")).unwrap();
    temp
}
