//! CLI command implementations

pub mod prune;
pub mod scan;
pub mod status;
pub mod sync;
pub mod tags;

pub use prune::PruneArgs;
pub use scan::ScanArgs;
pub use status::StatusArgs;
pub use sync::SyncArgs;
pub use tags::TagsArgs;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use fleet_core::{
    discover, BranchEngine, Config, Fleet, FleetEntry, Git, OsFileSystem, ProcessRunner,
    ProtectedBranches, Scanner,
};

/// Directories to search for repositories
#[derive(Args, Debug, Clone)]
pub struct RootArgs {
    /// Root directories (defaults to the current directory)
    #[arg(value_name = "ROOT")]
    pub roots: Vec<PathBuf>,
}

impl RootArgs {
    pub fn roots(&self) -> Vec<PathBuf> {
        if self.roots.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.roots.clone()
        }
    }
}

/// Gateway configured from `[git]`
pub fn git(config: &Config) -> Git {
    Git::new(Arc::new(ProcessRunner::new()), Arc::new(OsFileSystem)).with_program(&config.git.program)
}

/// Scanner configured from `[scan]`
pub fn scanner(config: &Config) -> Scanner {
    Scanner::from_config(Arc::new(OsFileSystem), &config.scan)
}

/// Branch engine configured from `[git]` and `[branches]`
pub fn engine(config: &Config) -> BranchEngine {
    BranchEngine::new(git(config), ProtectedBranches::new(&config.branches.protected))
        .with_remote(&config.git.remote)
}

/// Fleet driver honoring `sync.concurrency`
pub fn fleet(config: &Config) -> Fleet {
    Fleet::new(engine(config), config.sync.concurrency)
}

/// Discover repositories, logging how many were found
pub fn discover_entries(config: &Config, roots: &RootArgs) -> Vec<FleetEntry> {
    let roots = roots.roots();
    let entries = discover(&scanner(config), &roots);
    tracing::debug!(repositories = entries.len(), roots = roots.len(), "Discovery finished");
    entries
}

/// Print one progress line
pub fn print_line(line: &str) {
    println!("{}", line);
}
