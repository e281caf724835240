//! Fleet Core - Core library for managing many git repositories at once
//!
//! This crate discovers repositories under one or more roots, reports the
//! state of every local branch, selects branches worth pruning, keeps
//! branches in step with their upstreams and searches tags across the fleet.
//! All git access goes through the `git` executable via [`Git`].

pub mod config;
pub mod error;
pub mod exec;
pub mod fleet;
pub mod fs;
pub mod git;
pub mod progress;
pub mod scanner;
pub mod sync;
pub mod tags;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Error, Result};
pub use exec::{CommandOutput, CommandRunner, ProcessRunner};
pub use fleet::{discover, Completed, Fleet, FleetEntry, PruneReport};
pub use fs::{FileSystem, OsFileSystem};
pub use git::{
    select_prunable, BranchEngine, BranchStatus, DeleteSafety, Git, GitRepositoryStatus,
    ProtectedBranches, PruneCriteria, Repository,
};
pub use progress::{ProgressSink, SilentSink};
pub use scanner::Scanner;
pub use sync::{BranchSyncAction, SyncOptions, SyncReport, Synchronizer};
pub use tags::{TagMatcher, TagSearchResult};
