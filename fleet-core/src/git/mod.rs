//! Git operations for fleet
//!
//! Everything here drives the `git` executable through [`Git`] and turns its
//! textual output into typed state.

mod branch;
mod gateway;
mod prune;
mod repo;
mod status;
pub mod workdir;

pub use branch::{
    BranchEngine, BranchStatus, DeleteSafety, ProtectedBranches, UNKNOWN_COMMIT_DATE,
};
pub use gateway::Git;
pub use prune::{select_prunable, PruneCriteria};
pub use repo::{remote_url_from_config, repository_name, Repository};
pub use status::{hierarchical_name, GitRepositoryStatus, NO_LOCAL_BRANCHES};
