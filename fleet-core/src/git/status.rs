//! Per-repository aggregate status

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::branch::{BranchEngine, BranchStatus};
use super::repo::repository_name;
use super::workdir;
use crate::Result;

/// Error recorded when a repository has no local branches
pub const NO_LOCAL_BRANCHES: &str = "no local branches";

/// Snapshot of one repository and all of its local branches
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitRepositoryStatus {
    pub name: String,
    /// Path relative to the scan root, `/`-separated
    pub hierarchical_name: String,
    pub repo_path: PathBuf,
    pub remote_url: Option<String>,
    pub has_uncommitted_changes: bool,
    pub local_branches: Vec<BranchStatus>,
    pub error_message: Option<String>,
}

impl GitRepositoryStatus {
    /// Build a status, recording an error when `local_branches` is empty
    pub fn new(
        repo_path: &Path,
        scan_root: Option<&Path>,
        remote_url: Option<String>,
        has_uncommitted_changes: bool,
        local_branches: Vec<BranchStatus>,
        error_message: Option<String>,
    ) -> Self {
        let error_message = match error_message {
            Some(message) => Some(message),
            None if local_branches.is_empty() => Some(NO_LOCAL_BRANCHES.to_string()),
            None => None,
        };

        Self {
            name: repository_name(repo_path),
            hierarchical_name: hierarchical_name(repo_path, scan_root),
            repo_path: repo_path.to_path_buf(),
            remote_url,
            has_uncommitted_changes,
            local_branches,
            error_message,
        }
    }

    /// A status for a repository that could not be inspected at all
    pub fn failed(repo_path: &Path, scan_root: Option<&Path>, message: impl Into<String>) -> Self {
        Self::new(repo_path, scan_root, None, false, Vec::new(), Some(message.into()))
    }

    pub fn has_errors(&self) -> bool {
        self.error_message.is_some()
    }

    /// The checked-out branch, if HEAD is on one
    pub fn current_branch(&self) -> Option<&BranchStatus> {
        self.local_branches.iter().find(|b| b.is_current && !b.is_detached)
    }

    pub fn tracked_branches_count(&self) -> usize {
        self.local_branches.iter().filter(|b| b.is_tracked).count()
    }

    pub fn untracked_branches_count(&self) -> usize {
        self.local_branches.iter().filter(|b| !b.is_tracked).count()
    }
}

/// Path of `repo_path` below `scan_root`, falling back to the repository name
pub fn hierarchical_name(repo_path: &Path, scan_root: Option<&Path>) -> String {
    let relative = scan_root
        .and_then(|root| repo_path.strip_prefix(root).ok())
        .filter(|rel| !rel.as_os_str().is_empty());

    match relative {
        Some(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/"),
        None => repository_name(repo_path),
    }
}

impl BranchEngine {
    /// Whether the working tree has staged, unstaged or untracked changes
    pub async fn has_uncommitted_changes(&self, path: &Path) -> Result<bool> {
        let porcelain = self.git().run(path, &["status", "--porcelain"]).await?;
        Ok(!porcelain.is_empty())
    }

    /// Refresh remote-tracking refs and drop deleted ones
    pub async fn fetch(&self, path: &Path) -> Result<()> {
        self.git().run(path, &["fetch", "--all", "--prune"]).await?;
        Ok(())
    }

    /// Full status of the repository at `path`
    ///
    /// Never fails; problems are recorded in `error_message`.
    pub async fn repository_status(&self, path: &Path, scan_root: Option<&Path>) -> GitRepositoryStatus {
        if !workdir::is_repository(self.git().fs(), path) {
            return GitRepositoryStatus::failed(path, scan_root, "not a git repository");
        }

        let repository = self.git().inspect_repository(path, self.remote()).await;

        let has_uncommitted_changes = match self.has_uncommitted_changes(path).await {
            Ok(dirty) => dirty,
            Err(e) => {
                tracing::warn!("Status of {} failed: {}", path.display(), e);
                false
            }
        };

        let (branches, error) = match self.try_branch_statuses(path, false).await {
            Ok(branches) => (branches, None),
            Err(e) => (Vec::new(), Some(e.to_string())),
        };

        GitRepositoryStatus::new(
            path,
            scan_root,
            repository.remote_url,
            has_uncommitted_changes,
            branches,
            error,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::git::branch::ProtectedBranches;
    use crate::testing::{git_repo, ScriptedRunner};

    #[test]
    fn test_hierarchical_name() {
        let root = Path::new("/repos");
        assert_eq!(hierarchical_name(Path::new("/repos/team/api"), Some(root)), "team/api");
        assert_eq!(hierarchical_name(Path::new("/repos"), Some(root)), "repos");
        assert_eq!(hierarchical_name(Path::new("/elsewhere/x"), Some(root)), "x");
        assert_eq!(hierarchical_name(Path::new("/elsewhere/x"), None), "x");
    }

    #[test]
    fn test_empty_branches_is_an_error() {
        let status = GitRepositoryStatus::new(Path::new("/repos/r1"), None, None, false, Vec::new(), None);
        assert!(status.has_errors());
        assert_eq!(status.error_message.as_deref(), Some(NO_LOCAL_BRANCHES));
        assert!(status.current_branch().is_none());
    }

    #[tokio::test]
    async fn test_repository_status() {
        let repo = git_repo();
        let runner = ScriptedRunner::new()
            .on("config --get remote.origin.url", CommandOutput::ok("https://example.com/r.git"))
            .on("status --porcelain", CommandOutput::ok(" M src/lib.rs\n?? notes.txt"))
            .on("branch --format=%(refname)", CommandOutput::ok("refs/heads/main\nrefs/heads/wip"))
            .on("rev-parse --abbrev-ref HEAD", CommandOutput::ok("main"))
            .on("for-each-ref --format=%(upstream:short) refs/heads/main", CommandOutput::ok("origin/main"))
            .on("rev-parse --verify --quiet refs/remotes/origin/main", CommandOutput::ok("1a2b"));
        let engine = BranchEngine::new(runner.git(), ProtectedBranches::default());

        let status = engine.repository_status(repo.path(), repo.path().parent()).await;
        assert!(!status.has_errors());
        assert!(status.has_uncommitted_changes);
        assert_eq!(status.remote_url.as_deref(), Some("https://example.com/r.git"));
        assert_eq!(status.local_branches.len(), 2);
        assert_eq!(status.current_branch().map(|b| b.name.as_str()), Some("main"));
        assert_eq!(status.tracked_branches_count(), 1);
        assert_eq!(status.untracked_branches_count(), 1);
        assert_eq!(status.hierarchical_name, status.name);
    }

    #[tokio::test]
    async fn test_repository_status_enumeration_error() {
        let repo = git_repo();
        let runner = ScriptedRunner::new().on(
            "branch --format=%(refname)",
            CommandOutput::failed(128, "fatal: your current branch appears to be broken"),
        );
        let engine = BranchEngine::new(runner.git(), ProtectedBranches::default());

        let status = engine.repository_status(repo.path(), None).await;
        assert!(status.has_errors());
        assert!(status.error_message.unwrap().contains("appears to be broken"));
    }

    #[tokio::test]
    async fn test_repository_status_not_a_repository() {
        let temp = tempfile::TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        let engine = BranchEngine::new(runner.git(), ProtectedBranches::default());

        let status = engine.repository_status(temp.path(), None).await;
        assert!(status.has_errors());
        assert!(runner.commands().is_empty());
    }
}
