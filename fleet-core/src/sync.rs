//! Synchronization orchestrator
//!
//! Per repository: stash, reconcile every branch with its upstream, restore
//! the original checkout, pop the stash, push. A failing branch is recorded
//! and the loop moves on; restoration always runs.

use std::path::Path;

use serde::Serialize;

use crate::config::SyncConfig;
use crate::git::{BranchEngine, BranchStatus, GitRepositoryStatus, NO_LOCAL_BRANCHES};
use crate::progress::ProgressSink;
use crate::Result;

/// Message attached to stashes created before synchronizing
pub const STASH_MESSAGE: &str = "fleet: autostash before sync";

const STASH_REF_QUERY: &[&str] = &["rev-parse", "-q", "--verify", "refs/stash"];

/// Switches for one synchronization run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Stash uncommitted changes (untracked files included) first
    pub stash: bool,
    /// Publish branches that have no upstream yet
    pub push_new_branches: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            stash: true,
            push_new_branches: false,
        }
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            stash: config.stash,
            push_new_branches: config.push_new_branches,
        }
    }
}

/// What happened to one branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchSyncAction {
    /// Nothing to reconcile
    Skipped(String),
    /// Pushed with a new upstream
    Published,
    /// Rebased onto its upstream
    Rebased(String),
}

impl std::fmt::Display for BranchSyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchSyncAction::Skipped(reason) => write!(f, "skipped ({})", reason),
            BranchSyncAction::Published => write!(f, "published"),
            BranchSyncAction::Rebased(upstream) => write!(f, "rebased onto {}", upstream),
        }
    }
}

/// Outcome of synchronizing one repository
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub status: GitRepositoryStatus,
    pub success: bool,
}

/// Drives the synchronization protocol through a [`BranchEngine`]
#[derive(Debug, Clone)]
pub struct Synchronizer {
    engine: BranchEngine,
}

impl Synchronizer {
    pub fn new(engine: BranchEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &BranchEngine {
        &self.engine
    }

    async fn git(&self, path: &Path, args: &[&str]) -> Result<String> {
        self.engine.git().run(path, args).await
    }

    /// Reconcile one branch with its upstream
    ///
    /// Tracked branches get set-upstream, checkout and an autostashing
    /// rebase; the first failing step ends the attempt. Untracked branches,
    /// gone ones included, are published only when `push_new_branches` is set.
    pub async fn synchronize_branch(
        &self,
        path: &Path,
        branch: &BranchStatus,
        push_new_branches: bool,
    ) -> Result<BranchSyncAction> {
        let upstream = match (&branch.upstream, branch.is_tracked) {
            (Some(upstream), true) => upstream.clone(),
            _ if !push_new_branches => {
                return Ok(BranchSyncAction::Skipped("no upstream".to_string()));
            }
            _ => {
                self.git(
                    path,
                    &["push", "--set-upstream", self.engine.remote(), &branch.name],
                )
                .await?;
                return Ok(BranchSyncAction::Published);
            }
        };

        let set_upstream = format!("--set-upstream-to={}", upstream);
        self.git(path, &["branch", &set_upstream, &branch.name]).await?;
        self.git(path, &["checkout", &branch.name]).await?;

        if let Err(e) = self.git(path, &["rebase", "--autostash", &upstream]).await {
            if let Err(abort) = self.git(path, &["rebase", "--abort"]).await {
                tracing::warn!("rebase --abort failed in {}: {}", path.display(), abort);
            }
            return Err(e);
        }

        Ok(BranchSyncAction::Rebased(upstream))
    }

    /// Synchronize every local branch of one repository
    ///
    /// Returns `true` only when every step succeeded. Failures are reported
    /// through `sink` and never returned as errors.
    pub async fn synchronize_repository(
        &self,
        status: &GitRepositoryStatus,
        options: SyncOptions,
        sink: &dyn ProgressSink,
    ) -> bool {
        let name = &status.hierarchical_name;

        if status.local_branches.is_empty() {
            sink.report(&format!("{}: nothing to synchronize, {}", name, NO_LOCAL_BRANCHES));
            return false;
        }

        match self.run_protocol(status, options, sink).await {
            Ok(success) => success,
            Err(e) => {
                sink.report(&format!("{}: synchronization failed: {}", name, e));
                false
            }
        }
    }

    async fn run_protocol(
        &self,
        status: &GitRepositoryStatus,
        options: SyncOptions,
        sink: &dyn ProgressSink,
    ) -> Result<bool> {
        let path = status.repo_path.as_path();
        let name = &status.hierarchical_name;
        let mut success = true;

        let stashed = if options.stash && status.has_uncommitted_changes {
            self.stash(path, name, sink).await?
        } else {
            false
        };

        for branch in status.local_branches.iter().filter(|b| !b.is_detached) {
            match self
                .synchronize_branch(path, branch, options.push_new_branches)
                .await
            {
                Ok(action) => sink.report(&format!("{}: {} {}", name, branch.name, action)),
                Err(e) => {
                    success = false;
                    sink.report(&format!("{}: {} failed: {}", name, branch.name, e));
                }
            }
        }

        match status.current_branch() {
            Some(original) => {
                if let Err(e) = self.git(path, &["checkout", &original.name]).await {
                    success = false;
                    sink.report(&format!("{}: could not return to {}: {}", name, original.name, e));
                }
            }
            None => {
                sink.report(&format!("{}: no original branch to return to (detached HEAD)", name));
            }
        }

        if stashed {
            if let Err(e) = self.git(path, &["stash", "pop"]).await {
                success = false;
                sink.report(&format!("{}: stash pop failed, changes remain stashed: {}", name, e));
            }
        }

        if let Err(e) = self.push(path).await {
            success = false;
            sink.report(&format!("{}: push failed: {}", name, e));
        }

        sink.report(&format!(
            "{}: {}",
            name,
            if success { "synchronized" } else { "synchronized with errors" }
        ));
        Ok(success)
    }

    /// Stash uncommitted changes, returning whether a stash entry was created
    ///
    /// `stash push` exits 0 without saving anything when only submodule
    /// content is dirty, so creation is detected by the stash ref moving.
    async fn stash(&self, path: &Path, name: &str, sink: &dyn ProgressSink) -> Result<bool> {
        let before = self.git(path, STASH_REF_QUERY).await?;
        self.git(
            path,
            &["stash", "push", "--include-untracked", "-m", STASH_MESSAGE],
        )
        .await?;
        let after = self.git(path, STASH_REF_QUERY).await?;

        if after.is_empty() || after == before {
            sink.report(&format!("{}: nothing was stashed", name));
            return Ok(false);
        }

        sink.report(&format!("{}: stashed uncommitted changes", name));
        Ok(true)
    }

    async fn push(&self, path: &Path) -> Result<()> {
        let remote = self.engine.remote();
        self.git(path, &["push", remote]).await?;
        self.git(path, &["push", "--tags", remote]).await?;
        Ok(())
    }

    /// Synchronize the repository at `path`, computing its status first
    ///
    /// A repository whose status carries an error is reported and not touched.
    pub async fn synchronize_path(
        &self,
        path: &Path,
        scan_root: Option<&Path>,
        options: SyncOptions,
        sink: &dyn ProgressSink,
    ) -> SyncReport {
        let status = self.engine.repository_status(path, scan_root).await;
        let success = match &status.error_message {
            Some(error) => {
                sink.report(&format!("{}: {}", status.hierarchical_name, error));
                false
            }
            None => self.synchronize_repository(&status, options, sink).await,
        };
        SyncReport { status, success }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::git::{ProtectedBranches, UNKNOWN_COMMIT_DATE};
    use crate::progress::CollectingSink;
    use crate::testing::{git_repo, ScriptedRunner};

    fn synchronizer(runner: &ScriptedRunner) -> Synchronizer {
        Synchronizer::new(BranchEngine::new(runner.git(), ProtectedBranches::default()))
    }

    fn branch(path: &Path, name: &str, tracked: bool, current: bool) -> BranchStatus {
        BranchStatus {
            repository_path: path.to_path_buf(),
            name: name.to_string(),
            upstream: tracked.then(|| format!("origin/{}", name)),
            is_tracked: tracked,
            remote_ahead_count: 0,
            remote_behind_count: 0,
            is_merged: false,
            is_gone: false,
            last_commit_date: UNKNOWN_COMMIT_DATE,
            is_fully_merged: false,
            is_current: current,
            is_detached: false,
        }
    }

    /// A runner whose stash ref moves from `before` to `after` across the stash push
    fn stash_runner(before: &str, after: &str) -> ScriptedRunner {
        ScriptedRunner::new().on_each(
            "rev-parse -q --verify refs/stash",
            vec![CommandOutput::ok(before), CommandOutput::ok(after)],
        )
    }

    fn status(path: &Path, dirty: bool, branches: Vec<BranchStatus>) -> GitRepositoryStatus {
        GitRepositoryStatus::new(path, None, None, dirty, branches, None)
    }

    #[tokio::test]
    async fn test_untracked_branch_without_opt_in_is_noop() {
        let repo = git_repo();
        let runner = ScriptedRunner::new();
        let b = branch(repo.path(), "local", false, false);

        let action = synchronizer(&runner)
            .synchronize_branch(repo.path(), &b, false)
            .await
            .unwrap();
        assert!(matches!(action, BranchSyncAction::Skipped(_)));
        assert!(runner.commands().is_empty());
    }

    #[tokio::test]
    async fn test_untracked_branch_is_published() {
        let repo = git_repo();
        let runner = ScriptedRunner::new();
        let b = branch(repo.path(), "local", false, false);

        let action = synchronizer(&runner)
            .synchronize_branch(repo.path(), &b, true)
            .await
            .unwrap();
        assert_eq!(action, BranchSyncAction::Published);
        assert_eq!(runner.commands(), vec!["push --set-upstream origin local"]);
    }

    #[tokio::test]
    async fn test_gone_branch_follows_untracked_rules() {
        let repo = git_repo();
        let runner = ScriptedRunner::new();
        let mut b = branch(repo.path(), "old", false, false);
        b.upstream = Some("origin/old".to_string());
        b.is_gone = true;

        let sync = synchronizer(&runner);
        let action = sync.synchronize_branch(repo.path(), &b, false).await.unwrap();
        assert!(matches!(action, BranchSyncAction::Skipped(_)));
        assert!(runner.commands().is_empty());

        let action = sync.synchronize_branch(repo.path(), &b, true).await.unwrap();
        assert_eq!(action, BranchSyncAction::Published);
        assert_eq!(runner.commands(), vec!["push --set-upstream origin old"]);
    }

    #[tokio::test]
    async fn test_tracked_branch_steps_in_order() {
        let repo = git_repo();
        let runner = ScriptedRunner::new();
        let b = branch(repo.path(), "feature", true, false);

        synchronizer(&runner)
            .synchronize_branch(repo.path(), &b, false)
            .await
            .unwrap();
        assert_eq!(
            runner.commands(),
            vec![
                "branch --set-upstream-to=origin/feature feature",
                "checkout feature",
                "rebase --autostash origin/feature",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_checkout_stops_branch() {
        let repo = git_repo();
        let runner = ScriptedRunner::new().on(
            "checkout feature",
            CommandOutput::failed(1, "error: Your local changes would be overwritten"),
        );
        let b = branch(repo.path(), "feature", true, false);

        let result = synchronizer(&runner)
            .synchronize_branch(repo.path(), &b, false)
            .await;
        assert!(result.is_err());
        assert!(!runner.ran("rebase --autostash origin/feature"));
    }

    #[tokio::test]
    async fn test_failed_rebase_is_aborted() {
        let repo = git_repo();
        let runner = ScriptedRunner::new().on(
            "rebase --autostash origin/feature",
            CommandOutput::failed(1, "CONFLICT (content): Merge conflict in a.txt"),
        );
        let b = branch(repo.path(), "feature", true, false);

        let result = synchronizer(&runner)
            .synchronize_branch(repo.path(), &b, false)
            .await;
        assert!(result.is_err());
        assert!(runner.ran("rebase --abort"));
    }

    #[tokio::test]
    async fn test_no_local_branches() {
        let repo = git_repo();
        let runner = ScriptedRunner::new();
        let sink = CollectingSink::new();
        let s = status(repo.path(), true, Vec::new());

        let ok = synchronizer(&runner)
            .synchronize_repository(&s, SyncOptions::default(), &sink)
            .await;
        assert!(!ok);
        assert!(runner.commands().is_empty());
        assert!(sink.messages().iter().any(|m| m.contains("no local branches")));
    }

    #[tokio::test]
    async fn test_repository_protocol() {
        let repo = git_repo();
        let runner = stash_runner("", "5e1f00d");
        let sink = CollectingSink::new();
        let s = status(
            repo.path(),
            true,
            vec![
                branch(repo.path(), "main", true, true),
                branch(repo.path(), "local", false, false),
            ],
        );

        let ok = synchronizer(&runner)
            .synchronize_repository(&s, SyncOptions::default(), &sink)
            .await;
        assert!(ok);
        assert_eq!(
            runner.commands(),
            vec![
                "rev-parse -q --verify refs/stash",
                "stash push --include-untracked -m fleet: autostash before sync",
                "rev-parse -q --verify refs/stash",
                "branch --set-upstream-to=origin/main main",
                "checkout main",
                "rebase --autostash origin/main",
                "checkout main",
                "stash pop",
                "push origin",
                "push --tags origin",
            ]
        );
    }

    #[tokio::test]
    async fn test_clean_repository_is_not_stashed() {
        let repo = git_repo();
        let runner = ScriptedRunner::new();
        let s = status(repo.path(), false, vec![branch(repo.path(), "main", true, true)]);

        let ok = synchronizer(&runner)
            .synchronize_repository(&s, SyncOptions::default(), &crate::progress::SilentSink)
            .await;
        assert!(ok);
        assert!(!runner.commands().iter().any(|c| c.starts_with("stash")));
    }

    #[tokio::test]
    async fn test_branch_failure_still_restores() {
        let repo = git_repo();
        let runner = stash_runner("1a1a1a1", "2b2b2b2").on(
            "rebase --autostash origin/broken",
            CommandOutput::failed(1, "CONFLICT"),
        );
        let sink = CollectingSink::new();
        let s = status(
            repo.path(),
            true,
            vec![
                branch(repo.path(), "main", true, true),
                branch(repo.path(), "broken", true, false),
                branch(repo.path(), "after", true, false),
            ],
        );

        let ok = synchronizer(&runner)
            .synchronize_repository(&s, SyncOptions::default(), &sink)
            .await;
        assert!(!ok);

        let commands = runner.commands();
        assert!(commands.contains(&"rebase --autostash origin/after".to_string()));
        let tail: Vec<&str> = commands.iter().rev().take(4).rev().map(String::as_str).collect();
        assert_eq!(tail, vec!["checkout main", "stash pop", "push origin", "push --tags origin"]);
        assert!(sink.messages().iter().any(|m| m.contains("broken failed")));
    }

    #[tokio::test]
    async fn test_stash_failure_is_reported_not_raised() {
        let repo = git_repo();
        let runner = ScriptedRunner::new().on(
            "stash push --include-untracked -m fleet: autostash before sync",
            CommandOutput::failed(1, "error: could not write index"),
        );
        let sink = CollectingSink::new();
        let s = status(repo.path(), true, vec![branch(repo.path(), "main", true, true)]);

        let ok = synchronizer(&runner)
            .synchronize_repository(&s, SyncOptions::default(), &sink)
            .await;
        assert!(!ok);
        assert_eq!(runner.commands().len(), 2);
        assert!(sink.messages().iter().any(|m| m.contains("could not write index")));
    }

    #[tokio::test]
    async fn test_empty_stash_push_leaves_existing_stash_alone() {
        let repo = git_repo();
        // Only submodule content is dirty: the push saves nothing and the
        // user's older stash stays on top
        let runner = stash_runner("9c9c9c9", "9c9c9c9");
        let sink = CollectingSink::new();
        let s = status(repo.path(), true, vec![branch(repo.path(), "main", true, true)]);

        let ok = synchronizer(&runner)
            .synchronize_repository(&s, SyncOptions::default(), &sink)
            .await;
        assert!(ok);
        assert!(runner.ran("stash push --include-untracked -m fleet: autostash before sync"));
        assert!(!runner.ran("stash pop"));
        assert!(sink.messages().iter().any(|m| m.contains("nothing was stashed")));
    }

    #[tokio::test]
    async fn test_empty_stash_push_without_prior_stash() {
        let repo = git_repo();
        let runner = ScriptedRunner::new();
        let s = status(repo.path(), true, vec![branch(repo.path(), "main", true, true)]);

        synchronizer(&runner)
            .synchronize_repository(&s, SyncOptions::default(), &crate::progress::SilentSink)
            .await;
        assert!(!runner.ran("stash pop"));
    }

    #[tokio::test]
    async fn test_synchronize_path_computes_status() {
        let repo = git_repo();
        let runner = ScriptedRunner::new()
            .on("branch --format=%(refname)", CommandOutput::ok("refs/heads/main"))
            .on("rev-parse --abbrev-ref HEAD", CommandOutput::ok("main"))
            .on("for-each-ref --format=%(upstream:short) refs/heads/main", CommandOutput::ok("origin/main"))
            .on("rev-parse --verify --quiet refs/remotes/origin/main", CommandOutput::ok("1a2b"));

        let report = synchronizer(&runner)
            .synchronize_path(repo.path(), None, SyncOptions::default(), &crate::progress::SilentSink)
            .await;
        assert!(report.success);
        assert_eq!(report.status.local_branches.len(), 1);
        assert!(runner.ran("rebase --autostash origin/main"));
        assert!(runner.ran("push --tags origin"));
    }

    #[tokio::test]
    async fn test_synchronize_path_skips_broken_repository() {
        let temp = tempfile::TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        let sink = CollectingSink::new();

        let report = synchronizer(&runner)
            .synchronize_path(temp.path(), None, SyncOptions::default(), &sink)
            .await;
        assert!(!report.success);
        assert!(runner.commands().is_empty());
        assert!(sink.messages()[0].contains("not a git repository"));
    }
}
