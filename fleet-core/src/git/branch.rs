//! Branch state engine: local branches with tracking, merge and age metadata

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::gateway::Git;
use crate::config::DEFAULT_PROTECTED_BRANCHES;
use crate::{Error, Result};

/// Sentinel for a last-commit date that could not be determined
pub const UNKNOWN_COMMIT_DATE: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

/// Snapshot of one local branch relative to its upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchStatus {
    pub repository_path: PathBuf,
    pub name: String,
    /// Configured upstream (e.g. `origin/feature`), present even when gone
    pub upstream: Option<String>,
    /// Upstream configured and its remote-tracking ref exists
    pub is_tracked: bool,
    /// Commits on the upstream missing locally
    pub remote_ahead_count: u32,
    /// Local commits missing on the upstream
    pub remote_behind_count: u32,
    /// Listed by `git branch --merged`
    pub is_merged: bool,
    /// Upstream configured but deleted on the remote
    pub is_gone: bool,
    pub last_commit_date: DateTime<Utc>,
    /// A non-forced delete would currently succeed
    pub is_fully_merged: bool,
    pub is_current: bool,
    pub is_detached: bool,
}

impl BranchStatus {
    /// Whether `last_commit_date` holds a real value
    pub fn has_known_commit_date(&self) -> bool {
        self.last_commit_date != UNKNOWN_COMMIT_DATE
    }
}

/// Case-insensitive set of branch names exempt from pruning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedBranches(HashSet<String>);

impl ProtectedBranches {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, branch: &str) -> bool {
        self.0.contains(&branch.trim().to_lowercase())
    }
}

impl Default for ProtectedBranches {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED_BRANCHES)
    }
}

/// Outcome of probing whether a branch can be deleted without `--force`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteSafety {
    Safe,
    Unsafe(String),
}

impl DeleteSafety {
    pub fn is_safe(&self) -> bool {
        matches!(self, DeleteSafety::Safe)
    }
}

/// Whether a `git branch` entry is a detached-HEAD pseudo-branch
pub fn is_detached_entry(name: &str) -> bool {
    name.starts_with('(')
}

/// Names of branches whose upstream is marked gone in `git branch -vv` output
pub fn parse_gone_branches(verbose_listing: &str) -> HashSet<String> {
    verbose_listing
        .lines()
        .filter(|line| line.contains(": gone]"))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let first = fields.next()?;
            let name = if first == "*" || first == "+" {
                fields.next()?
            } else {
                first
            };
            Some(name.to_string())
        })
        .collect()
}

/// Branch names from `git branch --merged` output
pub fn parse_branch_listing(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix("* ")
                .or_else(|| line.strip_prefix("+ "))
                .unwrap_or(line)
                .trim()
        })
        .filter(|name| !name.is_empty() && !is_detached_entry(name))
        .map(str::to_string)
        .collect()
}

/// Parse `rev-list --left-right --count` output into (left, right)
pub fn parse_left_right(counts: &str) -> Option<(u32, u32)> {
    let mut parts = counts.split_whitespace();
    let left = parts.next()?.parse().ok()?;
    let right = parts.next()?.parse().ok()?;
    Some((left, right))
}

/// Computes [`BranchStatus`] values through the command gateway
#[derive(Debug, Clone)]
pub struct BranchEngine {
    git: Git,
    protected: ProtectedBranches,
    remote: String,
}

impl BranchEngine {
    pub fn new(git: Git, protected: ProtectedBranches) -> Self {
        Self {
            git,
            protected,
            remote: "origin".to_string(),
        }
    }

    /// Use a remote other than `origin` for pushes and URL lookups
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn git(&self) -> &Git {
        &self.git
    }

    pub fn protected(&self) -> &ProtectedBranches {
        &self.protected
    }

    /// Local branch names, optionally including detached-HEAD entries
    pub async fn local_branch_names(&self, path: &Path, include_detached: bool) -> Result<Vec<String>> {
        let listing = self
            .git
            .run(path, &["branch", "--format=%(refname)"])
            .await?;

        // Full refnames: `:short` turns into `heads/<b>` when a tag shares the name
        Ok(listing
            .lines()
            .map(str::trim)
            .map(|name| name.strip_prefix("refs/heads/").unwrap_or(name))
            .filter(|name| !name.is_empty())
            .filter(|name| include_detached || !is_detached_entry(name))
            .map(str::to_string)
            .collect())
    }

    /// Current branch name, `None` when HEAD is detached or unreadable
    pub async fn current_branch(&self, path: &Path) -> Option<String> {
        match self.git.run(path, &["rev-parse", "--abbrev-ref", "HEAD"]).await {
            Ok(head) if !head.is_empty() && head != "HEAD" => Some(head),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Could not read HEAD of {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Status of every local branch, detached HEAD excluded
    ///
    /// Returns an empty list when the branches cannot be enumerated.
    pub async fn branch_statuses(&self, path: &Path) -> Vec<BranchStatus> {
        match self.try_branch_statuses(path, false).await {
            Ok(statuses) => statuses,
            Err(e) => {
                tracing::warn!("Could not list branches of {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    /// Status of every local branch
    ///
    /// Only enumeration can fail; per-branch probes degrade their own field.
    pub async fn try_branch_statuses(
        &self,
        path: &Path,
        include_detached: bool,
    ) -> Result<Vec<BranchStatus>> {
        let names = self.local_branch_names(path, include_detached).await?;
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let current = self.current_branch(path).await;
        let gone = self.gone_branches(path).await;
        let merged = self.merged_branches(path).await;

        let mut statuses = Vec::with_capacity(names.len());
        for name in names {
            if is_detached_entry(&name) {
                statuses.push(self.detached_status(path, name).await);
                continue;
            }

            let upstream = self.upstream(path, &name).await;
            let is_tracked = match &upstream {
                Some(upstream) => self.remote_ref_exists(path, upstream).await,
                None => false,
            };
            let is_current = current
                .as_deref()
                .is_some_and(|c| c.trim().eq_ignore_ascii_case(name.trim()));

            let safety = if is_current {
                DeleteSafety::Unsafe("branch is checked out".to_string())
            } else {
                let target = upstream.as_deref().filter(|_| is_tracked);
                self.delete_safety(path, &name, target).await
            };

            let (remote_ahead_count, remote_behind_count) = match (&upstream, is_tracked) {
                (Some(upstream), true) => self.ahead_behind(path, &name, upstream).await,
                _ => (0, 0),
            };

            let last_commit_date = self
                .last_commit_date(path, &format!("refs/heads/{}", name))
                .await;

            statuses.push(BranchStatus {
                repository_path: path.to_path_buf(),
                is_merged: merged.contains(&name),
                is_gone: gone.contains(&name),
                is_fully_merged: safety.is_safe(),
                upstream,
                is_tracked,
                remote_ahead_count,
                remote_behind_count,
                last_commit_date,
                is_current,
                is_detached: false,
                name,
            });
        }

        Ok(statuses)
    }

    async fn detached_status(&self, path: &Path, name: String) -> BranchStatus {
        BranchStatus {
            repository_path: path.to_path_buf(),
            name,
            upstream: None,
            is_tracked: false,
            remote_ahead_count: 0,
            remote_behind_count: 0,
            is_merged: false,
            is_gone: false,
            last_commit_date: self.last_commit_date(path, "HEAD").await,
            is_fully_merged: false,
            is_current: true,
            is_detached: true,
        }
    }

    /// Configured upstream of `branch`, reported even if the remote ref is gone
    async fn upstream(&self, path: &Path, branch: &str) -> Option<String> {
        let reference = format!("refs/heads/{}", branch);
        match self
            .git
            .run(path, &["for-each-ref", "--format=%(upstream:short)", &reference])
            .await
        {
            Ok(upstream) if !upstream.is_empty() => Some(upstream),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Upstream lookup for {} failed: {}", branch, e);
                None
            }
        }
    }

    async fn remote_ref_exists(&self, path: &Path, upstream: &str) -> bool {
        let reference = format!("refs/remotes/{}", upstream);
        match self
            .git
            .run(path, &["rev-parse", "--verify", "--quiet", &reference])
            .await
        {
            Ok(sha) => !sha.is_empty(),
            Err(_) => false,
        }
    }

    async fn gone_branches(&self, path: &Path) -> HashSet<String> {
        match self.git.run(path, &["branch", "-vv"]).await {
            Ok(listing) => parse_gone_branches(&listing),
            Err(e) => {
                tracing::warn!("Verbose branch listing failed for {}: {}", path.display(), e);
                HashSet::new()
            }
        }
    }

    async fn merged_branches(&self, path: &Path) -> HashSet<String> {
        match self.git.run(path, &["branch", "--merged"]).await {
            Ok(listing) => parse_branch_listing(&listing),
            Err(e) => {
                tracing::warn!("Merged branch listing failed for {}: {}", path.display(), e);
                HashSet::new()
            }
        }
    }

    /// Whether `branch` could be deleted without force
    ///
    /// Mirrors the check `git branch -d` makes: the branch tip must be
    /// reachable from its upstream when it has one, otherwise from HEAD.
    /// Protected branches are never safe.
    pub async fn delete_safety(&self, path: &Path, branch: &str, upstream: Option<&str>) -> DeleteSafety {
        if self.protected.contains(branch) {
            return DeleteSafety::Unsafe(format!("'{}' is a protected branch", branch));
        }

        let tip = format!("refs/heads/{}", branch);
        let target = upstream.unwrap_or("HEAD");
        match self
            .git
            .output(path, &["merge-base", "--is-ancestor", &tip, target])
            .await
        {
            Ok(output) if output.success() => DeleteSafety::Safe,
            Ok(output) if output.exit_code == Some(1) => {
                DeleteSafety::Unsafe(format!("'{}' is not fully merged into {}", branch, target))
            }
            Ok(output) => DeleteSafety::Unsafe(output.stderr_text()),
            Err(e) => DeleteSafety::Unsafe(e.to_string()),
        }
    }

    /// (remote ahead, remote behind) of `branch` against `upstream`
    async fn ahead_behind(&self, path: &Path, branch: &str, upstream: &str) -> (u32, u32) {
        let range = format!("{}...refs/heads/{}", upstream, branch);
        match self
            .git
            .run(path, &["rev-list", "--left-right", "--count", &range])
            .await
        {
            Ok(counts) => parse_left_right(&counts).unwrap_or_else(|| {
                tracing::warn!("Unexpected rev-list output for {}: {:?}", branch, counts);
                (0, 0)
            }),
            Err(e) => {
                tracing::warn!("Ahead/behind for {} failed: {}", branch, e);
                (0, 0)
            }
        }
    }

    /// Committer date of the tip of `reference`, or [`UNKNOWN_COMMIT_DATE`]
    async fn last_commit_date(&self, path: &Path, reference: &str) -> DateTime<Utc> {
        let date = match self
            .git
            .run(path, &["log", "-1", "--format=%cI", reference])
            .await
        {
            Ok(date) => date,
            Err(e) => {
                tracing::warn!("Commit date of {} failed: {}", reference, e);
                return UNKNOWN_COMMIT_DATE;
            }
        };

        DateTime::parse_from_rfc3339(date.trim())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(UNKNOWN_COMMIT_DATE)
    }

    /// Delete a local branch
    ///
    /// Unlike the inspection queries this fails loudly: an empty path is
    /// rejected and any non-zero exit is returned as an error.
    pub async fn delete_branch(&self, path: &Path, branch: &str, force: bool) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidPath(path.to_path_buf()));
        }

        let flag = if force { "-D" } else { "-d" };
        let output = self.git.output(path, &["branch", flag, branch]).await?;
        if !output.success() {
            let stderr = output.stderr_text();
            return Err(Error::BranchDelete {
                branch: branch.to_string(),
                message: if stderr.is_empty() { output.stdout_text() } else { stderr },
            });
        }

        tracing::info!("Deleted branch {} in {}", branch, path.display());
        Ok(())
    }
}
