//! Selection of branches eligible for deletion

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};

use super::branch::{BranchEngine, BranchStatus, ProtectedBranches};

/// Which branches to select; the criteria are combined as a union
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneCriteria {
    /// Branches listed by `git branch --merged`
    pub merged: bool,
    /// Branches whose upstream was deleted
    pub gone: bool,
    /// Branches whose last commit is older than this many days
    pub older_than_days: Option<u32>,
    /// Keep branches a non-forced delete would refuse
    pub include_not_fully_merged: bool,
}

impl PruneCriteria {
    /// Whether any selection criterion is set
    pub fn any(&self) -> bool {
        self.merged || self.gone || self.older_than_days.is_some()
    }
}

/// Pick prunable branches out of `branches`
///
/// Nothing is selected when no criterion is set. Current, detached and
/// protected branches are always excluded, and unknown commit dates never
/// satisfy the age criterion. Results are de-duplicated by case-insensitive
/// name, first occurrence wins.
pub fn select_prunable(
    branches: &[BranchStatus],
    criteria: &PruneCriteria,
    protected: &ProtectedBranches,
    now: DateTime<Utc>,
) -> Vec<BranchStatus> {
    if !criteria.any() {
        return Vec::new();
    }

    let cutoff = criteria
        .older_than_days
        .map(|days| now - Duration::days(i64::from(days)));

    let mut seen = HashSet::new();
    branches
        .iter()
        .filter(|b| !b.is_current && !b.is_detached && !protected.contains(&b.name))
        .filter(|b| {
            let stale = cutoff
                .is_some_and(|cutoff| b.has_known_commit_date() && b.last_commit_date < cutoff);
            (criteria.merged && b.is_merged) || (criteria.gone && b.is_gone) || stale
        })
        .filter(|b| criteria.include_not_fully_merged || b.is_fully_merged)
        .filter(|b| seen.insert(b.name.to_lowercase()))
        .cloned()
        .collect()
}

impl BranchEngine {
    /// Branches of the repository at `path` matching `criteria`
    ///
    /// Issues no commands and returns nothing when no criterion is set.
    pub async fn prunable_branches(&self, path: &Path, criteria: &PruneCriteria) -> Vec<BranchStatus> {
        if !criteria.any() {
            return Vec::new();
        }

        let branches = self.branch_statuses(path).await;
        select_prunable(&branches, criteria, self.protected(), Utc::now())
    }
}
