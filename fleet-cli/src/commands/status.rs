//! Status command - show branch state of every repository

use chrono::{DateTime, Utc};
use clap::Args;
use fleet_core::{BranchStatus, Config, GitRepositoryStatus};

use super::RootArgs;

/// Show local branches of every repository with their upstream state
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub roots: RootArgs,

    /// Fetch from all remotes before inspecting
    #[arg(long)]
    pub fetch: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Only show repositories that need attention
    #[arg(short, long)]
    pub dirty: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, verbose: bool, config: &Config) -> anyhow::Result<()> {
        let entries = super::discover_entries(config, &self.roots);
        let fleet = super::fleet(config);

        let statuses = if verbose {
            fleet.statuses(&entries, self.fetch, &super::print_line).await
        } else {
            fleet.statuses(&entries, self.fetch, &fleet_core::SilentSink).await
        };

        let statuses: Vec<_> = statuses
            .into_iter()
            .filter(|s| !self.dirty || needs_attention(s))
            .collect();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
            return Ok(());
        }

        if statuses.is_empty() {
            println!("No repositories found.");
            return Ok(());
        }

        let now = Utc::now();
        for status in &statuses {
            print_repository(status, now);
        }

        let failed = statuses.iter().filter(|s| s.has_errors()).count();
        println!(
            "{} repositories, {} with errors",
            statuses.len(),
            failed
        );

        Ok(())
    }
}

fn needs_attention(status: &GitRepositoryStatus) -> bool {
    status.has_errors()
        || status.has_uncommitted_changes
        || status.local_branches.iter().any(|b| {
            b.is_gone || !b.is_tracked || b.remote_ahead_count > 0 || b.remote_behind_count > 0
        })
}

fn print_repository(status: &GitRepositoryStatus, now: DateTime<Utc>) {
    let dirty = if status.has_uncommitted_changes { " *" } else { "" };
    println!("{}{}", status.hierarchical_name, dirty);

    if let Some(url) = &status.remote_url {
        println!("  remote: {}", url);
    }

    if let Some(error) = &status.error_message {
        println!("  error: {}", error);
    }

    for branch in &status.local_branches {
        println!("  {}", describe_branch(branch, now));
    }
    println!();
}

fn describe_branch(branch: &BranchStatus, now: DateTime<Utc>) -> String {
    let marker = if branch.is_current { "*" } else { " " };

    let tracking = match &branch.upstream {
        Some(upstream) if branch.is_gone => format!("[{}: gone]", upstream),
        Some(upstream) if branch.is_tracked => {
            let mut counts = Vec::new();
            if branch.remote_behind_count > 0 {
                counts.push(format!("ahead {}", branch.remote_behind_count));
            }
            if branch.remote_ahead_count > 0 {
                counts.push(format!("behind {}", branch.remote_ahead_count));
            }
            if counts.is_empty() {
                format!("[{}]", upstream)
            } else {
                format!("[{}: {}]", upstream, counts.join(", "))
            }
        }
        Some(upstream) => format!("[{}: missing]", upstream),
        None => "[no upstream]".to_string(),
    };

    let age = if branch.has_known_commit_date() {
        format_duration((now - branch.last_commit_date).num_seconds())
    } else {
        "unknown".to_string()
    };

    let merged = if branch.is_merged { " merged" } else { "" };

    format!("{} {} {} ({} ago){}", marker, branch.name, tracking, age, merged)
}

/// Format duration in human-readable form
fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m", seconds / 60)
    } else if seconds < 86400 {
        let hours = seconds / 3600;
        let mins = (seconds % 3600) / 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{}h", hours)
        }
    } else {
        let days = seconds / 86400;
        let hours = (seconds % 86400) / 3600;
        if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::path::PathBuf;

    fn branch(name: &str) -> BranchStatus {
        BranchStatus {
            repository_path: PathBuf::from("/repos/r1"),
            name: name.to_string(),
            upstream: Some(format!("origin/{}", name)),
            is_tracked: true,
            remote_ahead_count: 0,
            remote_behind_count: 0,
            is_merged: false,
            is_gone: false,
            last_commit_date: Utc::now(),
            is_fully_merged: true,
            is_current: false,
            is_detached: false,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(-5), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(3600), "1h");
        assert_eq!(format_duration(90_000), "1d 1h");
    }

    #[test]
    fn test_describe_branch() {
        let now = Utc::now();
        let mut b = branch("feature");
        b.last_commit_date = now - Duration::days(2);
        b.remote_behind_count = 2;
        b.remote_ahead_count = 1;
        b.is_current = true;
        assert_eq!(
            describe_branch(&b, now),
            "* feature [origin/feature: ahead 2, behind 1] (2d ago)"
        );

        let mut gone = branch("old");
        gone.is_tracked = false;
        gone.is_gone = true;
        gone.last_commit_date = fleet_core::git::UNKNOWN_COMMIT_DATE;
        assert_eq!(describe_branch(&gone, now), "  old [origin/old: gone] (unknown ago)");
    }

    #[test]
    fn test_needs_attention() {
        let clean = GitRepositoryStatus::new(
            &PathBuf::from("/repos/r1"),
            None,
            None,
            false,
            vec![branch("main")],
            None,
        );
        assert!(!needs_attention(&clean));

        let mut untracked = branch("local");
        untracked.upstream = None;
        untracked.is_tracked = false;
        let mut noisy = clean.clone();
        noisy.local_branches.push(untracked);
        assert!(needs_attention(&noisy));
    }
}
