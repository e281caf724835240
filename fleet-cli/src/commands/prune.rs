//! Prune command - find and delete stale local branches

use clap::Args;
use fleet_core::{Config, PruneCriteria, SilentSink};

use super::RootArgs;

/// Select local branches that are merged, gone or old, and optionally delete them
#[derive(Args, Debug)]
pub struct PruneArgs {
    #[command(flatten)]
    pub roots: RootArgs,

    /// Select branches merged into the current branch
    #[arg(long)]
    pub merged: bool,

    /// Select branches whose upstream was deleted
    #[arg(long)]
    pub gone: bool,

    /// Select branches whose last commit is older than N days
    #[arg(long, value_name = "DAYS")]
    pub older_than: Option<u32>,

    /// Also select branches that would need a forced delete
    #[arg(long)]
    pub include_not_fully_merged: bool,

    /// Delete the selected branches (default is a dry run)
    #[arg(long)]
    pub apply: bool,
}

impl PruneArgs {
    fn criteria(&self) -> PruneCriteria {
        PruneCriteria {
            merged: self.merged,
            gone: self.gone,
            older_than_days: self.older_than,
            include_not_fully_merged: self.include_not_fully_merged,
        }
    }

    /// Execute the prune command
    pub async fn execute(&self, verbose: bool, config: &Config) -> anyhow::Result<()> {
        let criteria = self.criteria();
        if !criteria.any() {
            anyhow::bail!("No selection criteria given; use --merged, --gone or --older-than");
        }

        let entries = super::discover_entries(config, &self.roots);
        let fleet = super::fleet(config);

        let reports = if verbose || self.apply {
            fleet.prune(&entries, criteria, self.apply, &super::print_line).await
        } else {
            fleet.prune(&entries, criteria, self.apply, &SilentSink).await
        };

        let mut selected = 0;
        let mut failed = 0;
        for report in reports.iter().filter(|r| !r.candidates.is_empty()) {
            println!("{}", report.hierarchical_name);
            for branch in &report.candidates {
                let note = if branch.is_fully_merged { "" } else { " (not fully merged)" };
                println!("  {}{}", branch.name, note);
            }
            selected += report.candidates.len();
            failed += report.failed.len();
        }

        if selected == 0 {
            println!("No prunable branches found.");
        } else if self.apply {
            println!();
            println!("Deleted {} of {} branches", selected - failed, selected);
        } else {
            println!();
            println!("{} prunable branches (dry run, pass --apply to delete)", selected);
        }

        if failed > 0 {
            anyhow::bail!("{} branches could not be deleted", failed);
        }

        Ok(())
    }
}
