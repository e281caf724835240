//! Sync command - reconcile every branch with its upstream

use clap::Args;
use fleet_core::{Config, SyncOptions};

use super::RootArgs;

/// Rebase tracked branches onto their upstreams and push
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub roots: RootArgs,

    /// Do not stash uncommitted changes first
    #[arg(long)]
    pub no_stash: bool,

    /// Publish branches that have no upstream yet
    #[arg(long)]
    pub push_new: bool,
}

impl SyncArgs {
    fn options(&self, config: &Config) -> SyncOptions {
        let mut options = SyncOptions::from(&config.sync);
        if self.no_stash {
            options.stash = false;
        }
        if self.push_new {
            options.push_new_branches = true;
        }
        options
    }

    /// Execute the sync command
    pub async fn execute(&self, _verbose: bool, config: &Config) -> anyhow::Result<()> {
        let entries = super::discover_entries(config, &self.roots);
        if entries.is_empty() {
            println!("No repositories found.");
            return Ok(());
        }

        let options = self.options(config);
        tracing::debug!(?options, "Synchronizing {} repositories", entries.len());

        let reports = super::fleet(config)
            .synchronize(&entries, options, &super::print_line)
            .await;

        let failed: Vec<_> = reports
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.status.hierarchical_name.as_str())
            .collect();

        println!();
        println!(
            "{} of {} repositories synchronized",
            reports.len() - failed.len(),
            reports.len()
        );

        if !failed.is_empty() {
            anyhow::bail!("Synchronization failed for: {}", failed.join(", "));
        }

        Ok(())
    }
}
