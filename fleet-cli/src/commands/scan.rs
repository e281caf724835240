//! Scan command - list discovered repositories

use clap::Args;
use fleet_core::Config;

use super::RootArgs;

/// List every repository under the given roots
#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub roots: RootArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ScanArgs {
    /// Execute the scan command
    pub async fn execute(&self, _verbose: bool, config: &Config) -> anyhow::Result<()> {
        let entries = super::discover_entries(config, &self.roots);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }

        if entries.is_empty() {
            println!("No repositories found.");
            return Ok(());
        }

        for entry in &entries {
            println!("{}", entry.path.display());
        }
        println!();
        println!("{} repositories", entries.len());

        Ok(())
    }
}
