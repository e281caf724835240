//! Tags command - find repositories carrying matching tags

use clap::Args;
use fleet_core::{Config, ProgressSink, TagMatcher};

use super::RootArgs;

/// Search every repository for tags matching wildcard patterns
#[derive(Args, Debug)]
pub struct TagsArgs {
    /// Wildcard patterns (`*` and `?`), matched case-insensitively
    #[arg(short, long = "pattern", value_name = "PATTERN", required = true)]
    pub patterns: Vec<String>,

    #[command(flatten)]
    pub roots: RootArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl TagsArgs {
    /// Execute the tags command
    pub async fn execute(&self, verbose: bool, config: &Config) -> anyhow::Result<()> {
        // Reject malformed patterns before scanning anything
        TagMatcher::new(&self.patterns)?;

        let repositories: Vec<_> = super::discover_entries(config, &self.roots)
            .into_iter()
            .map(|entry| entry.path)
            .collect();
        let progress: Option<&dyn ProgressSink> = if verbose {
            Some(&super::print_line as &dyn ProgressSink)
        } else {
            None
        };

        let result = super::git(config)
            .search_tags_in_repositories(&repositories, &self.patterns, progress)
            .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }

        for repo in &result.repositories_with_tags {
            let tags = result
                .repository_tags_map
                .get(repo)
                .map(|t| t.join(", "))
                .unwrap_or_default();
            println!("{}: {}", repo.display(), tags);
        }
        for (repo, error) in &result.scan_errors {
            eprintln!("{}: {}", repo.display(), error);
        }

        if result.repositories_with_tags.is_empty() {
            println!("No matching tags found.");
        }

        Ok(())
    }
}
