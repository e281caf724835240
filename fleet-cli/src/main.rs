//! Fleet CLI - Command line interface for fleet
//!
//! Inspect, prune and synchronize every git repository under a set of roots.

mod commands;

use clap::{Parser, Subcommand};
use fleet_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{PruneArgs, ScanArgs, StatusArgs, SyncArgs, TagsArgs};

/// Fleet: manage many git repositories at once
#[derive(Parser, Debug)]
#[command(name = "fleet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to git executable (overrides config and env)
    #[arg(long, global = true, env = "FLEET_GIT")]
    git: Option<String>,

    /// Repositories processed in parallel (overrides config and env)
    #[arg(short = 'j', long, global = true, env = "FLEET_CONCURRENCY")]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// List repositories under the given roots
    Scan(ScanArgs),

    /// Show branch status of every repository
    #[command(visible_alias = "st")]
    Status(StatusArgs),

    /// Find and delete stale local branches
    Prune(PruneArgs),

    /// Rebase branches onto their upstreams and push
    Sync(SyncArgs),

    /// Search repositories for matching tags
    Tags(TagsArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    // Load configuration with overrides
    let config = Config::load_with_overrides(cli.git.clone(), cli.concurrency)?;

    if cli.verbose {
        tracing::info!(
            git = %config.git.program,
            remote = %config.git.remote,
            concurrency = config.sync.concurrency,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("fleet {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Scan(args)) => {
            args.execute(cli.verbose, &config).await?;
        }
        Some(Commands::Status(args)) => {
            args.execute(cli.verbose, &config).await?;
        }
        Some(Commands::Prune(args)) => {
            args.execute(cli.verbose, &config).await?;
        }
        Some(Commands::Sync(args)) => {
            args.execute(cli.verbose, &config).await?;
        }
        Some(Commands::Tags(args)) => {
            args.execute(cli.verbose, &config).await?;
        }
        Some(Commands::Config) => {
            println!("Fleet Configuration");
            println!("===================");
            println!();
            println!("Git Settings:");
            println!("  program: {}", config.git.program);
            println!("  remote: {}", config.git.remote);
            println!();
            println!("Scan Settings:");
            println!("  include_submodules: {}", config.scan.include_submodules);
            println!("  exclude: {}", config.scan.exclude.join(", "));
            println!();
            println!("Branch Settings:");
            println!("  protected: {}", config.branches.protected.join(", "));
            println!();
            println!("Sync Settings:");
            println!("  stash: {}", config.sync.stash);
            println!("  push_new_branches: {}", config.sync.push_new_branches);
            println!("  concurrency: {}", config.sync.concurrency);
            println!();
            if let Some(path) = Config::default_config_path() {
                println!("Config file: {}", path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using defaults)");
                }
            }
        }
        None => {
            println!("Fleet - manage many git repositories at once");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
