//! Configuration management for fleet
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (FLEET_*)
//! 3. Config file (~/.config/fleet/config.toml)
//! 4. Default values

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Branch names that are never pruned or classified fully merged
pub const DEFAULT_PROTECTED_BRANCHES: [&str; 3] = ["master", "main", "develop"];

/// Git invocation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitConfig {
    /// Path to the git executable
    pub program: String,

    /// Remote used for ahead/behind comparison, pushes and config fallback
    pub remote: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            remote: "origin".to_string(),
        }
    }
}

/// Repository discovery settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Follow `.gitmodules` declarations and report submodules separately
    pub include_submodules: bool,

    /// Glob patterns for directories that are never descended into
    pub exclude: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_submodules: true,
            exclude: Vec::new(),
        }
    }
}

/// Branch classification settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BranchConfig {
    /// Protected branch names (compared case-insensitively)
    pub protected: Vec<String>,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            protected: DEFAULT_PROTECTED_BRANCHES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Synchronization settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Stash uncommitted changes before touching branches
    pub stash: bool,

    /// Push branches that have no upstream yet
    pub push_new_branches: bool,

    /// Number of repositories processed concurrently
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stash: true,
            push_new_branches: false,
            concurrency: 4,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub git: GitConfig,
    pub scan: ScanConfig,
    pub branches: BranchConfig,
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/fleet/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fleet").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - FLEET_GIT: Path to git executable
    /// - FLEET_REMOTE: Remote name
    /// - FLEET_CONCURRENCY: Repositories processed in parallel
    /// - FLEET_PROTECTED: Comma separated protected branch names
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(program) = var("FLEET_GIT") {
            self.git.program = program;
        }

        if let Some(remote) = var("FLEET_REMOTE") {
            self.git.remote = remote;
        }

        if let Some(concurrency) = var("FLEET_CONCURRENCY") {
            self.sync.concurrency = concurrency.trim().parse().map_err(|_| {
                Error::Config(format!("FLEET_CONCURRENCY is not a number: {}", concurrency))
            })?;
        }

        if let Some(protected) = var("FLEET_PROTECTED") {
            self.branches.protected = protected
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, git: Option<String>, concurrency: Option<usize>) -> Self {
        if let Some(program) = git {
            self.git.program = program;
        }

        if let Some(n) = concurrency {
            self.sync.concurrency = n;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(git: Option<String>, concurrency: Option<usize>) -> Result<Self> {
        let config = Self::load()?
            .with_env_overrides()?
            .with_cli_overrides(git, concurrency);
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.sync.concurrency == 0 {
            return Err(Error::Config("sync.concurrency must be at least 1".to_string()));
        }
        if self.git.program.trim().is_empty() {
            return Err(Error::Config("git.program must not be empty".to_string()));
        }
        Ok(())
    }
}
