//! Repository identity and remote URL lookup

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::gateway::Git;
use super::workdir;

/// A repository root as seen at one moment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    /// Last path segment
    pub name: String,
    /// Repository root
    pub path: PathBuf,
    /// URL of the configured remote, when one could be determined
    pub remote_url: Option<String>,
    /// Marker present and a remote URL was found by query or fallback
    pub is_valid: bool,
    /// The live remote query failed, even if the fallback recovered a URL
    pub has_errors: bool,
}

/// Display name of a repository: the last segment of its path
pub fn repository_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extract `url` of `[remote "<remote>"]` from git config file contents
pub fn remote_url_from_config(contents: &str, remote: &str) -> Option<String> {
    let wanted = format!("remote \"{}\"", remote);
    let mut in_section = false;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_section = header
                .trim()
                .split_once(' ')
                .map(|(section, sub)| {
                    section.eq_ignore_ascii_case("remote") && format!("remote {}", sub.trim()) == wanted
                })
                .unwrap_or(false);
            continue;
        }

        if in_section {
            if let Some((key, value)) = line.split_once('=') {
                if key.trim().eq_ignore_ascii_case("url") {
                    let value = value.trim().trim_matches('"');
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }

    None
}

impl Git {
    /// URL of `remote` from the live config query
    ///
    /// `Ok(None)` means git answered but no URL is configured.
    pub async fn remote_url(&self, path: &Path, remote: &str) -> crate::Result<Option<String>> {
        let key = format!("remote.{}.url", remote);
        let url = self.run(path, &["config", "--get", &key]).await?;
        Ok((!url.is_empty()).then_some(url))
    }

    /// Remote URL read straight from the metadata `config` file
    pub fn remote_url_from_metadata(&self, path: &Path, remote: &str) -> Option<String> {
        let dir = workdir::metadata_directory(self.fs(), path)?;
        let contents = self.fs().read_to_string(&dir.join("config")).ok()?;
        remote_url_from_config(&contents, remote)
    }

    /// Build a [`Repository`] for `path`
    ///
    /// Never fails: a failed live query falls back to the config file and
    /// sets `has_errors`.
    pub async fn inspect_repository(&self, path: &Path, remote: &str) -> Repository {
        let name = repository_name(path);

        if !workdir::is_repository(self.fs(), path) {
            return Repository {
                name,
                path: path.to_path_buf(),
                remote_url: None,
                is_valid: false,
                has_errors: true,
            };
        }

        let (remote_url, has_errors) = match self.remote_url(path, remote).await {
            Ok(Some(url)) => (Some(url), false),
            Ok(None) => (self.remote_url_from_metadata(path, remote), true),
            Err(e) => {
                tracing::warn!("Remote lookup failed for {}: {}", path.display(), e);
                (self.remote_url_from_metadata(path, remote), true)
            }
        };

        Repository {
            name,
            path: path.to_path_buf(),
            is_valid: remote_url.is_some(),
            remote_url,
            has_errors,
        }
    }
}
