//! Wildcard tag search across one repository or a whole fleet

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::git::Git;
use crate::progress::ProgressSink;
use crate::scanner::Scanner;
use crate::{Error, Result};

/// Compile a wildcard pattern into an anchored, case-insensitive regex
///
/// `*` matches any run of characters and `?` exactly one; everything else
/// is literal.
pub fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");

    RegexBuilder::new(&format!("^{}$", escaped))
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// A set of wildcard patterns; a tag matches if any pattern matches
#[derive(Debug, Clone)]
pub struct TagMatcher {
    patterns: Vec<Regex>,
}

impl TagMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| wildcard_regex(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// An empty matcher matches nothing
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_match(&self, tag: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(tag))
    }

    /// Tags from `tags` matching at least one pattern, in input order
    pub fn filter<'a>(&self, tags: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        tags.into_iter()
            .filter(|t| self.is_match(t))
            .map(str::to_string)
            .collect()
    }
}

/// Outcome of a fleet-wide tag search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagSearchResult {
    /// Repositories with at least one matching tag, in scan order
    pub repositories_with_tags: Vec<PathBuf>,
    /// Matching tags per repository
    pub repository_tags_map: BTreeMap<PathBuf, Vec<String>>,
    /// Repositories whose tags could not be listed
    pub scan_errors: BTreeMap<PathBuf, String>,
}

impl Git {
    /// All tag names of the repository at `path`
    pub async fn list_tags(&self, path: &Path) -> Result<Vec<String>> {
        let listing = self.run(path, &["tag", "--list"]).await?;
        Ok(listing
            .lines()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Tags of one repository matching any of `patterns`
    pub async fn search_tags_in_repository<S: AsRef<str>>(
        &self,
        path: &Path,
        patterns: &[S],
    ) -> Result<Vec<String>> {
        let matcher = TagMatcher::new(patterns)?;
        self.matching_tags(path, &matcher).await
    }

    async fn matching_tags(&self, path: &Path, matcher: &TagMatcher) -> Result<Vec<String>> {
        if matcher.is_empty() {
            return Ok(Vec::new());
        }
        let tags = self.list_tags(path).await?;
        Ok(matcher.filter(tags.iter().map(String::as_str)))
    }

    /// Search every repository under `base_folder` for matching tags
    ///
    /// Per-repository failures land in `scan_errors`; `progress` hears about
    /// each repository once its outcome is known.
    pub async fn search_repositories_with_tags<S: AsRef<str>>(
        &self,
        scanner: &Scanner,
        base_folder: &Path,
        patterns: &[S],
        progress: Option<&dyn ProgressSink>,
    ) -> Result<TagSearchResult> {
        let repositories = scanner.scan(base_folder);
        self.search_tags_in_repositories(&repositories, patterns, progress)
            .await
    }

    /// Search an already discovered set of repositories for matching tags
    pub async fn search_tags_in_repositories<S: AsRef<str>>(
        &self,
        repositories: &[PathBuf],
        patterns: &[S],
        progress: Option<&dyn ProgressSink>,
    ) -> Result<TagSearchResult> {
        let matcher = TagMatcher::new(patterns)?;
        let mut result = TagSearchResult::default();

        for repo in repositories.iter().cloned() {
            match self.matching_tags(&repo, &matcher).await {
                Ok(tags) => {
                    if let Some(sink) = progress {
                        sink.report(&format!("{}: {} matching tag(s)", repo.display(), tags.len()));
                    }
                    if !tags.is_empty() {
                        result.repositories_with_tags.push(repo.clone());
                        result.repository_tags_map.insert(repo, tags);
                    }
                }
                Err(e) => {
                    tracing::warn!("Tag listing failed for {}: {}", repo.display(), e);
                    if let Some(sink) = progress {
                        sink.report(&format!("{}: {}", repo.display(), e));
                    }
                    result.scan_errors.insert(repo, e.to_string());
                }
            }
        }

        Ok(result)
    }
}
