//! Repository discovery
//!
//! Walks a directory tree with an explicit stack and reports every
//! repository root it finds. A repository is never descended into: nested
//! checkouts are only reported when declared in `.gitmodules`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::Pattern;
use tracing::{error, warn};

use crate::config::ScanConfig;
use crate::fs::{FileSystem, OsFileSystem};
use crate::git::workdir::{self, GIT_MARKER};

/// Name of the submodule declaration file
pub const GITMODULES: &str = ".gitmodules";

/// Relative paths declared by `path = ...` lines of a `.gitmodules` file
pub fn parse_submodule_paths(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| {
            let (key, value) = line.trim().split_once('=')?;
            if key.trim() != "path" {
                return None;
            }
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then(|| value.to_string())
        })
        .collect()
}

/// Depth-first repository scanner
#[derive(Clone)]
pub struct Scanner {
    fs: Arc<dyn FileSystem>,
    include_submodules: bool,
    exclude: Vec<Pattern>,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("include_submodules", &self.include_submodules)
            .field("exclude", &self.exclude)
            .finish_non_exhaustive()
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(Arc::new(OsFileSystem))
    }
}

impl Scanner {
    /// Scanner with submodule discovery enabled and no exclusions
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            include_submodules: true,
            exclude: Vec::new(),
        }
    }

    /// Scanner configured from the `[scan]` section
    pub fn from_config(fs: Arc<dyn FileSystem>, config: &ScanConfig) -> Self {
        let exclude = config
            .exclude
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid exclude pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        Self {
            fs,
            include_submodules: config.include_submodules,
            exclude,
        }
    }

    pub fn with_submodules(mut self, include: bool) -> Self {
        self.include_submodules = include;
        self
    }

    fn visit_key(&self, path: &Path) -> String {
        self.fs
            .canonicalize(path)
            .to_string_lossy()
            .to_lowercase()
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.iter().any(|p| p.matches_path(path))
    }

    /// Repository roots under `root`, in traversal order
    ///
    /// Never fails: unreadable directories and malformed `.gitmodules` files
    /// are logged and skipped.
    pub fn scan(&self, root: &Path) -> Vec<PathBuf> {
        let mut visited = HashSet::new();
        let mut found = Vec::new();
        self.scan_into(root, &mut visited, &mut found);
        found
    }

    /// Repository roots under every root, without duplicates
    pub fn scan_all(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        self.scan_grouped(roots)
            .into_iter()
            .flat_map(|(_, repos)| repos)
            .collect()
    }

    /// Like [`Scanner::scan_all`], keeping each repository next to the root
    /// it was first found under
    pub fn scan_grouped(&self, roots: &[PathBuf]) -> Vec<(PathBuf, Vec<PathBuf>)> {
        let mut visited = HashSet::new();
        roots
            .iter()
            .map(|root| {
                let mut found = Vec::new();
                self.scan_into(root, &mut visited, &mut found);
                (root.clone(), found)
            })
            .collect()
    }

    fn scan_into(&self, root: &Path, visited: &mut HashSet<String>, found: &mut Vec<PathBuf>) {
        if !self.fs.is_dir(root) {
            error!("Scan root {} is not an accessible directory", root.display());
            return;
        }

        let mut stack = vec![root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            if !visited.insert(self.visit_key(&dir)) {
                continue;
            }

            if dir != root && self.is_excluded(&dir) {
                continue;
            }

            if workdir::is_repository(self.fs.as_ref(), &dir) {
                if self.include_submodules {
                    self.push_submodules(&dir, visited, &mut stack);
                }
                found.push(dir);
                continue;
            }

            match self.fs.subdirectories(&dir) {
                Ok(subdirs) => {
                    // Reversed so the stack pops them in listing order
                    for sub in subdirs.into_iter().rev() {
                        if sub.file_name().is_some_and(|n| n == GIT_MARKER) {
                            continue;
                        }
                        stack.push(sub);
                    }
                }
                Err(e) if dir == root => {
                    error!("Cannot read scan root {}: {}", dir.display(), e);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", dir.display(), e);
                }
            }
        }
    }

    fn push_submodules(&self, repo: &Path, visited: &HashSet<String>, stack: &mut Vec<PathBuf>) {
        let gitmodules = repo.join(GITMODULES);
        if !self.fs.is_file(&gitmodules) {
            return;
        }

        let contents = match self.fs.read_to_string(&gitmodules) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Skipping submodules of {}: {}", repo.display(), e);
                return;
            }
        };

        for relative in parse_submodule_paths(&contents).into_iter().rev() {
            let path = repo.join(&relative);
            if workdir::is_repository(self.fs.as_ref(), &path)
                && !visited.contains(&self.visit_key(&path))
            {
                stack.push(path);
            }
        }
    }
}
