//! Filesystem access used for repository, submodule and worktree detection

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Read-only filesystem capability
pub trait FileSystem: Send + Sync {
    /// Whether `path` exists and is a directory
    fn is_dir(&self, path: &Path) -> bool;

    /// Whether `path` exists and is a regular file
    fn is_file(&self, path: &Path) -> bool;

    /// Read a small text file in full
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Immediate subdirectories of `path`
    fn subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Canonical form of `path`, used to detect revisits through symlinks
    fn canonicalize(&self, path: &Path) -> PathBuf {
        path.to_path_buf()
    }
}

/// [`FileSystem`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn canonicalize(&self, path: &Path) -> PathBuf {
        fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }
}
