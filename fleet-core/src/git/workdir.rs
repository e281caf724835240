//! Metadata marker detection and working directory resolution
//!
//! A checkout's `.git` is either a directory (a plain clone) or a one-line
//! file of the form `gitdir: <path>` (linked worktrees and submodules).
//! Resolution is repeated for every command: the file is tiny and may be
//! rewritten underneath a long-running process.

use std::path::{Path, PathBuf};

use crate::fs::FileSystem;

/// Name of the metadata marker inside a checkout
pub const GIT_MARKER: &str = ".git";

/// Prefix of the single line inside an indirection file
pub const GITDIR_PREFIX: &str = "gitdir:";

/// How a directory's metadata marker is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// `.git` is a directory
    Directory,
    /// `.git` is an indirection file
    File,
    /// No marker present
    Missing,
}

/// Inspect the metadata marker of `path`
pub fn marker(fs: &dyn FileSystem, path: &Path) -> Marker {
    let git = path.join(GIT_MARKER);
    if fs.is_dir(&git) {
        Marker::Directory
    } else if fs.is_file(&git) {
        Marker::File
    } else {
        Marker::Missing
    }
}

/// Whether `path` is a repository root (marker as directory or file)
pub fn is_repository(fs: &dyn FileSystem, path: &Path) -> bool {
    marker(fs, path) != Marker::Missing
}

/// Target of the indirection file in `path`, if it has a recognised prefix
///
/// Relative targets are resolved against `path`.
pub fn indirection_target(fs: &dyn FileSystem, path: &Path) -> Option<PathBuf> {
    let contents = fs.read_to_string(&path.join(GIT_MARKER)).ok()?;
    let line = contents.lines().next()?.trim();
    let target = line.strip_prefix(GITDIR_PREFIX)?.trim();
    if target.is_empty() {
        return None;
    }
    Some(path.join(target))
}

/// Directory git commands for `repo_path` are run in
///
/// Uses `repo_path` itself for a plain clone or when the indirection file
/// cannot be interpreted, and the resolved indirection target otherwise.
pub fn resolve_working_directory(fs: &dyn FileSystem, repo_path: &Path) -> PathBuf {
    match marker(fs, repo_path) {
        Marker::File => match indirection_target(fs, repo_path) {
            Some(target) if fs.is_dir(&target) => target,
            Some(target) => {
                tracing::debug!(
                    "Indirection target {} for {} does not exist, using repository path",
                    target.display(),
                    repo_path.display()
                );
                repo_path.to_path_buf()
            }
            None => repo_path.to_path_buf(),
        },
        Marker::Directory | Marker::Missing => repo_path.to_path_buf(),
    }
}

/// Directory holding the repository's `config` file
///
/// Follows the indirection file and, for linked worktrees, the `commondir`
/// pointer to the shared metadata directory.
pub fn metadata_directory(fs: &dyn FileSystem, repo_path: &Path) -> Option<PathBuf> {
    let gitdir = match marker(fs, repo_path) {
        Marker::Directory => repo_path.join(GIT_MARKER),
        Marker::File => indirection_target(fs, repo_path)?,
        Marker::Missing => return None,
    };

    let commondir = gitdir.join("commondir");
    if fs.is_file(&commondir) {
        if let Ok(contents) = fs.read_to_string(&commondir) {
            let shared = contents.trim();
            if !shared.is_empty() {
                return Some(gitdir.join(shared));
            }
        }
    }

    Some(gitdir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OsFileSystem;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_plain_clone_uses_repo_path() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();

        assert_eq!(marker(&OsFileSystem, temp.path()), Marker::Directory);
        assert_eq!(
            resolve_working_directory(&OsFileSystem, temp.path()),
            temp.path()
        );
    }

    #[test]
    fn test_relative_indirection_is_resolved_against_repo() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("sub");
        let target = temp.path().join("main").join(".git").join("modules").join("sub");
        fs::create_dir_all(&repo).unwrap();
        fs::create_dir_all(&target).unwrap();
        fs::write(repo.join(".git"), "gitdir: ../main/.git/modules/sub\n").unwrap();

        assert_eq!(marker(&OsFileSystem, &repo), Marker::File);
        let resolved = resolve_working_directory(&OsFileSystem, &repo);
        assert_eq!(resolved, repo.join("../main/.git/modules/sub"));
        assert!(resolved.is_dir());
    }

    #[test]
    fn test_absolute_indirection() {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("wt");
        let target = temp.path().join("gitdirs").join("wt");
        fs::create_dir_all(&repo).unwrap();
        fs::create_dir_all(&target).unwrap();
        fs::write(repo.join(".git"), format!("gitdir: {}", target.display())).unwrap();

        assert_eq!(resolve_working_directory(&OsFileSystem, &repo), target);
    }

    #[test]
    fn test_unprefixed_indirection_falls_back() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".git"), "something else entirely").unwrap();

        assert!(indirection_target(&OsFileSystem, temp.path()).is_none());
        assert_eq!(
            resolve_working_directory(&OsFileSystem, temp.path()),
            temp.path()
        );
    }

    #[test]
    fn test_dangling_indirection_falls_back() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".git"), "gitdir: /does/not/exist/anywhere").unwrap();

        assert_eq!(
            resolve_working_directory(&OsFileSystem, temp.path()),
            temp.path()
        );
    }

    #[test]
    fn test_resolution_follows_rewrites() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        let repo = temp.path().join("repo");
        fs::create_dir_all(&repo).unwrap();

        fs::write(repo.join(".git"), "gitdir: ../first").unwrap();
        assert_eq!(resolve_working_directory(&OsFileSystem, &repo), repo.join("../first"));

        fs::write(repo.join(".git"), "gitdir: ../second").unwrap();
        assert_eq!(resolve_working_directory(&OsFileSystem, &repo), repo.join("../second"));
    }

    #[test]
    fn test_metadata_directory_follows_commondir() {
        let temp = TempDir::new().unwrap();
        let main_git = temp.path().join("main").join(".git");
        let wt_gitdir = main_git.join("worktrees").join("feature");
        fs::create_dir_all(&wt_gitdir).unwrap();
        fs::write(wt_gitdir.join("commondir"), "../..\n").unwrap();
        let wt = temp.path().join("feature");
        fs::create_dir_all(&wt).unwrap();
        fs::write(wt.join(".git"), format!("gitdir: {}", wt_gitdir.display())).unwrap();

        let dir = metadata_directory(&OsFileSystem, &wt).unwrap();
        assert_eq!(dir, wt_gitdir.join("../.."));
    }

    #[test]
    fn test_missing_marker() {
        let temp = TempDir::new().unwrap();
        assert!(!is_repository(&OsFileSystem, temp.path()));
        assert!(metadata_directory(&OsFileSystem, temp.path()).is_none());
    }
}
