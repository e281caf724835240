//! Error types for fleet operations

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for fleet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for fleet operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// An external command exited non-zero and reported on stderr
    #[error("{program} {args} failed: {message}")]
    Command {
        program: String,
        args: String,
        message: String,
        exit_code: Option<i32>,
    },

    /// A repository path argument was missing or empty
    #[error("Invalid repository path: '{}'", .0.display())]
    InvalidPath(PathBuf),

    /// Deleting a branch failed
    #[error("Failed to delete branch '{branch}': {message}")]
    BranchDelete { branch: String, message: String },

    /// A tag pattern could not be compiled
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}
