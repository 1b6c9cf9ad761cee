//! Error types for tern-git

use std::path::PathBuf;

/// Result type for tern-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving git
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to clone '{url}': {message}")]
    CloneFailed { url: String, message: String },

    #[error("tag '{tag}' not found in '{url}'")]
    TagNotFound { url: String, tag: String },

    #[error("branch '{branch}' not found in '{url}'")]
    BranchNotFound { url: String, branch: String },

    #[error("failed to pull '{path}': {message}")]
    PullFailed { path: PathBuf, message: String },

    #[error("cannot fast-forward '{path}': {message}")]
    CannotFastForward { path: PathBuf, message: String },

    #[error("repository at '{path}' has no checked-out branch")]
    DetachedHead { path: PathBuf },

    #[error(transparent)]
    Git(#[from] git2::Error),
}
