//! Error types for tern-core

use std::path::PathBuf;

/// Result type for tern-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in package-management operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The error has already been shown to the user through the [`Ui`].
    /// Callers must propagate this value without reporting it again; the
    /// command layer turns it into a bare non-zero exit.
    ///
    /// [`Ui`]: crate::ui::Ui
    #[error("error already reported")]
    AlreadyReported,

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    #[error("invalid constraint '{input}': {reason}")]
    InvalidConstraint { input: String, reason: String },

    #[error("{0}")]
    NotFound(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML at {path}: {message}")]
    Yaml { path: PathBuf, message: String },

    #[error(transparent)]
    Vcs(#[from] tern_git::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn yaml(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Yaml {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error was already reported through the UI.
    pub fn is_already_reported(&self) -> bool {
        matches!(self, Error::AlreadyReported)
    }
}
