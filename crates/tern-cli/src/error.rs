//! Error types for the CLI layer.

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors surfacing at the command layer
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Bad command-line usage or configuration input.
    #[error("{0}")]
    User(String),

    #[error(transparent)]
    Core(#[from] tern_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn user(message: impl Into<String>) -> CliError {
        CliError::User(message.into())
    }

    /// Whether the error was already shown to the user; silent errors
    /// only set the exit code.
    pub fn is_silent(&self) -> bool {
        matches!(self, CliError::Core(core) if core.is_already_reported())
    }
}
