//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Arguments were well-formed but unusable together
    #[error("Usage error: {message}")]
    Usage {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Susurro library error
    #[error("Susurro error: {0}")]
    Susurro(#[from] susurro::SusurroError),
}

impl CliError {
    /// Create a usage error
    #[must_use]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_error() {
        let err = CliError::usage("iterations must be positive");
        assert!(err.to_string().contains("Usage"));
        assert!(err.to_string().contains("iterations"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(cli_err.to_string().contains("I/O"));
    }

    #[test]
    fn test_susurro_error_from() {
        let lib_err = susurro::SusurroError::invalid_argument("unknown contention mode: \"x\"");
        let cli_err: CliError = lib_err.into();
        assert!(cli_err.to_string().contains("Susurro"));
        assert!(cli_err.to_string().contains("unknown contention mode"));
    }
}
