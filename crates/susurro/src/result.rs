//! Result and error types for Susurro.

use thiserror::Error;

/// Result type for Susurro operations
pub type SusurroResult<T> = Result<T, SusurroError>;

/// Errors that can occur in Susurro
#[derive(Debug, Error)]
pub enum SusurroError {
    /// Caller supplied an argument outside the accepted domain
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// An aligned lane buffer could not be acquired
    #[error("Allocation of {bytes} bytes (alignment {alignment}) failed")]
    AllocationFailure {
        /// Requested size in bytes
        bytes: usize,
        /// Requested alignment in bytes
        alignment: usize,
    },

    /// The requested contention kernel cannot run on this host
    #[error("Unsupported platform: {message}")]
    UnsupportedPlatform {
        /// Error message
        message: String,
    },

    /// A lane worker could not be spawned or died mid-burst
    #[error("Worker pool error: {message}")]
    WorkerPool {
        /// Error message
        message: String,
    },
}

impl SusurroError {
    /// Create an `InvalidArgument` error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an `UnsupportedPlatform` error
    pub fn unsupported_platform(message: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            message: message.into(),
        }
    }

    /// Create a `WorkerPool` error
    pub fn worker_pool(message: impl Into<String>) -> Self {
        Self::WorkerPool {
            message: message.into(),
        }
    }
}
