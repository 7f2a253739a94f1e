//! Error types for network configuration operations.
//!
//! Every failure here is fatal to the calling operation. The OS proxy state
//! is unknown after a partial failure, so nothing in this crate retries.

use thiserror::Error;

/// Errors raised while querying or mutating the OS network configuration.
#[derive(Debug, Error)]
pub enum NetconfError {
    /// The command could not be started.
    #[error("Failed to execute `{cmd}`: {source}")]
    ExecutionFailed {
        /// Command line that was attempted.
        cmd: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited non-zero.
    #[error("`{cmd}` exited with code {code}: {stderr}")]
    ExecutionError {
        /// Command line that failed.
        cmd: String,
        /// Exit code (-1 if terminated by a signal).
        code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// Expected structured data was absent from command output.
    #[error("Unexpected output from `{cmd}`: missing {expected}")]
    Parse {
        /// Command whose output was being parsed.
        cmd: String,
        /// What the parser was looking for.
        expected: String,
    },

    /// A required network entity could not be resolved.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl NetconfError {
    /// True for the two variants describing a command that did not succeed.
    pub fn is_execution(&self) -> bool {
        matches!(
            self,
            NetconfError::ExecutionFailed { .. } | NetconfError::ExecutionError { .. }
        )
    }
}
