//! Lifecycle error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from privilege elevation and interrupt handling setup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Path of the running executable could not be determined.
    #[error("Failed to locate current executable: {0}")]
    CurrentExe(#[source] std::io::Error),

    /// Re-executing through the elevation program failed.
    #[error("Failed to relaunch through {program:?}: {source}")]
    Relaunch {
        /// Elevation program.
        program: PathBuf,
        /// The underlying exec error.
        #[source]
        source: std::io::Error,
    },

    /// Signal runtime could not be built.
    #[error("Failed to build signal runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// SIGINT listener could not be registered.
    #[error("Failed to register interrupt handler: {0}")]
    SignalRegistration(#[source] std::io::Error),

    /// Listener thread could not be started.
    #[error("Failed to spawn interrupt listener: {0}")]
    Spawn(#[source] std::io::Error),
}
