//! External command execution.
//!
//! The rule-table tool is an opaque collaborator: the controller hands it
//! an already-resolved binary path and an argument vector, and only cares
//! whether the invocation succeeded. [`CommandExecutor`] is the seam;
//! [`SystemExecutor`] is the production implementation. Tests substitute a
//! recording executor.

mod system;

pub use system::SystemExecutor;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// External command failure.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The tool ran but exited non-zero.
    #[error("command exited with status {status}: {stderr}")]
    CommandFailed {
        /// Exit status code (-1 if terminated by signal).
        status: i32,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The tool could not be spawned or its output could not be read.
    #[error("failed to run command: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs external commands on behalf of the controller.
///
/// No timeout or cancellation of its own; the process executor's behavior
/// is passed through as failure.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args`, suspending until it exits.
    async fn run(&self, program: &Path, args: &[String]) -> Result<(), ExecError>;
}
