use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::trace;

use super::{CommandExecutor, ExecError};

/// [`CommandExecutor`] backed by a real child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for SystemExecutor {
    async fn run(&self, program: &Path, args: &[String]) -> Result<(), ExecError> {
        trace!(program = %program.display(), ?args, "running command");

        let output = Command::new(program).args(args).output().await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ExecError::CommandFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_maps_to_ok() {
        let executor = SystemExecutor::new();
        let result = executor.run(Path::new("/bin/true"), &[]).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_nonzero_exit_maps_to_command_failed() {
        let executor = SystemExecutor::new();
        let result = executor.run(Path::new("/bin/false"), &[]).await;
        assert!(matches!(
            result,
            Err(ExecError::CommandFailed { status: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_maps_to_io() {
        let executor = SystemExecutor::new();
        let result = executor
            .run(Path::new("/nonexistent/chainguard-test-tool"), &[])
            .await;
        assert!(matches!(result, Err(ExecError::Io(_))));
    }
}
