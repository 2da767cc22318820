//! Run context from the local git checkout

use crate::core::error::PublishError;
use crate::core::traits::{RunContext, RunContextProvider};
use crate::security::command_executor::{CommandError, SafeCommandExecutor};
use async_trait::async_trait;

/// Reads branch and commit with `git rev-parse`
pub struct GitRunContext {
    executor: SafeCommandExecutor,
}

fn git_failure(args: &[&str], detail: impl std::fmt::Display) -> PublishError {
    PublishError::Dispatch {
        message: format!("git {} failed: {}", args.join(" "), detail),
    }
}

impl GitRunContext {
    pub fn new(executor: SafeCommandExecutor) -> Self {
        Self { executor }
    }

    async fn rev_parse(&self, args: &[&str]) -> Result<String, PublishError> {
        let output = self
            .executor
            .execute("git", args)
            .await
            .map_err(|e: CommandError| git_failure(args, e))?;

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || value.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(git_failure(args, stderr.trim()));
        }
        Ok(value)
    }
}

#[async_trait]
impl RunContextProvider for GitRunContext {
    async fn current(&self) -> Result<RunContext, PublishError> {
        let branch = self.rev_parse(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let commit = self.rev_parse(&["rev-parse", "HEAD"]).await?;
        Ok(RunContext { branch, commit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_outside_repository_is_a_dispatch_error() {
        let temp_dir = TempDir::new().unwrap();
        let provider = GitRunContext::new(SafeCommandExecutor::new(temp_dir.path()).unwrap());

        let err = provider.current().await.unwrap_err();
        assert!(matches!(err, PublishError::Dispatch { .. }));
        assert_eq!(err.code(), "DISPATCH_ERROR");
    }

    #[tokio::test]
    async fn test_git_timeout_is_a_dispatch_error() {
        let temp_dir = TempDir::new().unwrap();
        let executor = SafeCommandExecutor::new(temp_dir.path())
            .unwrap()
            .with_timeout(Duration::ZERO);
        let provider = GitRunContext::new(executor);

        let err = provider.current().await.unwrap_err();
        assert!(matches!(err, PublishError::Dispatch { ref message } if message.contains("rev-parse")));
    }

    #[test]
    fn test_executor_failure_maps_to_dispatch() {
        let err = git_failure(
            &["rev-parse", "HEAD"],
            CommandError::ExecutionFailed("git: No such file or directory".to_string()),
        );

        assert_eq!(err.code(), "DISPATCH_ERROR");
        assert!(err.to_string().contains("git rev-parse HEAD failed"));
        assert!(err.to_string().contains("No such file or directory"));
    }
}
