//! SafeCommandExecutor: whitelisted command execution for release collaborators
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only `git`, `npm` and `pnpm` can execute
//! - **Injection prevention**: Arguments are passed as a vector, never through a shell
//! - **Working directory validation**: Validates existence before execution
//! - **Timeout control**: Hanging processes are killed
//!
//! # Example
//!
//! ```rust,no_run
//! use workspace_publisher::SafeCommandExecutor;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), workspace_publisher::CommandError> {
//! let executor = SafeCommandExecutor::new(".")?.with_timeout(Duration::from_secs(30));
//! let output = executor.execute("git", &["rev-parse", "HEAD"]).await?;
//! println!("{}", String::from_utf8_lossy(&output.stdout));
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Commands the publisher is allowed to run
const ALLOWED_COMMANDS: &[&str] = &["git", "npm", "pnpm"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Command execution failed (e.g., binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Command exceeded the timeout duration
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),
}

/// Safe command executor with security controls
#[derive(Debug, Clone)]
pub struct SafeCommandExecutor {
    /// Working directory where commands will be executed
    working_dir: PathBuf,
    /// Optional timeout for command execution
    timeout: Option<Duration>,
}

impl SafeCommandExecutor {
    /// Create a new SafeCommandExecutor with working directory validation.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.exists() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            timeout: None,
        })
    }

    /// Set command execution timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.set_timeout(timeout);
        self
    }

    /// Check a command against the whitelist
    pub fn is_allowed(command: &str) -> bool {
        ALLOWED_COMMANDS.contains(&command)
    }

    /// Execute a whitelisted command and capture its output.
    ///
    /// A non-zero exit status is not an error here; callers inspect
    /// `Output::status` themselves.
    ///
    /// # Errors
    ///
    /// - `CommandError::CommandNotAllowed` - Command not in whitelist
    /// - `CommandError::ExecutionFailed` - Binary not found or execution error
    /// - `CommandError::Timeout` - Command ran longer than the configured timeout
    pub async fn execute(&self, command: &str, args: &[&str]) -> Result<Output, CommandError> {
        if !Self::is_allowed(command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }

        // npm and pnpm are .cmd shims on Windows
        #[cfg(target_os = "windows")]
        let command_name = if matches!(command, "npm" | "pnpm") {
            format!("{}.cmd", command)
        } else {
            command.to_string()
        };

        #[cfg(not(target_os = "windows"))]
        let command_name = command.to_string();

        let child = Command::new(&command_name)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child)
                .await
                .map_err(|_| CommandError::Timeout(timeout))?,
            None => child.await,
        };

        output.map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", command, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_dir() -> PathBuf {
        std::env::temp_dir()
    }

    #[tokio::test]
    async fn test_rejected_command_rm() {
        let executor = SafeCommandExecutor::new(get_test_dir()).unwrap();
        let result = executor.execute("rm", &["-rf", "/"]).await;
        assert!(
            matches!(result, Err(CommandError::CommandNotAllowed(_))),
            "rm should be rejected as not in whitelist"
        );
    }

    #[tokio::test]
    async fn test_rejected_command_sh() {
        let executor = SafeCommandExecutor::new(get_test_dir()).unwrap();
        let result = executor.execute("sh", &["-c", "git rev-parse HEAD"]).await;
        assert!(matches!(result, Err(CommandError::CommandNotAllowed(cmd)) if cmd == "sh"));
    }

    #[test]
    fn test_whitelist() {
        assert!(SafeCommandExecutor::is_allowed("git"));
        assert!(SafeCommandExecutor::is_allowed("pnpm"));
        assert!(SafeCommandExecutor::is_allowed("npm"));
        assert!(!SafeCommandExecutor::is_allowed("cargo"));
    }

    #[test]
    fn test_invalid_working_directory() {
        let result = SafeCommandExecutor::new("/nonexistent/directory/that/does/not/exist");
        assert!(
            matches!(result, Err(CommandError::InvalidWorkingDirectory(_))),
            "Should reject non-existent working directory"
        );
    }

    #[test]
    fn test_with_timeout() {
        let executor = SafeCommandExecutor::new(get_test_dir())
            .unwrap()
            .with_timeout(Duration::from_secs(5));
        assert_eq!(executor.timeout, Some(Duration::from_secs(5)));
        assert_eq!(executor.working_dir, get_test_dir());
    }
}
