//! Step output plugin - hands the candidates to a later workflow step
//!
//! Appends `packages`, `branch` and `commit` to the `GITHUB_OUTPUT` file
//! instead of sending an API request.

use crate::core::error::PublishError;
use crate::core::traits::{DispatchNotifier, DispatchRequest};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

pub struct StepOutputNotifier {
    output_file: PathBuf,
}

impl StepOutputNotifier {
    pub fn new(output_file: impl Into<PathBuf>) -> Self {
        Self {
            output_file: output_file.into(),
        }
    }

    pub fn from_path(output_file: Option<&Path>) -> Result<Self, PublishError> {
        output_file
            .map(Self::new)
            .ok_or_else(|| PublishError::Dispatch {
                message: "step output file is not set (GITHUB_OUTPUT)".to_string(),
            })
    }

    /// `key=value` lines written for one request
    pub fn render(request: &DispatchRequest) -> Result<String, PublishError> {
        let packages = serde_json::to_string(&request.packages()).map_err(|e| {
            PublishError::Dispatch {
                message: format!("failed to serialize packages: {}", e),
            }
        })?;

        Ok(format!(
            "packages={}\nbranch={}\ncommit={}\n",
            packages, request.branch, request.commit
        ))
    }
}

#[async_trait]
impl DispatchNotifier for StepOutputNotifier {
    fn name(&self) -> &str {
        "step-output"
    }

    async fn dispatch(&self, request: &DispatchRequest) -> Result<(), PublishError> {
        request.ensure_context()?;
        let content = Self::render(request)?;

        let write_error = |e: std::io::Error| PublishError::Dispatch {
            message: format!("{}: {}", self.output_file.display(), e),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_file)
            .await
            .map_err(write_error)?;
        file.write_all(content.as_bytes()).await.map_err(write_error)?;
        file.flush().await.map_err(write_error)?;

        info!(
            path = %self.output_file.display(),
            packages = request.candidates.len(),
            "step outputs written"
        );
        Ok(())
    }
}
