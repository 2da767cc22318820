//! Package manager plugin - registry lookups through `pnpm info` / `npm info`
//!
//! Uses the package manager's own registry configuration (`.npmrc`, scoped
//! registries, auth) instead of talking HTTP directly.

use crate::core::traits::{RegistryClient, RegistryQueryResult};
use crate::security::command_executor::SafeCommandExecutor;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Package manager binary used for lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Pnpm,
    Npm,
}

impl PackageManager {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Pnpm => "pnpm",
            PackageManager::Npm => "npm",
        }
    }
}

/// Registry client running `<manager> info <name> --json`
pub struct PackageManagerInfoClient {
    executor: SafeCommandExecutor,
    manager: PackageManager,
}

impl PackageManagerInfoClient {
    pub fn new(executor: SafeCommandExecutor, manager: PackageManager) -> Self {
        Self { executor, manager }
    }
}

fn as_text(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Map the JSON printed by `info --json` onto the registry result taxonomy
pub(crate) fn classify_info_output(stdout: &str) -> RegistryQueryResult {
    // The GitHub package registry prints nothing for an unknown package instead of an E404
    if stdout.trim().is_empty() {
        return RegistryQueryResult::NotFound;
    }

    let info: Value = match serde_json::from_str(stdout) {
        Ok(info) => info,
        Err(e) => return RegistryQueryResult::unknown("EJSONPARSE", e.to_string()),
    };

    if let Some(error) = info.get("error") {
        let code = as_text(error.get("code")).unwrap_or("EUNKNOWN");
        if code == "E404" {
            return RegistryQueryResult::NotFound;
        }

        let message = [as_text(error.get("summary")), as_text(error.get("detail"))]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n");
        return RegistryQueryResult::unknown(code, message);
    }

    // `versions` is an array, or a bare string when only one version exists
    match info.get("versions") {
        Some(Value::Array(versions)) => {
            RegistryQueryResult::found(versions.iter().filter_map(Value::as_str))
        }
        Some(Value::String(version)) => RegistryQueryResult::found([version.as_str()]),
        None | Some(Value::Null) => RegistryQueryResult::found(Vec::<String>::new()),
        Some(other) => RegistryQueryResult::unknown(
            "EJSONPARSE",
            format!("unexpected versions field: {}", other),
        ),
    }
}

#[async_trait]
impl RegistryClient for PackageManagerInfoClient {
    fn name(&self) -> &str {
        self.manager.as_str()
    }

    async fn query(&self, package_name: &str) -> RegistryQueryResult {
        debug!(package = package_name, manager = self.manager.as_str(), "registry lookup");

        let output = match self
            .executor
            .execute(self.manager.as_str(), &["info", package_name, "--json"])
            .await
        {
            Ok(output) => output,
            Err(e) => return RegistryQueryResult::unknown("ECOMMAND", e.to_string()),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);

        // A failing command that printed nothing gives us no JSON to go on
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return RegistryQueryResult::unknown(
                "ECOMMAND",
                format!(
                    "{} info exited with {}: {}",
                    self.manager.as_str(),
                    output.status,
                    stderr.trim()
                ),
            );
        }

        classify_info_output(&stdout)
    }
}
