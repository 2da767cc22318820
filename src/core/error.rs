//! Error handling for workspace publishing
//!
//! Every failure that ends a publish run is a [`PublishError`]. A registry
//! "not found" answer is never an error; it is a normal query result that
//! drives candidate selection.

use crate::core::traits::PublishCandidate;
use crate::security::command_executor::CommandError;
use thiserror::Error;

/// Main error type for a publish run
#[derive(Error, Debug)]
pub enum PublishError {
    // Registry errors
    #[error(
        "[{package}] レジストリから不明なエラーが返されました ({code}): {message}{}",
        also_failed_suffix(.also_failed)
    )]
    UnknownRegistry {
        package: String,
        code: String,
        message: String,
        /// Other packages whose lookup failed in the same round, in input order
        also_failed: Vec<String>,
    },

    // Dispatch errors
    #[error("公開トリガーの送信に失敗しました: {message}")]
    Dispatch { message: String },

    // Confirmation errors
    #[error(
        "{attempts}回確認しましたが公開を確認できませんでした: {}",
        join_names(.still_unpublished)
    )]
    PublishTimeout {
        attempts: u32,
        still_unpublished: Vec<PublishCandidate>,
    },

    #[error("{phase}の途中でキャンセルされました")]
    Cancelled { phase: String },

    // Setup errors
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("コマンド実行エラー: {0}")]
    Command(#[from] CommandError),
}

/// One failed registry lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryFailure {
    pub package: String,
    pub code: String,
    pub message: String,
}

fn also_failed_suffix(names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!(" (他に失敗したパッケージ: {})", names.join(", "))
    }
}

fn join_names(candidates: &[PublishCandidate]) -> String {
    candidates
        .iter()
        .map(|c| format!("{}@{}", c.name(), c.local_version()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl PublishError {
    /// Registry error covering every failed lookup of one round
    ///
    /// The first failure supplies code and message. Returns `None` when
    /// nothing failed.
    pub fn from_registry_failures(failures: Vec<RegistryFailure>) -> Option<Self> {
        let mut failures = failures.into_iter();
        let first = failures.next()?;
        Some(Self::UnknownRegistry {
            package: first.package,
            code: first.code,
            message: first.message,
            also_failed: failures.map(|f| f.package).collect(),
        })
    }

    /// Names of the packages this error is about (empty when it concerns the whole run)
    pub fn affected_packages(&self) -> Vec<&str> {
        match self {
            Self::UnknownRegistry {
                package,
                also_failed,
                ..
            } => std::iter::once(package.as_str())
                .chain(also_failed.iter().map(String::as_str))
                .collect(),
            Self::PublishTimeout {
                still_unpublished, ..
            } => still_unpublished.iter().map(|c| c.name()).collect(),
            Self::Dispatch { .. }
            | Self::Cancelled { .. }
            | Self::Config(_)
            | Self::Command(_) => Vec::new(),
        }
    }

    /// Whether re-running the whole orchestration may succeed without changes
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PublishTimeout { .. } | Self::Cancelled { .. } | Self::UnknownRegistry { .. }
        )
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::UnknownRegistry { .. } => vec![
                "レジストリのステータスを確認してください",
                "レジストリのURLと認証情報を確認してください",
                "しばらく待ってから再実行してください",
            ],
            Self::Dispatch { .. } => vec![
                "DISPATCH_REPO_OWNER / DISPATCH_REPO_NAME / DISPATCH_GITHUB_TOKEN を確認してください",
                "トークンの権限と有効期限を確認してください",
                "同じ実行で公開トリガーを再送しないでください",
            ],
            Self::PublishTimeout { .. } => vec![
                "CIの公開ワークフローのログを確認してください",
                "PUBLISH_MAX_ATTEMPTS / PUBLISH_POLL_DELAY_MS で待機時間を延長できます",
                "反映に時間がかかる場合があります。後で再実行してください",
            ],
            Self::Cancelled { .. } => vec!["必要であれば再実行してください"],
            Self::Config(_) => vec![
                ".publish-config.yaml を確認してください",
                "環境変数の値を確認してください",
            ],
            Self::Command(_) => vec![
                "コマンドの出力を確認してください",
                "git / pnpm / npm がインストールされているか確認してください",
            ],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownRegistry { .. } => "UNKNOWN_REGISTRY_ERROR",
            Self::Dispatch { .. } => "DISPATCH_ERROR",
            Self::PublishTimeout { .. } => "PUBLISH_TIMEOUT",
            Self::Cancelled { .. } => "CANCELLED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Command(_) => "COMMAND_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::{PackageDescriptor, PublishedVersions};

    fn candidate(name: &str, version: &str) -> PublishCandidate {
        PublishCandidate::new(
            PackageDescriptor::new(name, version, format!("packages/{}", name)),
            PublishedVersions::default(),
        )
    }

    #[test]
    fn test_unknown_registry_error() {
        let error = PublishError::UnknownRegistry {
            package: "@acme/client".to_string(),
            code: "E500".to_string(),
            message: "Internal Server Error".to_string(),
            also_failed: Vec::new(),
        };

        assert_eq!(error.code(), "UNKNOWN_REGISTRY_ERROR");
        assert!(error.is_recoverable());
        assert_eq!(error.affected_packages(), vec!["@acme/client"]);
        let display = error.to_string();
        assert!(display.contains("@acme/client"));
        assert!(display.contains("E500"));
        assert!(!display.contains("他に失敗"));
    }

    #[test]
    fn test_registry_failures_are_all_reported() {
        let failure = |package: &str, code: &str| RegistryFailure {
            package: package.to_string(),
            code: code.to_string(),
            message: "Service Unavailable".to_string(),
        };

        let error = PublishError::from_registry_failures(vec![
            failure("a", "E503"),
            failure("c", "E500"),
            failure("d", "ETIMEDOUT"),
        ])
        .unwrap();

        assert!(matches!(
            error,
            PublishError::UnknownRegistry { ref package, ref code, .. } if package == "a" && code == "E503"
        ));
        assert_eq!(error.affected_packages(), vec!["a", "c", "d"]);
        assert!(error.to_string().contains("他に失敗したパッケージ: c, d"));
        assert!(PublishError::from_registry_failures(Vec::new()).is_none());
    }

    #[test]
    fn test_timeout_lists_unpublished_packages() {
        let error = PublishError::PublishTimeout {
            attempts: 10,
            still_unpublished: vec![candidate("a", "1.2.0"), candidate("c", "0.3.0")],
        };

        assert_eq!(error.code(), "PUBLISH_TIMEOUT");
        assert!(error.is_recoverable());
        assert_eq!(error.affected_packages(), vec!["a", "c"]);
        let display = error.to_string();
        assert!(display.contains("a@1.2.0, c@0.3.0"));
        assert!(display.contains("10回"));
    }

    #[test]
    fn test_dispatch_error_is_not_recoverable() {
        let error = PublishError::Dispatch {
            message: "422 Unprocessable Entity".to_string(),
        };

        assert!(!error.is_recoverable());
        assert!(error.affected_packages().is_empty());
        assert!(
            error
                .suggested_actions()
                .iter()
                .any(|a| a.contains("DISPATCH_GITHUB_TOKEN"))
        );
    }

    #[test]
    fn test_command_error_conversion() {
        let error: PublishError = CommandError::CommandNotAllowed("rm".to_string()).into();
        assert_eq!(error.code(), "COMMAND_ERROR");
        assert!(error.to_string().contains("rm"));
    }
}
