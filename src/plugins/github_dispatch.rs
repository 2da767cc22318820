//! GitHub dispatch plugin - triggers the publish workflow through a
//! `repository_dispatch` event
//!
//! The receiving workflow gets the candidates in `client_payload` and runs
//! the real `publish` for each of them.

use crate::core::config::DispatchConfig;
use crate::core::error::PublishError;
use crate::core::traits::{DispatchNotifier, DispatchRequest};
use crate::plugins::npm_plugin::USER_AGENT;
use crate::security::token_manager::{DISPATCH_TOKEN, SecureTokenManager};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

/// Dispatch notifier posting to `/repos/{owner}/{repo}/dispatches`
pub struct GithubDispatchNotifier {
    client: reqwest::Client,
    api_url: String,
    event_type: String,
    repo_owner: String,
    repo_name: String,
    token: SecretString,
    /// Used to scrub the token out of error bodies
    token_manager: Option<SecureTokenManager>,
}

impl GithubDispatchNotifier {
    pub fn new(
        api_url: &str,
        event_type: &str,
        repo_owner: &str,
        repo_name: &str,
        token: SecretString,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            event_type: event_type.to_string(),
            repo_owner: repo_owner.to_string(),
            repo_name: repo_name.to_string(),
            token,
            token_manager: None,
        }
    }

    /// Build from configuration; every missing setting is reported at once
    pub fn from_config(
        config: &DispatchConfig,
        tokens: SecureTokenManager,
    ) -> Result<Self, PublishError> {
        let owner = config.repo_owner.as_deref().filter(|s| !s.trim().is_empty());
        let name = config.repo_name.as_deref().filter(|s| !s.trim().is_empty());
        let token = tokens.get_token(DISPATCH_TOKEN);

        let mut missing = Vec::new();
        if owner.is_none() {
            missing.push("DISPATCH_REPO_OWNER");
        }
        if name.is_none() {
            missing.push("DISPATCH_REPO_NAME");
        }
        if token.is_none() {
            missing.push("DISPATCH_GITHUB_TOKEN");
        }

        match (owner, name, token) {
            (Some(owner), Some(name), Some(token)) => {
                let mut notifier =
                    Self::new(&config.api_url, &config.event_type, owner, name, token);
                notifier.token_manager = Some(tokens);
                Ok(notifier)
            }
            _ => Err(PublishError::Dispatch {
                message: format!("missing settings: {}", missing.join(", ")),
            }),
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/repos/{}/{}/dispatches",
            self.api_url, self.repo_owner, self.repo_name
        )
    }

    /// Request body of the dispatch call
    pub fn payload(&self, request: &DispatchRequest) -> serde_json::Value {
        serde_json::json!({
            "event_type": self.event_type,
            "client_payload": request.client_payload(),
        })
    }

    fn mask(&self, text: &str) -> String {
        match &self.token_manager {
            Some(tokens) => tokens.mask_tokens_in_string(text),
            None => text.replace(
                self.token.expose_secret(),
                &SecureTokenManager::mask_token(self.token.expose_secret()),
            ),
        }
    }
}

#[async_trait]
impl DispatchNotifier for GithubDispatchNotifier {
    fn name(&self) -> &str {
        "github"
    }

    async fn dispatch(&self, request: &DispatchRequest) -> Result<(), PublishError> {
        request.ensure_context()?;

        let url = self.endpoint();
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.token.expose_secret())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|e| PublishError::Dispatch {
                message: self.mask(&e.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Dispatch {
                message: format!("{} {}: {}", url, status, self.mask(body.trim())),
            });
        }

        info!(
            repo = %format!("{}/{}", self.repo_owner, self.repo_name),
            event_type = %self.event_type,
            packages = request.candidates.len(),
            "repository dispatch sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::{PackageDescriptor, PublishCandidate, PublishedVersions, RunContext};
    use std::collections::HashMap;

    fn tokens(pairs: &[(&str, &str)]) -> SecureTokenManager {
        SecureTokenManager::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    fn config() -> DispatchConfig {
        DispatchConfig {
            repo_owner: Some("acme".to_string()),
            repo_name: Some("releases".to_string()),
            ..Default::default()
        }
    }

    fn request(branch: &str) -> DispatchRequest {
        DispatchRequest::new(
            RunContext {
                branch: branch.to_string(),
                commit: "0123abcd".to_string(),
            },
            vec![PublishCandidate::new(
                PackageDescriptor::new("a", "1.2.0", "packages/a"),
                PublishedVersions::default(),
            )],
        )
    }

    #[test]
    fn test_from_config_reports_all_missing_settings() {
        let result = GithubDispatchNotifier::from_config(&DispatchConfig::default(), tokens(&[]));
        let Err(PublishError::Dispatch { message }) = result else {
            panic!("expected dispatch error");
        };
        assert!(message.contains("DISPATCH_REPO_OWNER"));
        assert!(message.contains("DISPATCH_REPO_NAME"));
        assert!(message.contains("DISPATCH_GITHUB_TOKEN"));
    }

    #[test]
    fn test_endpoint_and_payload() {
        let notifier = GithubDispatchNotifier::from_config(
            &config(),
            tokens(&[("DISPATCH_GITHUB_TOKEN", "ghp_0123456789abcdef")]),
        )
        .unwrap();

        assert_eq!(notifier.name(), "github");
        assert_eq!(
            notifier.endpoint(),
            "https://api.github.com/repos/acme/releases/dispatches"
        );

        let payload = notifier.payload(&request("main"));
        assert_eq!(payload["event_type"], "publish_packages");
        assert_eq!(payload["client_payload"]["branch"], "main");
        assert_eq!(payload["client_payload"]["packages"][0]["packageName"], "a");
    }

    #[test]
    fn test_mask_hides_token() {
        let notifier = GithubDispatchNotifier::from_config(
            &config(),
            tokens(&[("DISPATCH_GITHUB_TOKEN", "ghp_0123456789abcdef")]),
        )
        .unwrap();

        let masked = notifier.mask("Bad credentials: ghp_0123456789abcdef");
        assert!(!masked.contains("ghp_0123456789abcdef"));
    }

    #[tokio::test]
    async fn test_dispatch_without_context_fails_before_sending() {
        // Unroutable API URL; the request must never be attempted
        let notifier = GithubDispatchNotifier::new(
            "http://127.0.0.1:9",
            "publish_packages",
            "acme",
            "releases",
            SecretString::new("ghp_0123456789abcdef".to_string().into()),
        );

        let err = notifier.dispatch(&request("")).await.unwrap_err();
        assert!(err.to_string().contains("branch"));
    }

    #[tokio::test]
    async fn test_dispatch_transport_error() {
        let notifier = GithubDispatchNotifier::new(
            "http://127.0.0.1:9",
            "publish_packages",
            "acme",
            "releases",
            SecretString::new("ghp_0123456789abcdef".to_string().into()),
        );

        let err = notifier.dispatch(&request("main")).await.unwrap_err();
        assert_eq!(err.code(), "DISPATCH_ERROR");
    }
}
