//! NPM Plugin - registry lookups over HTTP
//!
//! Fetches the package document (`GET <registry>/<name>`) and reads the keys
//! of its `versions` object. Works against registry.npmjs.org and npm
//! compatible proxies such as the GitHub package registry.

use crate::core::traits::{RegistryClient, RegistryQueryResult};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// User agent for registry requests
pub const USER_AGENT: &str = concat!("workspace-publisher/", env!("CARGO_PKG_VERSION"));

/// Longest registry error body kept in diagnostics
const MAX_ERROR_BODY: usize = 200;

/// NPM registry package document (only the parts we read)
#[derive(Debug, Deserialize)]
struct NpmRegistryInfo {
    #[serde(default)]
    versions: HashMap<String, serde_json::Value>,
}

/// Registry client talking to an npm compatible HTTP registry
pub struct NpmRegistryClient {
    base_url: String,
    client: reqwest::Client,
    token: Option<SecretString>,
}

impl NpmRegistryClient {
    /// Create a client for the given registry base URL
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: None,
        }
    }

    /// Authenticate lookups (private registries)
    pub fn with_token(mut self, token: Option<SecretString>) -> Self {
        self.token = token;
        self
    }

    /// Document URL; the slash of a scoped name is percent-encoded
    pub fn package_url(&self, package_name: &str) -> String {
        format!("{}/{}", self.base_url, package_name.replace('/', "%2F"))
    }
}

/// Map an HTTP answer onto the registry result taxonomy
pub(crate) fn classify_response(status: u16, body: &str) -> RegistryQueryResult {
    if status == 404 {
        return RegistryQueryResult::NotFound;
    }

    if !(200..300).contains(&status) {
        let snippet: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
        return RegistryQueryResult::unknown(format!("E{}", status), snippet);
    }

    // Proxies answer an unknown package with an empty 200 instead of a 404
    if body.trim().is_empty() {
        return RegistryQueryResult::NotFound;
    }

    match serde_json::from_str::<NpmRegistryInfo>(body) {
        Ok(info) => RegistryQueryResult::found(info.versions.into_keys()),
        Err(e) => RegistryQueryResult::unknown("EJSONPARSE", e.to_string()),
    }
}

#[async_trait]
impl RegistryClient for NpmRegistryClient {
    fn name(&self) -> &str {
        "npm-http"
    }

    async fn query(&self, package_name: &str) -> RegistryQueryResult {
        let url = self.package_url(package_name);
        debug!(package = package_name, %url, "registry lookup");

        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let code = if e.is_timeout() { "ETIMEDOUT" } else { "ENETWORK" };
                return RegistryQueryResult::unknown(code, e.to_string());
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => classify_response(status, &body),
            Err(e) => RegistryQueryResult::unknown("EBODY", e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client() {
        let client = NpmRegistryClient::new("https://registry.npmjs.org/", Duration::from_secs(5));
        assert_eq!(client.name(), "npm-http");
        assert_eq!(client.base_url, "https://registry.npmjs.org");
    }

    #[test]
    fn test_package_url_scoped() {
        let client = NpmRegistryClient::new("https://npm.pkg.github.com", Duration::from_secs(5));
        assert_eq!(
            client.package_url("@acme/client"),
            "https://npm.pkg.github.com/@acme%2Fclient"
        );
        assert_eq!(client.package_url("xmc"), "https://npm.pkg.github.com/xmc");
    }

    #[test]
    fn test_classify_found() {
        let body = r#"{"name":"a","versions":{"1.1.0":{},"1.2.0":{}},"dist-tags":{"latest":"1.2.0"}}"#;
        let result = classify_response(200, body);
        assert!(result.has_version("1.1.0"));
        assert!(result.has_version("1.2.0"));
    }

    #[test]
    fn test_classify_found_without_versions() {
        let result = classify_response(200, r#"{"name":"a"}"#);
        assert_eq!(result, RegistryQueryResult::found(Vec::<String>::new()));
    }

    #[test]
    fn test_classify_not_found_status() {
        assert_eq!(
            classify_response(404, r#"{"error":"Not found"}"#),
            RegistryQueryResult::NotFound
        );
    }

    #[test]
    fn test_classify_empty_body_is_not_found() {
        assert_eq!(classify_response(200, ""), RegistryQueryResult::NotFound);
        assert_eq!(classify_response(200, "  \n"), RegistryQueryResult::NotFound);
    }

    #[test]
    fn test_classify_server_error() {
        let result = classify_response(503, "Service Unavailable");
        assert_eq!(
            result,
            RegistryQueryResult::unknown("E503", "Service Unavailable")
        );
    }

    #[test]
    fn test_classify_unauthorized_is_unknown() {
        let result = classify_response(401, "");
        assert!(matches!(result, RegistryQueryResult::UnknownError { code, .. } if code == "E401"));
    }

    #[test]
    fn test_classify_malformed_body() {
        let result = classify_response(200, "<html>proxy error</html>");
        assert!(matches!(result, RegistryQueryResult::UnknownError { code, .. } if code == "EJSONPARSE"));
    }

    #[tokio::test]
    async fn test_unreachable_registry_is_unknown_error() {
        let client = NpmRegistryClient::new("http://127.0.0.1:9", Duration::from_secs(2));
        let result = client.query("a").await;
        assert!(matches!(result, RegistryQueryResult::UnknownError { .. }));
    }
}
