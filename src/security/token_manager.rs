//! Secure token manager with memory-safe handling and masking capabilities
//!
//! Tokens for the dispatch target and the registry are held as
//! `secrecy::SecretString` so they never end up in `Debug` output or logs.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

/// Token purposes with their environment variable names
const TOKEN_VARIABLES: &[(&str, &str)] = &[
    ("dispatch", "DISPATCH_GITHUB_TOKEN"),
    ("registry", "NPM_TOKEN"),
];

/// Purpose key of the dispatch token
pub const DISPATCH_TOKEN: &str = "dispatch";

/// Purpose key of the registry read token
pub const REGISTRY_TOKEN: &str = "registry";

/// Secure token manager for publish credentials
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use workspace_publisher::security::SecureTokenManager;
///
/// let mut env = HashMap::new();
/// env.insert("DISPATCH_GITHUB_TOKEN".to_string(), "ghp_0123456789".to_string());
///
/// let manager = SecureTokenManager::new(env);
/// assert!(manager.has_token("dispatch"));
/// assert!(!manager.has_token("registry"));
/// ```
#[derive(Default)]
pub struct SecureTokenManager {
    token_map: HashMap<String, String>,
    env: HashMap<String, String>,
}

impl SecureTokenManager {
    /// Creates a manager reading tokens from the given environment map
    pub fn new(env: HashMap<String, String>) -> Self {
        let token_map = TOKEN_VARIABLES
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self { token_map, env }
    }

    /// Creates a manager over the current process environment
    pub fn from_process_env() -> Self {
        Self::new(std::env::vars().collect())
    }

    /// Retrieves a token for the given purpose
    ///
    /// Returns `None` if the purpose is unknown or the variable is unset or empty.
    pub fn get_token(&self, purpose: &str) -> Option<SecretString> {
        let token_name = self.token_map.get(purpose)?;
        let token_value = self.env.get(token_name)?.trim();
        if token_value.is_empty() {
            return None;
        }
        Some(SecretString::new(token_value.to_string().into()))
    }

    pub fn has_token(&self, purpose: &str) -> bool {
        self.get_token(purpose).is_some()
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Tokens shorter than 10 characters are fully masked as "****".
    ///
    /// # Examples
    ///
    /// ```
    /// use workspace_publisher::security::SecureTokenManager;
    ///
    /// assert_eq!(SecureTokenManager::mask_token("abcdef123456"), "abc...456");
    /// assert_eq!(SecureTokenManager::mask_token("short"), "****");
    /// ```
    pub fn mask_token(token: &str) -> String {
        if token.chars().count() < 10 {
            return "****".to_string();
        }

        let chars: Vec<char> = token.chars().collect();
        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 3..].iter().collect();
        format!("{}...{}", prefix, suffix)
    }

    /// Masks all known tokens in a string
    pub fn mask_tokens_in_string(&self, text: &str) -> String {
        let mut masked = text.to_string();

        for purpose in self.token_map.keys() {
            if let Some(token) = self.get_token(purpose) {
                let token_str = token.expose_secret();
                if let Ok(regex) = Regex::new(&regex::escape(token_str)) {
                    let masked_token = Self::mask_token(token_str);
                    masked = regex.replace_all(&masked, masked_token.as_str()).to_string();
                }
            }
        }

        masked
    }
}
