//! Secure token manager with memory-safe handling and masking capabilities
//!
//! Registry and upload credentials are held as `secrecy` secrets so they do
//! not leak through `Debug` output, and any text headed for the log can be
//! scrubbed of them first.

use regex::{NoExpand, Regex};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

/// Variables holding credentials: CI job, Docker Hub, Modrinth
const TOKEN_VARIABLES: &[&str] = &["CI_JOB_TOKEN", "DOCKER_HUB_TOKEN", "MODRINTH_AUTH"];

/// Secure token manager for registry authentication
///
/// # Examples
///
/// ```
/// use plugin_publisher::security::SecureTokenManager;
/// use std::collections::HashMap;
///
/// let mut env = HashMap::new();
/// env.insert("CI_JOB_TOKEN".to_string(), "job-token-123456".to_string());
///
/// let manager = SecureTokenManager::from_env(&env);
/// assert_eq!(manager.mask_tokens_in_string("token job-token-123456"), "token job...456");
/// ```
#[derive(Debug, Default)]
pub struct SecureTokenManager {
    tokens: Vec<SecretString>,
}

impl SecureTokenManager {
    /// Creates a manager holding every known token present in `env`
    pub fn from_env(env: &HashMap<String, String>) -> Self {
        let tokens = TOKEN_VARIABLES
            .iter()
            .filter_map(|var| env.get(*var))
            .filter(|value| !value.is_empty())
            .map(|value| SecretString::from(value.clone()))
            .collect();

        Self { tokens }
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Tokens shorter than 10 characters are fully masked as "****".
    ///
    /// # Examples
    ///
    /// ```
    /// use plugin_publisher::security::SecureTokenManager;
    ///
    /// assert_eq!(SecureTokenManager::mask_token("abcdef123456"), "abc...456");
    /// assert_eq!(SecureTokenManager::mask_token("short"), "****");
    /// ```
    pub fn mask_token(token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() < 10 {
            return "****".to_string();
        }

        let prefix: String = chars[..3].iter().collect();
        let suffix: String = chars[chars.len() - 3..].iter().collect();
        format!("{}...{}", prefix, suffix)
    }

    /// Masks all known tokens in a string
    pub fn mask_tokens_in_string(&self, text: &str) -> String {
        let mut masked = text.to_string();

        for token in &self.tokens {
            let token_str = token.expose_secret();
            if let Ok(regex) = Regex::new(&regex::escape(token_str)) {
                let masked_token = Self::mask_token(token_str);
                masked = regex
                    .replace_all(&masked, NoExpand(&masked_token))
                    .to_string();
            }
        }

        masked
    }
}
