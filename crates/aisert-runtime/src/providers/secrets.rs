//! Secure credential handling for the HTTP count-tokens providers.
//!
//! Keys are wrapped in [`SecretString`] as soon as they are read, so they
//! cannot show up in `Debug`/`Display` output or in log fields.
//!
//! ## Usage
//!
//! ```ignore
//! let cred = ApiCredential::from_env_any(&["GEMINI_API_KEY", "GOOGLE_API_KEY"], "Google API key")?;
//! request.header("x-goog-api-key", cred.expose());
//! ```

use aisert_core::BackendError;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from an environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API key.
///
/// `Debug` and `Display` show `[REDACTED]`. The value is only reachable
/// through [`expose`](Self::expose), which should be called at the point
/// where a request header is set.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load from an environment variable.
    ///
    /// # Arguments
    /// * `env_var` - Name of the environment variable
    /// * `name` - Human-readable name for error messages (e.g., "Anthropic API key")
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, BackendError> {
        Self::from_env_any(&[env_var], name)
    }

    /// Load from the first non-empty variable in `env_vars`.
    pub fn from_env_any(env_vars: &[&str], name: &'static str) -> Result<Self, BackendError> {
        env_vars
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .map(|value| Self::new(value, CredentialSource::Environment, name))
            .ok_or_else(|| {
                BackendError::NotConfigured(format!(
                    "{} not set: configure one of {:?}",
                    name, env_vars
                ))
            })
    }

    /// Expose the key for use in a request.
    ///
    /// Never store the returned value.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_redacted_in_debug() {
        let secret = "sk-ant-super-secret-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Programmatic, "Anthropic API key");

        let debug = format!("{:?}", cred);
        assert!(!debug.contains(secret), "Secret exposed in Debug!");
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_credential_redacted_in_display() {
        let secret = "AIza-super-secret-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Environment, "Google API key");

        let display = format!("{}", cred);
        assert!(!display.contains(secret), "Secret exposed in Display!");
        assert!(display.contains("Google API key"));
        assert!(display.contains("environment"));
    }

    #[test]
    fn test_credential_expose() {
        let cred = ApiCredential::new("key-1", CredentialSource::Programmatic, "Test");
        assert_eq!(cred.expose(), "key-1");
        assert_eq!(cred.source(), CredentialSource::Programmatic);
    }

    #[test]
    fn test_missing_env_is_not_configured() {
        let err = ApiCredential::from_env_any(
            &["AISERT_TEST_SURELY_UNSET_A", "AISERT_TEST_SURELY_UNSET_B"],
            "Test key",
        )
        .unwrap_err();
        assert!(err.is_misuse());
        assert!(err.to_string().contains("AISERT_TEST_SURELY_UNSET_B"));
    }
}
