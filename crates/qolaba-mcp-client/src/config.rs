//! Client configuration.
//!
//! Values are sourced from `QOLABA_*` environment variables via
//! [`ClientConfig::from_env`], or constructed directly for tests and
//! embedding. Exactly one authentication mode is expected: a static API key,
//! or OAuth client credentials (client id + secret + token URL).

use crate::auth::Credential;
use crate::error::{ApiClientError, ClientResult};
use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of physical attempts per logical call (1 + 3 retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Resolved authentication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    ApiKey,
    OAuth,
    None,
}

/// Configuration for [`crate::ApiClient`].
#[derive(Clone, Default)]
pub struct ClientConfig {
    /// Base URL for the Qolaba API (e.g. `https://api.qolaba.ai`).
    pub base_url: Option<String>,

    /// Static API key.
    pub api_key: Option<String>,

    /// OAuth client id.
    pub client_id: Option<String>,
    /// OAuth client secret.
    pub client_secret: Option<String>,
    /// OAuth token endpoint URL.
    pub token_url: Option<String>,
    /// OAuth scope(s), if required.
    pub scope: Option<String>,

    /// Per-request timeout. `None` means [`DEFAULT_REQUEST_TIMEOUT`].
    pub request_timeout: Option<Duration>,
    /// Verify TLS certificates. `None` means true.
    pub verify_tls: Option<bool>,
    /// HTTP proxy URL.
    pub http_proxy: Option<String>,
    /// HTTPS proxy URL.
    pub https_proxy: Option<String>,

    /// Physical attempts per logical call. `None` means [`DEFAULT_MAX_ATTEMPTS`].
    pub max_attempts: Option<u32>,
}

impl ClientConfig {
    /// Load configuration from `QOLABA_*` environment variables.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        Self {
            base_url: var("QOLABA_API_BASE_URL"),
            api_key: var("QOLABA_API_KEY"),
            client_id: var("QOLABA_CLIENT_ID"),
            client_secret: var("QOLABA_CLIENT_SECRET"),
            token_url: var("QOLABA_TOKEN_URL"),
            scope: var("QOLABA_SCOPE"),
            request_timeout: var("QOLABA_REQUEST_TIMEOUT")
                .and_then(|v| v.parse::<f64>().ok())
                .map(Duration::from_secs_f64),
            verify_tls: var("QOLABA_VERIFY_SSL").map(|v| v != "false" && v != "0"),
            http_proxy: var("QOLABA_HTTP_PROXY"),
            https_proxy: var("QOLABA_HTTPS_PROXY"),
            max_attempts: var("QOLABA_MAX_ATTEMPTS").and_then(|v| v.parse().ok()),
        }
    }

    /// The authentication mode this configuration resolves to.
    ///
    /// OAuth wins when the full credential triple is present; otherwise a
    /// non-empty API key selects bearer-key auth.
    pub fn auth_mode(&self) -> AuthMode {
        if self.client_id.is_some() && self.client_secret.is_some() && self.token_url.is_some() {
            AuthMode::OAuth
        } else if self.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            AuthMode::ApiKey
        } else {
            AuthMode::None
        }
    }

    /// Build the immutable credential for a client instance.
    ///
    /// Returns `Ok(None)` when no authentication is configured (allowed for
    /// local development against unauthenticated endpoints).
    pub fn credential(&self) -> ClientResult<Option<Credential>> {
        if self.api_key.is_some() && self.auth_mode() == AuthMode::OAuth {
            return Err(ApiClientError::config(
                "both API key and OAuth credentials are configured; provide only one",
            ));
        }

        match self.auth_mode() {
            AuthMode::ApiKey => Ok(Some(Credential::ApiKey {
                secret: self.api_key.clone().unwrap_or_default(),
            })),
            AuthMode::OAuth => {
                let token_url = self.token_url.clone().unwrap_or_default();
                url::Url::parse(&token_url)?;
                Ok(Some(Credential::OAuth {
                    client_id: self.client_id.clone().unwrap_or_default(),
                    client_secret: self.client_secret.clone().unwrap_or_default(),
                    token_url,
                    scope: self.scope.clone(),
                }))
            }
            AuthMode::None => Ok(None),
        }
    }

    /// Validate URLs and auth consistency. Surfaces misconfiguration at
    /// startup instead of deep inside a call.
    pub fn validate(&self) -> ClientResult<()> {
        if let Some(base) = &self.base_url {
            url::Url::parse(base)?;
        }
        self.credential().map(|_| ())
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls.unwrap_or(true)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1)
    }
}

// Secrets are masked; this is the only way the config reaches logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mask(value: &Option<String>) -> &'static str {
            match value {
                Some(_) => "********",
                None => "<unset>",
            }
        }

        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &mask(&self.api_key))
            .field("client_id", &self.client_id)
            .field("client_secret", &mask(&self.client_secret))
            .field("token_url", &self.token_url)
            .field("scope", &self.scope)
            .field("request_timeout", &self.request_timeout())
            .field("verify_tls", &self.verify_tls())
            .field("http_proxy", &self.http_proxy)
            .field("https_proxy", &self.https_proxy)
            .field("max_attempts", &self.max_attempts())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth_config() -> ClientConfig {
        ClientConfig {
            client_id: Some("cid".into()),
            client_secret: Some("secret".into()),
            token_url: Some("https://auth.example.com/token".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_auth_mode_api_key() {
        let config = ClientConfig {
            api_key: Some("k".into()),
            ..Default::default()
        };
        assert_eq!(config.auth_mode(), AuthMode::ApiKey);
    }

    #[test]
    fn test_auth_mode_oauth_wins_over_partial_key() {
        assert_eq!(oauth_config().auth_mode(), AuthMode::OAuth);
    }

    #[test]
    fn test_auth_mode_none() {
        assert_eq!(ClientConfig::default().auth_mode(), AuthMode::None);
    }

    #[test]
    fn test_both_auth_modes_rejected() {
        let mut config = oauth_config();
        config.api_key = Some("k".into());
        assert!(config.credential().is_err());
    }

    #[test]
    fn test_invalid_token_url_rejected() {
        let mut config = oauth_config();
        config.token_url = Some("not a url".into());
        assert!(config.credential().is_err());
    }

    #[test]
    fn test_debug_masks_secrets() {
        let mut config = oauth_config();
        config.api_key = None;
        config.client_secret = Some("hunter2".into());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("********"));
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert!(config.verify_tls());
        assert_eq!(config.max_attempts(), DEFAULT_MAX_ATTEMPTS);
    }
}
