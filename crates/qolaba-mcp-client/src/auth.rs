//! Authentication state.
//!
//! Two mutually exclusive modes, fixed at client construction: a static
//! bearer key, or OAuth2 client credentials with a cached, proactively
//! refreshed access token. The cached token lives in a shared slot; a
//! refresh replaces it whole or not at all.

use crate::error::{ApiClientError, ClientResult};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;

/// Tokens within this margin of expiry are refreshed proactively.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

/// Fallback lifetime when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Credential for a client instance. Chosen once from configuration; the
/// variant never changes at runtime.
#[derive(Clone)]
pub enum Credential {
    ApiKey {
        secret: String,
    },
    OAuth {
        client_id: String,
        client_secret: String,
        token_url: String,
        scope: Option<String>,
    },
}

impl Credential {
    pub fn is_oauth(&self) -> bool {
        matches!(self, Credential::OAuth { .. })
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ApiKey { .. } => f.debug_struct("ApiKey").finish_non_exhaustive(),
            Credential::OAuth {
                client_id,
                token_url,
                scope,
                ..
            } => f
                .debug_struct("OAuth")
                .field("client_id", client_id)
                .field("token_url", token_url)
                .field("scope", scope)
                .finish_non_exhaustive(),
        }
    }
}

/// A cached OAuth access token with its absolute expiry.
#[derive(Debug, Clone)]
pub struct OAuthToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl OAuthToken {
    /// Whether the token should be considered expired at `now`.
    ///
    /// True within [`EXPIRY_MARGIN_SECS`] of the actual expiry.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

/// Shared slot holding the cached token for one client instance.
///
/// Concurrent callers that observe an expired token each run their own
/// refresh and overwrite the slot; the token endpoint is idempotent and
/// low-frequency, so the redundancy is tolerated over a single-flight lock.
#[derive(Debug, Default)]
pub struct TokenSlot {
    inner: RwLock<Option<OAuthToken>>,
}

impl TokenSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current token.
    pub async fn get(&self) -> Option<OAuthToken> {
        self.inner.read().await.clone()
    }

    /// True if no token is cached or the cached token is expired at `now`.
    pub async fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.inner.read().await.as_ref() {
            Some(token) => token.is_expired_at(now),
            None => true,
        }
    }

    /// Replace the cached token atomically.
    pub async fn replace(&self, token: OAuthToken) {
        *self.inner.write().await = Some(token);
    }

    /// Drop the cached token.
    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

/// Wire shape of the token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Fetch a fresh access token via the client-credentials grant.
///
/// Returns the new token without touching any shared state; the caller
/// installs it into the [`TokenSlot`], so a failed refresh leaves the
/// previous token in place untouched.
pub async fn refresh_token(
    http: &reqwest::Client,
    credential: &Credential,
) -> ClientResult<OAuthToken> {
    let Credential::OAuth {
        client_id,
        client_secret,
        token_url,
        scope,
    } = credential
    else {
        return Err(ApiClientError::authentication(
            "OAuth credentials not configured",
        ));
    };

    let mut form: Vec<(&str, &str)> = vec![
        ("grant_type", "client_credentials"),
        ("client_id", client_id.as_str()),
        ("client_secret", client_secret.as_str()),
    ];
    if let Some(scope) = scope {
        form.push(("scope", scope.as_str()));
    }

    let response = http
        .post(token_url)
        .form(&form)
        .send()
        .await
        .map_err(|e| ApiClientError::authentication(format!("OAuth token request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiClientError::authentication_with_status(
            format!("OAuth token refresh failed: {status}: {body}"),
            status.as_u16(),
        ));
    }

    let payload: TokenResponse = response.json().await.map_err(|e| {
        ApiClientError::authentication(format!("Invalid OAuth token response: {e}"))
    })?;

    let access_token = payload.access_token.ok_or_else(|| {
        ApiClientError::authentication("OAuth token response missing access_token")
    })?;
    let expires_in = payload.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);

    info!(
        expires_in,
        token_type = payload.token_type.as_deref().unwrap_or("bearer"),
        "OAuth token refreshed"
    );

    Ok(OAuthToken {
        access_token,
        expires_at: Utc::now() + ChronoDuration::seconds(expires_in),
    })
}

/// Render the `Authorization` header value for a bearer credential.
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_expiring_in(secs: i64) -> OAuthToken {
        OAuthToken {
            access_token: "abc".into(),
            expires_at: Utc::now() + ChronoDuration::seconds(secs),
        }
    }

    #[test]
    fn test_expired_token_is_expired() {
        let token = token_expiring_in(-1);
        assert!(token.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_fresh_token_is_not_expired() {
        let token = token_expiring_in(3600);
        assert!(!token.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_token_within_margin_is_expired() {
        let token = token_expiring_in(200);
        assert!(token.is_expired_at(Utc::now()));
    }

    #[tokio::test]
    async fn test_empty_slot_is_expired() {
        let slot = TokenSlot::new();
        assert!(slot.is_expired(Utc::now()).await);
    }

    #[tokio::test]
    async fn test_replace_and_clear() {
        let slot = TokenSlot::new();
        slot.replace(token_expiring_in(3600)).await;
        assert!(!slot.is_expired(Utc::now()).await);
        assert_eq!(slot.get().await.unwrap().access_token, "abc");

        slot.clear().await;
        assert!(slot.get().await.is_none());
    }

    #[test]
    fn test_bearer_header() {
        assert_eq!(bearer("k"), "Bearer k");
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let cred = Credential::OAuth {
            client_id: "cid".into(),
            client_secret: "hunter2".into(),
            token_url: "https://auth.example.com/token".into(),
            scope: None,
        };
        let rendered = format!("{:?}", cred);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("cid"));
    }
}
