//! OAuth bearer token acquisition and caching.
//!
//! Tokens come from the identity endpoint at `{OHIP_HOST}/oauth/v1/tokens`
//! using the client-credentials grant. The identity endpoint also expects the
//! OHIP application headers (`x-app-key`, `enterpriseId`, `HashedAppKey`), so
//! token requests go through the same middleware client as API calls. The
//! response is parsed leniently: only `access_token` is required.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, TimeDelta, Utc};
use http::{HeaderMap, header::ACCEPT};
use oauth2::{AccessToken, Scope, TokenUrl, basic::BasicErrorResponse};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::mcp::{config::OhipConfig, error::OhipError};

/// Lifetime assumed when the identity endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// An issued bearer token. Never mutated; a refresh replaces it.
#[derive(Clone)]
pub struct BearerToken {
    access_token: AccessToken,
    expires_at: Instant,
    expires_at_utc: Option<DateTime<Utc>>,
}

impl BearerToken {
    fn new(access_token: AccessToken, lifetime: Duration) -> Self {
        let now = Instant::now();
        Self {
            access_token,
            expires_at: now.checked_add(lifetime).unwrap_or(now),
            expires_at_utc: TimeDelta::from_std(lifetime)
                .ok()
                .and_then(|delta| Utc::now().checked_add_signed(delta)),
        }
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        self.access_token.secret()
    }

    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at_utc
    }

    /// Whether the token can still be used, treating it as expired `skew`
    /// before its real expiry.
    #[must_use]
    pub fn is_fresh(&self, skew: Duration) -> bool {
        self.expires_at
            .checked_sub(skew)
            .is_some_and(|deadline| Instant::now() < deadline)
    }

    /// Leading characters of the token, safe to show in diagnostics.
    #[must_use]
    pub fn preview(&self) -> String {
        let secret = self.secret();
        if secret.chars().count() > 20 {
            format!("{}...", secret.chars().take(20).collect::<String>())
        } else {
            secret.to_string()
        }
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("access_token", &self.access_token)
            .field("expires_at", &self.expires_at_utc)
            .finish()
    }
}

/// Owns the cached bearer token. All reads and replacements go through here.
pub struct TokenManager {
    config: Arc<OhipConfig>,
    http: ClientWithMiddleware,
    app_headers: HeaderMap,
    cached: Mutex<Option<Arc<BearerToken>>>,
}

impl TokenManager {
    pub fn new(config: Arc<OhipConfig>, http: ClientWithMiddleware, app_headers: HeaderMap) -> Self {
        Self {
            config,
            http,
            app_headers,
            cached: Mutex::new(None),
        }
    }

    /// Returns a usable token, requesting a new one if none is cached or the
    /// cached one has expired.
    pub async fn token(&self) -> Result<Arc<BearerToken>, OhipError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(self.config.refresh_skew)) {
            debug!("Using cached access token");
            return Ok(Arc::clone(token));
        }

        let token = Arc::new(self.request_token().await?);
        *cached = Some(Arc::clone(&token));
        Ok(token)
    }

    /// Replaces a token the API rejected. If the cache already holds a
    /// different, still fresh token, that one is returned without a request.
    pub async fn refresh_rejected(&self, rejected: &BearerToken) -> Result<Arc<BearerToken>, OhipError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached
            .as_ref()
            .filter(|t| t.secret() != rejected.secret() && t.is_fresh(self.config.refresh_skew))
        {
            return Ok(Arc::clone(token));
        }

        *cached = None;
        info!("Access token was rejected, requesting a new one");
        let token = Arc::new(self.request_token().await?);
        *cached = Some(Arc::clone(&token));
        Ok(token)
    }

    /// Drops the cached token; the next `token()` call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
        info!("Token cache cleared");
    }

    pub async fn current(&self) -> Option<Arc<BearerToken>> {
        self.cached.lock().await.clone()
    }

    async fn request_token(&self) -> Result<BearerToken, OhipError> {
        let token_url = TokenUrl::new(format!("{}/oauth/v1/tokens", self.config.host))
            .map_err(|e| OhipError::MissingConfig(format!("invalid token URL: {e}")))?;
        let scope = Scope::new(self.config.token_scope.clone());
        info!(url = %token_url.as_str(), "Requesting new access token");

        let response = self
            .http
            .post(token_url.as_str())
            .headers(self.app_headers.clone())
            .header(ACCEPT, "application/json")
            .basic_auth(&self.config.client_id, Some(self.config.client_secret.secret()))
            .form(&[
                ("grant_type", "client_credentials"),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| token_failure(format!("identity endpoint request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| token_failure(format!("identity endpoint request failed: {e}")))?;

        if !status.is_success() {
            let reason = serde_json::from_str::<BasicErrorResponse>(&body)
                .map_or_else(|_| body.clone(), |error| error.to_string());
            return Err(token_failure(format!(
                "identity endpoint rejected the request ({status}): {reason}"
            )));
        }

        let grant: TokenGrant = serde_json::from_str(&body)
            .map_err(|e| token_failure(format!("malformed token response: {e}")))?;
        if grant.access_token.secret().is_empty() {
            return Err(token_failure(
                "identity endpoint returned an empty access token".to_string(),
            ));
        }
        if !grant.token_type.eq_ignore_ascii_case("bearer") {
            warn!(token_type = %grant.token_type, "Unexpected token type, using it as a bearer token");
        }

        let lifetime = grant.expires_in.map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);
        info!(expires_in_secs = lifetime.as_secs(), "Obtained access token");
        Ok(BearerToken::new(grant.access_token, lifetime))
    }
}

/// Token endpoint success body. Only `access_token` is required; the identity
/// endpoint may omit `token_type` and `expires_in`.
#[derive(Deserialize)]
struct TokenGrant {
    access_token: AccessToken,
    #[serde(default = "bearer")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

fn bearer() -> String {
    "Bearer".to_string()
}

fn token_failure(reason: String) -> OhipError {
    warn!(%reason, "OAuth token request failed");
    OhipError::Authentication(reason)
}
