//! OAuth 2.0 client-credentials tokens and their per-scope cache.
//!
//! # Features
//!
//! - One cached token per requested scope (the default scope is its own key)
//! - Cached tokens are served without a network call until they expire
//! - Concurrent refreshes of the same scope collapse into one token request
//! - Failed acquisitions cache nothing; the next call retries
//!
//! # Example
//!
//! ```rust,ignore
//! use hydra_client::token_cache::TokenCache;
//!
//! let cache = TokenCache::new(&config)?;
//!
//! // First call hits /oauth2/token, second call is served from the cache
//! let token = cache.get_token(Some("hydra.keys.get")).await?;
//! let again = cache.get_token(Some("hydra.keys.get")).await?;
//! ```
//!
//! # Security
//!
//! - The token endpoint is always called with HTTP basic auth using the
//!   client's own credentials, never with a cached bearer token
//! - Client secret and token values are held as `SecretString` and never logged

use crate::clock::{Clock, SystemClock};
use crate::config::HydraConfig;
use crate::error::HydraError;
use crate::secret::{ExposeSecret, SecretString};
use crate::transport::Transport;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, trace, warn};

/// Token endpoint path on the public URL.
pub const TOKEN_PATH: &str = "/oauth2/token";

// =============================================================================
// Token
// =============================================================================

/// An access token issued by the client-credentials grant.
///
/// Immutable: a refresh replaces the whole token.
#[derive(Clone)]
pub struct Token {
    value: SecretString,
    token_type: String,
    scope: Option<String>,
    issued_at: DateTime<Utc>,
    expires_in: u64,
}

impl Token {
    /// Create a token captured at `issued_at` that lives `expires_in` seconds.
    #[must_use]
    pub fn new(
        value: SecretString,
        token_type: impl Into<String>,
        scope: Option<String>,
        issued_at: DateTime<Utc>,
        expires_in: u64,
    ) -> Self {
        Self {
            value,
            token_type: token_type.into(),
            scope,
            issued_at,
            expires_in,
        }
    }

    /// The access token value.
    #[must_use]
    pub fn value(&self) -> &SecretString {
        &self.value
    }

    /// Token type as issued by the server (usually `bearer`).
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Scope granted by the server, if reported.
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Local time the token response was captured.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Lifetime in seconds from `issued_at`.
    #[must_use]
    pub fn expires_in(&self) -> u64 {
        self.expires_in
    }

    /// `issued_at + expires_in`, saturating at the maximum representable time.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = i64::try_from(self.expires_in)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        self.issued_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the token is expired at `now`.
    ///
    /// A token whose remaining lifetime is zero counts as expired, so a
    /// zero-second token is never served.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Whether the token is expired according to the system clock.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// `Authorization` header value, `"{token_type} {value}"`.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.value.expose_secret())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("issued_at", &self.issued_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

// =============================================================================
// OAuth Response Types
// =============================================================================

/// OAuth 2.0 token response.
///
/// `access_token` and `token_type` are required; a missing `expires_in` is
/// treated as zero (the token is never reused) and `scope` is optional.
#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    token_type: String,
    #[serde(default)]
    expires_in: u64,
    #[serde(default)]
    scope: Option<String>,
}

impl fmt::Debug for OAuthTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

impl OAuthTokenResponse {
    fn into_token(self, issued_at: DateTime<Utc>) -> Token {
        Token::new(
            SecretString::from(self.access_token),
            self.token_type,
            self.scope,
            issued_at,
            self.expires_in,
        )
    }
}

// =============================================================================
// Token Cache
// =============================================================================

/// Per-scope slot. Readers share the lock; a refresh holds it exclusively so
/// that callers queued behind it observe the installed token.
type Slot = Arc<RwLock<Option<Token>>>;

/// Client-credentials token cache keyed by requested scope.
pub struct TokenCache {
    transport: Transport,
    client_id: String,
    client_secret: SecretString,
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<Option<String>, Slot>>,
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    /// Create a cache with its own transport and the system clock.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: &HydraConfig) -> Result<Self, HydraError> {
        Ok(Self::with_transport(
            config,
            Transport::new(config)?,
            Arc::new(SystemClock),
        ))
    }

    /// Create a cache over an existing transport and clock.
    #[must_use]
    pub fn with_transport(config: &HydraConfig, transport: Transport, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get a non-expired token for `scope`, acquiring one if needed.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::TokenAcquisition` if the grant request fails or
    /// the response cannot be parsed. Nothing is cached on failure.
    #[instrument(skip(self), fields(scope = scope.unwrap_or("<default>")))]
    pub async fn get_token(&self, scope: Option<&str>) -> Result<Token, HydraError> {
        let slot = self.slot(scope);

        {
            let cached = slot.read().await;
            if let Some(token) = self.fresh(cached.as_ref()) {
                trace!(target: "hydra.token_cache", "Token cache hit");
                return Ok(token);
            }
        }

        let mut cached = slot.write().await;

        // Another caller may have refreshed while we waited for the write lock
        if let Some(token) = self.fresh(cached.as_ref()) {
            trace!(target: "hydra.token_cache", "Token refreshed by concurrent caller");
            return Ok(token);
        }

        let refreshing = cached.is_some();
        *cached = None;

        let token = self.acquire(scope).await?;
        *cached = Some(token.clone());

        if refreshing {
            debug!(target: "hydra.token_cache", client_id = %self.client_id, "Token refreshed successfully");
        } else {
            info!(target: "hydra.token_cache", client_id = %self.client_id, "Token acquired successfully");
        }

        Ok(token)
    }

    /// Drop the cached token for `scope`; the next `get_token` re-acquires.
    pub async fn invalidate(&self, scope: Option<&str>) {
        let slot = self.slot(scope);
        *slot.write().await = None;
        debug!(target: "hydra.token_cache", scope = scope.unwrap_or("<default>"), "Token invalidated");
    }

    /// Drop every cached token.
    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn slot(&self, scope: Option<&str>) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(scope.map(ToString::to_string)).or_default())
    }

    fn fresh(&self, token: Option<&Token>) -> Option<Token> {
        token
            .filter(|token| !token.is_expired_at(self.clock.now()))
            .cloned()
    }

    /// Perform the client-credentials grant.
    #[instrument(skip_all)]
    async fn acquire(&self, scope: Option<&str>) -> Result<Token, HydraError> {
        let url = self.transport.public_url(TOKEN_PATH);

        debug!(
            target: "hydra.token_cache",
            client_id = %self.client_id,
            url = %url,
            "Requesting token from Hydra"
        );

        let mut form_body = vec![("grant_type", "client_credentials")];
        if let Some(scope) = scope {
            form_body.push(("scope", scope));
        }

        let request = self
            .transport
            .http_client()
            .post(&url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&form_body);

        let response = self.transport.send(request).await.map_err(|e| {
            match e.status() {
                Some(400 | 401) => warn!(
                    target: "hydra.token_cache",
                    client_id = %self.client_id,
                    error = %e,
                    "Authentication rejected by Hydra"
                ),
                _ => warn!(
                    target: "hydra.token_cache",
                    client_id = %self.client_id,
                    error = %e,
                    "Token request failed"
                ),
            }
            HydraError::TokenAcquisition(e.to_string())
        })?;

        let issued_at = self.clock.now();
        let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
            warn!(target: "hydra.token_cache", error = %e, "Failed to parse token response");
            HydraError::TokenAcquisition(format!("Invalid token response: {e}"))
        })?;

        debug!(
            target: "hydra.token_cache",
            expires_in_secs = token_response.expires_in,
            "Token response received"
        );

        Ok(token_response.into_token(issued_at))
    }
}

// =============================================================================
// Tests
// =============================================================================
