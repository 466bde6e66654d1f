//! Login/consent admin API.
//!
//! [`ConsentFlowClient`] exposes each step of Hydra's login and consent flow
//! as one authenticated call. It keeps no state between calls: Hydra owns the
//! flow and rejects out-of-order transitions itself.
//!
//! The URL shape of the flow endpoints changed between Hydra releases and is
//! picked explicitly through [`AdminApiStyle`]:
//!
//! | Style | Fetch | Accept |
//! |---|---|---|
//! | `PathSegment` | `GET /oauth2/auth/requests/login/{challenge}` | `PUT .../login/{challenge}/accept` |
//! | `QueryParameter` | `GET /oauth2/auth/requests/login?login_challenge=` | `PUT .../login/accept?login_challenge=` |

use crate::config::{AdminApiStyle, HydraConfig};
use crate::error::HydraError;
use crate::secret::{ExposeSecret, SecretString};
use crate::token_cache::TokenCache;
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

const SESSIONS_PATH: &str = "/oauth2/auth/sessions";

// =============================================================================
// Wire Types
// =============================================================================

/// Pending login request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Challenge this request was fetched with.
    #[serde(default)]
    pub challenge: Option<String>,
    /// Whether Hydra already authenticated the subject and the UI may be skipped.
    #[serde(default)]
    pub skip: bool,
    /// Subject of a remembered session, empty otherwise.
    #[serde(default)]
    pub subject: String,
    /// Scopes the relying party asked for.
    #[serde(default)]
    pub requested_scope: Vec<String>,
    /// Original authorization URL.
    #[serde(default)]
    pub request_url: Option<String>,
    /// The requesting OAuth2 client, as sent by Hydra.
    #[serde(default)]
    pub client: Option<Value>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Pending consent request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentRequest {
    /// Challenge this request was fetched with.
    #[serde(default)]
    pub challenge: Option<String>,
    /// Whether consent was remembered and the UI may be skipped.
    #[serde(default)]
    pub skip: bool,
    /// Authenticated end user.
    #[serde(default)]
    pub subject: String,
    /// Scopes the relying party asked for.
    #[serde(default)]
    pub requested_scope: Vec<String>,
    /// Audiences the relying party asked for.
    #[serde(default)]
    pub requested_access_token_audience: Vec<String>,
    /// Original authorization URL.
    #[serde(default)]
    pub request_url: Option<String>,
    /// The requesting OAuth2 client, as sent by Hydra.
    #[serde(default)]
    pub client: Option<Value>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of an accepted login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcceptLoginRequest {
    /// Authenticated end-user identifier.
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remember: Option<bool>,
    /// Seconds to remember the login; 0 means forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remember_for: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AcceptLoginRequest {
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }
}

/// Session claims attached to tokens issued after consent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsentSession {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub access_token: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub id_token: Map<String, Value>,
}

/// Body of an accepted consent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcceptConsentRequest {
    pub grant_scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grant_access_token_audience: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remember: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remember_for: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<ConsentSession>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AcceptConsentRequest {
    #[must_use]
    pub fn new(grant_scope: Vec<String>) -> Self {
        Self {
            grant_scope,
            ..Self::default()
        }
    }
}

/// Body of a rejected login or consent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RejectRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_debug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl RejectRequest {
    #[must_use]
    pub fn new(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            error_description: Some(description.into()),
            ..Self::default()
        }
    }
}

/// Where to send the user agent after an accept or reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedRequest {
    pub redirect_to: String,
}

/// Introspection result. Only `active` is guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenIntrospection {
    /// Whether the token is currently valid.
    pub active: bool,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Client the token was issued to.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Subject the token was issued for.
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiry, seconds since the epoch.
    #[serde(default)]
    pub exp: Option<i64>,
    /// Issue time, seconds since the epoch.
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Fields not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize)]
struct FlushInactiveTokens {
    #[serde(rename = "notAfter", skip_serializing_if = "Option::is_none")]
    not_after: Option<DateTime<Utc>>,
}

/// Which side of the flow a challenge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowKind {
    Login,
    Consent,
}

impl FlowKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Consent => "consent",
        }
    }

    fn query_key(self) -> &'static str {
        match self {
            Self::Login => "login_challenge",
            Self::Consent => "consent_challenge",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Consent Flow Client
// =============================================================================

/// Stateless client for the login/consent admin API.
pub struct ConsentFlowClient {
    transport: Transport,
    tokens: Arc<TokenCache>,
    style: AdminApiStyle,
    client_id: String,
    client_secret: SecretString,
}

impl fmt::Debug for ConsentFlowClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsentFlowClient")
            .field("style", &self.style)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ConsentFlowClient {
    /// Create a client sharing `transport` and `tokens`.
    ///
    /// The client credentials are only used for token revocation, which Hydra
    /// authenticates with basic auth.
    #[must_use]
    pub fn new(config: &HydraConfig, transport: Transport, tokens: Arc<TokenCache>) -> Self {
        Self {
            transport,
            tokens,
            style: config.admin_api_style,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    /// URL shape used for flow requests.
    #[must_use]
    pub fn style(&self) -> AdminApiStyle {
        self.style
    }

    // -------------------------------------------------------------------------
    // Login
    // -------------------------------------------------------------------------

    /// Fetch the login request behind `challenge`.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::Transport` if Hydra rejects the call,
    /// `HydraError::TokenAcquisition` if no admin token could be obtained,
    /// `HydraError::InvalidResponse` if the body cannot be parsed and
    /// `HydraError::InvalidArgument` if a path-segment challenge is `.` or `..`.
    #[instrument(skip_all)]
    pub async fn get_login_request(&self, challenge: &str) -> Result<LoginRequest, HydraError> {
        let request = self.flow_request(Method::GET, FlowKind::Login, challenge, None)?;
        self.call(request).await
    }

    /// Accept the login request behind `challenge`.
    ///
    /// # Errors
    ///
    /// See [`ConsentFlowClient::get_login_request`].
    #[instrument(skip_all)]
    pub async fn accept_login_request(
        &self,
        challenge: &str,
        body: &AcceptLoginRequest,
    ) -> Result<CompletedRequest, HydraError> {
        let request = self
            .flow_request(Method::PUT, FlowKind::Login, challenge, Some("accept"))?
            .json(body);
        self.call(request).await
    }

    /// Reject the login request behind `challenge`.
    ///
    /// # Errors
    ///
    /// See [`ConsentFlowClient::get_login_request`].
    #[instrument(skip_all)]
    pub async fn reject_login_request(
        &self,
        challenge: &str,
        body: &RejectRequest,
    ) -> Result<CompletedRequest, HydraError> {
        let request = self
            .flow_request(Method::PUT, FlowKind::Login, challenge, Some("reject"))?
            .json(body);
        self.call(request).await
    }

    // -------------------------------------------------------------------------
    // Consent
    // -------------------------------------------------------------------------

    /// Fetch the consent request behind `challenge`.
    ///
    /// # Errors
    ///
    /// See [`ConsentFlowClient::get_login_request`].
    #[instrument(skip_all)]
    pub async fn get_consent_request(&self, challenge: &str) -> Result<ConsentRequest, HydraError> {
        let request = self.flow_request(Method::GET, FlowKind::Consent, challenge, None)?;
        self.call(request).await
    }

    /// Accept the consent request behind `challenge`.
    ///
    /// # Errors
    ///
    /// See [`ConsentFlowClient::get_login_request`].
    #[instrument(skip_all)]
    pub async fn accept_consent_request(
        &self,
        challenge: &str,
        body: &AcceptConsentRequest,
    ) -> Result<CompletedRequest, HydraError> {
        let request = self
            .flow_request(Method::PUT, FlowKind::Consent, challenge, Some("accept"))?
            .json(body);
        self.call(request).await
    }

    /// Reject the consent request behind `challenge`.
    ///
    /// # Errors
    ///
    /// See [`ConsentFlowClient::get_login_request`].
    #[instrument(skip_all)]
    pub async fn reject_consent_request(
        &self,
        challenge: &str,
        body: &RejectRequest,
    ) -> Result<CompletedRequest, HydraError> {
        let request = self
            .flow_request(Method::PUT, FlowKind::Consent, challenge, Some("reject"))?
            .json(body);
        self.call(request).await
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    /// Revoke consent sessions, for one client or all.
    ///
    /// `subject` narrows the call to one end user; `None` targets the bare
    /// collection endpoint and leaves the scope of revocation to Hydra.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::Transport` if Hydra rejects the call,
    /// `HydraError::TokenAcquisition` if no admin token could be obtained and
    /// `HydraError::InvalidArgument` if `subject` is `.` or `..`.
    #[instrument(skip(self))]
    pub async fn revoke_consent_sessions(
        &self,
        subject: Option<&str>,
        client: Option<&str>,
    ) -> Result<(), HydraError> {
        let url = self.session_endpoint(FlowKind::Consent, subject)?;
        let mut request = self.transport.http_client().delete(url);
        if let Some(client) = client {
            request = request.query(&[("client", client)]);
        }
        self.call_without_body(request).await
    }

    /// Revoke login sessions, of `subject` when given.
    ///
    /// # Errors
    ///
    /// See [`ConsentFlowClient::revoke_consent_sessions`].
    #[instrument(skip(self))]
    pub async fn revoke_login_sessions(&self, subject: Option<&str>) -> Result<(), HydraError> {
        let url = self.session_endpoint(FlowKind::Login, subject)?;
        self.call_without_body(self.transport.http_client().delete(url))
            .await
    }

    /// Revoke the current login session (browser logout endpoint).
    ///
    /// # Errors
    ///
    /// See [`ConsentFlowClient::revoke_consent_sessions`].
    #[instrument(skip_all)]
    pub async fn logout(&self) -> Result<(), HydraError> {
        let url = self
            .transport
            .public_url(&format!("{SESSIONS_PATH}/login/revoke"));
        self.call_without_body(self.transport.http_client().get(url))
            .await
    }

    // -------------------------------------------------------------------------
    // Tokens
    // -------------------------------------------------------------------------

    /// Introspect an access or refresh token.
    ///
    /// # Errors
    ///
    /// See [`ConsentFlowClient::get_login_request`].
    #[instrument(skip_all)]
    pub async fn introspect_token(
        &self,
        token: &SecretString,
    ) -> Result<TokenIntrospection, HydraError> {
        let request = self
            .transport
            .http_client()
            .post(self.transport.admin_url("/oauth2/introspect"))
            .form(&[("token", token.expose_secret())]);
        self.call(request).await
    }

    /// Revoke a token.
    ///
    /// Authenticated with the client's own credentials rather than a bearer
    /// token.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::Transport` if Hydra rejects the call.
    #[instrument(skip_all)]
    pub async fn revoke_token(&self, token: &SecretString) -> Result<(), HydraError> {
        let request = self
            .transport
            .http_client()
            .post(self.transport.public_url("/oauth2/revoke"))
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[("token", token.expose_secret())]);
        self.transport.send(request).await?;
        debug!(target: "hydra.consent", "Token revoked");
        Ok(())
    }

    /// Remove inactive tokens, optionally only those expired before `not_after`.
    ///
    /// # Errors
    ///
    /// See [`ConsentFlowClient::revoke_consent_sessions`].
    #[instrument(skip(self))]
    pub async fn flush_inactive_tokens(
        &self,
        not_after: Option<DateTime<Utc>>,
    ) -> Result<(), HydraError> {
        let request = self
            .transport
            .http_client()
            .post(self.transport.admin_url("/oauth2/flush"))
            .json(&FlushInactiveTokens { not_after });
        self.call_without_body(request).await
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn flow_request(
        &self,
        method: Method,
        kind: FlowKind,
        challenge: &str,
        action: Option<&str>,
    ) -> Result<RequestBuilder, HydraError> {
        let mut segments = vec!["oauth2", "auth", "requests", kind.as_str()];
        let request = match self.style {
            AdminApiStyle::PathSegment => {
                segments.push(challenge);
                segments.extend(action);
                let url = self.transport.admin_endpoint(&segments)?;
                self.transport.http_client().request(method, url)
            }
            AdminApiStyle::QueryParameter => {
                segments.extend(action);
                let url = self.transport.admin_endpoint(&segments)?;
                self.transport
                    .http_client()
                    .request(method, url)
                    .query(&[(kind.query_key(), challenge)])
            }
        };
        Ok(request)
    }

    fn session_endpoint(&self, kind: FlowKind, subject: Option<&str>) -> Result<Url, HydraError> {
        let mut segments = vec!["oauth2", "auth", "sessions", kind.as_str()];
        segments.extend(subject);
        self.transport.admin_endpoint(&segments)
    }

    async fn authorized_send(&self, request: RequestBuilder) -> Result<reqwest::Response, HydraError> {
        let token = self.tokens.get_token(None).await?;
        let request = Transport::authorize(request, &token)?;
        self.transport.send(request).await.inspect_err(|e| {
            debug!(target: "hydra.consent", error = %e, "Admin request failed");
        })
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, HydraError> {
        let response = self.authorized_send(request).await?;
        Transport::json(response).await
    }

    async fn call_without_body(&self, request: RequestBuilder) -> Result<(), HydraError> {
        self.authorized_send(request).await?;
        Ok(())
    }
}
