//! HTTP transport shared by every Hydra component.
//!
//! Wraps a single `reqwest::Client` (timeouts applied once, at build time)
//! together with the public and admin base URLs. All components funnel their
//! calls through [`Transport::send`], which turns connection failures and
//! non-success statuses into [`HydraError::Transport`].
//!
//! # Security
//!
//! - Error bodies are sanitized before they reach an error message: bearer
//!   tokens and JWTs are replaced and long bodies truncated
//! - Authorization header values are marked sensitive
//! - Caller-supplied path values (subjects, challenges, client ids, key
//!   names) are percent-encoded as single path segments

use crate::config::{HydraConfig, DEFAULT_CONNECT_TIMEOUT};
use crate::error::HydraError;
use crate::token_cache::Token;
use regex::Regex;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use tracing::{debug, trace, warn};

/// Maximum length for error body in error messages.
const MAX_ERROR_BODY_LEN: usize = 256;

/// Regex pattern for JWT tokens (header.payload.signature).
static JWT_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]*)?").ok()
});

/// Regex pattern for Bearer credentials in text.
static BEARER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/=-]+").ok());

/// Sanitize an error response body before it is put into an error message.
///
/// Bearer credentials are removed first so that `Bearer <JWT>` is replaced as
/// a whole, then standalone JWTs, then the result is truncated to
/// `MAX_ERROR_BODY_LEN` characters.
pub(crate) fn sanitize_error_body(body: &str) -> String {
    let mut sanitized = body.to_string();
    if let Some(pattern) = BEARER_PATTERN.as_ref() {
        sanitized = pattern.replace_all(&sanitized, "[BEARER_REDACTED]").into_owned();
    }
    if let Some(pattern) = JWT_PATTERN.as_ref() {
        sanitized = pattern.replace_all(&sanitized, "[JWT_REDACTED]").into_owned();
    }

    match sanitized.char_indices().nth(MAX_ERROR_BODY_LEN) {
        Some((cut, _)) => format!("{}...[truncated]", sanitized.get(..cut).unwrap_or_default()),
        None => sanitized,
    }
}

/// HTTP handle for the public and admin Hydra endpoints.
#[derive(Debug, Clone)]
pub struct Transport {
    http_client: reqwest::Client,
    public_url: String,
    admin_url: String,
    admin_base: Url,
}

impl Transport {
    /// Build the HTTP client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::Configuration` if the HTTP client cannot be built
    /// or the admin URL cannot carry path segments.
    pub fn new(config: &HydraConfig) -> Result<Self, HydraError> {
        let admin_base = Url::parse(&config.admin_url).map_err(|e| {
            HydraError::Configuration(format!("Invalid admin URL '{}': {e}", config.admin_url))
        })?;
        if admin_base.cannot_be_a_base() {
            return Err(HydraError::Configuration(format!(
                "Admin URL '{}' cannot carry a path",
                config.admin_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                HydraError::Configuration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http_client,
            public_url: config.public_url.clone(),
            admin_url: config.admin_url.clone(),
            admin_base,
        })
    }

    /// The underlying HTTP client for building requests.
    #[must_use]
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Absolute URL of a path on the public endpoint.
    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        format!("{}{path}", self.public_url)
    }

    /// Absolute URL of a path on the admin endpoint.
    #[must_use]
    pub fn admin_url(&self, path: &str) -> String {
        format!("{}{path}", self.admin_url)
    }

    /// Admin URL built from path segments.
    ///
    /// Each segment is percent-encoded on its own, so a `/`, `?` or `#` inside
    /// a subject or challenge stays part of that segment.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::InvalidArgument` for a `.` or `..` segment, which
    /// URL normalization would otherwise drop or resolve.
    pub fn admin_endpoint(&self, segments: &[&str]) -> Result<Url, HydraError> {
        if let Some(segment) = segments.iter().find(|s| matches!(**s, "." | "..")) {
            return Err(HydraError::InvalidArgument(format!(
                "'{segment}' is not a valid path segment"
            )));
        }

        let mut url = self.admin_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// Attach a bearer token as the `Authorization` header.
    ///
    /// The header carries the server-issued token type verbatim, e.g.
    /// `bearer <token>`.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::InvalidResponse` if the token cannot be used as a
    /// header value.
    pub fn authorize(request: RequestBuilder, token: &Token) -> Result<RequestBuilder, HydraError> {
        let mut value = HeaderValue::from_str(&token.authorization_header()).map_err(|_| {
            HydraError::InvalidResponse("access token is not a valid header value".to_string())
        })?;
        value.set_sensitive(true);
        Ok(request.header(AUTHORIZATION, value))
    }

    /// Send a request, mapping connection failures and non-success statuses
    /// to `HydraError::Transport`.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::Transport` with the status (if any) and a
    /// sanitized body.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, HydraError> {
        let response = request.send().await.map_err(|e| {
            debug!(target: "hydra.transport", error = %e, "HTTP request failed");
            HydraError::Transport {
                status: None,
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().path().to_string();
        let body = response.text().await.unwrap_or_else(|e| {
            trace!(target: "hydra.transport", error = %e, "Failed to read error response body");
            String::new()
        });

        if status.is_server_error() {
            warn!(target: "hydra.transport", status = %status, path = %url, "Hydra returned server error");
        } else {
            debug!(target: "hydra.transport", status = %status, path = %url, "Hydra rejected request");
        }
        trace!(target: "hydra.transport", body = %sanitize_error_body(&body), "Error response body");

        Err(HydraError::Transport {
            status: Some(status.as_u16()),
            message: format!("Status {status}: {}", sanitize_error_body(&body)),
        })
    }

    /// Parse a successful response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::InvalidResponse` if the body is not the expected JSON.
    pub async fn json<T: DeserializeOwned>(response: Response) -> Result<T, HydraError> {
        response.json::<T>().await.map_err(|e| {
            warn!(target: "hydra.transport", error = %e, "Failed to parse response body");
            HydraError::InvalidResponse(e.to_string())
        })
    }
}
