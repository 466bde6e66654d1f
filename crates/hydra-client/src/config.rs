//! Hydra client configuration.
//!
//! Configuration is built programmatically or loaded from environment
//! variables. The client secret is redacted in Debug output.

use crate::error::HydraError;
use crate::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout for the HTTP client.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Scope requested for the bearer token used on the key-set endpoint.
pub const DEFAULT_KEYS_SCOPE: &str = "hydra.keys.get";

/// Shape of the admin login/consent endpoints.
///
/// Hydra moved the challenge from a path segment to a query parameter between
/// protocol versions. There is no default: the target server decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminApiStyle {
    /// `/oauth2/auth/requests/{login|consent}/{challenge}[/accept|/reject]`
    PathSegment,
    /// `/oauth2/auth/requests/{login|consent}[/accept|/reject]?{kind}_challenge=...`
    QueryParameter,
}

impl FromStr for AdminApiStyle {
    type Err = HydraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" | "path_segment" => Ok(Self::PathSegment),
            "query" | "query_parameter" => Ok(Self::QueryParameter),
            other => Err(HydraError::Configuration(format!(
                "HYDRA_ADMIN_API_STYLE must be 'path' or 'query', got '{other}'"
            ))),
        }
    }
}

/// Configuration shared by every Hydra component.
#[derive(Clone)]
pub struct HydraConfig {
    /// Public endpoint URL (token endpoint, e.g. `https://hydra.example.com`).
    pub public_url: String,

    /// Admin endpoint URL (keys, consent flow, clients). Same as
    /// `public_url` for single-port deployments.
    pub admin_url: String,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: SecretString,

    /// Admin endpoint shape of the target server.
    pub admin_api_style: AdminApiStyle,

    /// HTTP request timeout.
    pub http_timeout: Duration,

    /// Scope requested for key-set calls; `None` requests the default scope.
    pub keys_scope: Option<String>,
}

impl fmt::Debug for HydraConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HydraConfig")
            .field("public_url", &self.public_url)
            .field("admin_url", &self.admin_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("admin_api_style", &self.admin_api_style)
            .field("http_timeout", &self.http_timeout)
            .field("keys_scope", &self.keys_scope)
            .finish()
    }
}

impl HydraConfig {
    /// Create a configuration with default timeouts and a shared
    /// public/admin URL.
    ///
    /// # Security Warning
    ///
    /// Plain HTTP sends the client secret in clear text. Use
    /// [`HydraConfig::new_secure`] to enforce HTTPS.
    #[must_use]
    pub fn new(
        public_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
        admin_api_style: AdminApiStyle,
    ) -> Self {
        let public_url = trim_url(public_url.into());
        Self {
            admin_url: public_url.clone(),
            public_url,
            client_id: client_id.into(),
            client_secret,
            admin_api_style,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            keys_scope: Some(DEFAULT_KEYS_SCOPE.to_string()),
        }
    }

    /// Create a configuration requiring HTTPS.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::Configuration` if the URL doesn't use HTTPS.
    pub fn new_secure(
        public_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
        admin_api_style: AdminApiStyle,
    ) -> Result<Self, HydraError> {
        let config = Self::new(public_url, client_id, client_secret, admin_api_style);
        config.require_https()?;
        Ok(config)
    }

    /// Set a separate admin URL.
    #[must_use]
    pub fn with_admin_url(mut self, admin_url: impl Into<String>) -> Self {
        self.admin_url = trim_url(admin_url.into());
        self
    }

    /// Set the HTTP timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set the scope requested for key-set calls.
    #[must_use]
    pub fn with_keys_scope(mut self, scope: Option<String>) -> Self {
        self.keys_scope = scope;
        self
    }

    /// Reject configurations that would talk to Hydra over plain HTTP.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::Configuration` naming the offending URL.
    pub fn require_https(&self) -> Result<(), HydraError> {
        for (name, url) in [("public", &self.public_url), ("admin", &self.admin_url)] {
            if !url.starts_with("https://") {
                return Err(HydraError::Configuration(format!(
                    "Hydra {name} URL must use HTTPS in production"
                )));
            }
        }
        Ok(())
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`HydraConfig::from_vars`].
    pub fn from_env() -> Result<Self, HydraError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `HydraError::Configuration` if a required variable is missing
    /// or a value does not parse.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, HydraError> {
        let required = |name: &str| {
            vars.get(name)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| {
                    HydraError::Configuration(format!(
                        "Missing required environment variable: {name}"
                    ))
                })
        };

        let public_url = required("HYDRA_URL")?;
        let client_id = required("HYDRA_CLIENT_ID")?;
        let client_secret = SecretString::from(required("HYDRA_CLIENT_SECRET")?);
        let admin_api_style: AdminApiStyle = required("HYDRA_ADMIN_API_STYLE")?.parse()?;

        let mut config = Self::new(public_url, client_id, client_secret, admin_api_style);

        if let Some(admin_url) = vars.get("HYDRA_ADMIN_URL").filter(|v| !v.is_empty()) {
            config = config.with_admin_url(admin_url.clone());
        }

        if let Some(value_str) = vars.get("HYDRA_HTTP_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                HydraError::Configuration(format!(
                    "HYDRA_HTTP_TIMEOUT_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(HydraError::Configuration(
                    "HYDRA_HTTP_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }

            config = config.with_http_timeout(Duration::from_secs(value));
        }

        if let Some(scope) = vars.get("HYDRA_KEYS_SCOPE") {
            let scope = scope.trim();
            config = config.with_keys_scope((!scope.is_empty()).then(|| scope.to_string()));
        }

        Ok(config)
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            ("HYDRA_URL".to_string(), "http://localhost:4444".to_string()),
            ("HYDRA_CLIENT_ID".to_string(), "client".to_string()),
            ("HYDRA_CLIENT_SECRET".to_string(), "secret".to_string()),
            ("HYDRA_ADMIN_API_STYLE".to_string(), "path".to_string()),
        ])
    }

    #[test]
    fn test_config_defaults() {
        let config = HydraConfig::new(
            "http://localhost:4444/",
            "client",
            SecretString::from("secret"),
            AdminApiStyle::PathSegment,
        );

        assert_eq!(config.public_url, "http://localhost:4444");
        assert_eq!(config.admin_url, "http://localhost:4444");
        assert_eq!(config.http_timeout, DEFAULT_HTTP_TIMEOUT);
        assert_eq!(config.keys_scope.as_deref(), Some(DEFAULT_KEYS_SCOPE));
    }

    #[test]
    fn test_config_builder() {
        let config = HydraConfig::new(
            "http://localhost:4444",
            "client",
            SecretString::from("secret"),
            AdminApiStyle::QueryParameter,
        )
        .with_admin_url("http://localhost:4445/")
        .with_http_timeout(Duration::from_secs(3))
        .with_keys_scope(None);

        assert_eq!(config.admin_url, "http://localhost:4445");
        assert_eq!(config.http_timeout, Duration::from_secs(3));
        assert!(config.keys_scope.is_none());
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let config = HydraConfig::new(
            "http://localhost:4444",
            "client",
            SecretString::from("super-secret-value"),
            AdminApiStyle::PathSegment,
        );

        let debug_str = format!("{config:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("super-secret-value"));
    }

    #[test]
    fn test_new_secure_requires_https() {
        let result = HydraConfig::new_secure(
            "https://hydra.example.com",
            "client",
            SecretString::from("secret"),
            AdminApiStyle::PathSegment,
        );
        assert!(result.is_ok());

        let result = HydraConfig::new_secure(
            "http://hydra.example.com",
            "client",
            SecretString::from("secret"),
            AdminApiStyle::PathSegment,
        );
        assert!(matches!(result, Err(HydraError::Configuration(_))));
    }

    #[test]
    fn test_require_https_checks_admin_url() {
        let config = HydraConfig::new(
            "https://hydra.example.com",
            "client",
            SecretString::from("secret"),
            AdminApiStyle::PathSegment,
        )
        .with_admin_url("http://hydra-admin.internal:4445");

        let err = config.require_https().unwrap_err();
        assert!(err.to_string().contains("admin"));
    }

    #[test]
    fn test_admin_api_style_parsing() {
        assert_eq!("path".parse::<AdminApiStyle>().unwrap(), AdminApiStyle::PathSegment);
        assert_eq!("QUERY".parse::<AdminApiStyle>().unwrap(), AdminApiStyle::QueryParameter);
        assert!("segment".parse::<AdminApiStyle>().is_err());
    }

    #[test]
    fn test_from_vars_minimal() {
        let config = HydraConfig::from_vars(&base_vars()).unwrap();

        assert_eq!(config.public_url, "http://localhost:4444");
        assert_eq!(config.admin_url, "http://localhost:4444");
        assert_eq!(config.client_id, "client");
        assert_eq!(config.client_secret.expose_secret(), "secret");
        assert_eq!(config.admin_api_style, AdminApiStyle::PathSegment);
    }

    #[test]
    fn test_from_vars_all_overrides() {
        let mut vars = base_vars();
        vars.insert("HYDRA_ADMIN_URL".to_string(), "http://localhost:4445".to_string());
        vars.insert("HYDRA_HTTP_TIMEOUT_SECONDS".to_string(), "30".to_string());
        vars.insert("HYDRA_KEYS_SCOPE".to_string(), "keys.read".to_string());

        let config = HydraConfig::from_vars(&vars).unwrap();

        assert_eq!(config.admin_url, "http://localhost:4445");
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.keys_scope.as_deref(), Some("keys.read"));
    }

    #[test]
    fn test_from_vars_empty_keys_scope_means_none() {
        let mut vars = base_vars();
        vars.insert("HYDRA_KEYS_SCOPE".to_string(), String::new());

        let config = HydraConfig::from_vars(&vars).unwrap();
        assert!(config.keys_scope.is_none());
    }

    #[test]
    fn test_from_vars_missing_required() {
        for name in [
            "HYDRA_URL",
            "HYDRA_CLIENT_ID",
            "HYDRA_CLIENT_SECRET",
            "HYDRA_ADMIN_API_STYLE",
        ] {
            let mut vars = base_vars();
            vars.remove(name);

            let err = HydraConfig::from_vars(&vars).unwrap_err();
            assert!(err.to_string().contains(name), "{name} should be reported");
        }
    }

    #[test]
    fn test_from_vars_invalid_timeout() {
        let mut vars = base_vars();
        vars.insert("HYDRA_HTTP_TIMEOUT_SECONDS".to_string(), "soon".to_string());
        assert!(HydraConfig::from_vars(&vars).is_err());

        vars.insert("HYDRA_HTTP_TIMEOUT_SECONDS".to_string(), "0".to_string());
        assert!(HydraConfig::from_vars(&vars).is_err());
    }
}
