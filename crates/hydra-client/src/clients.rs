//! OAuth2 client registry.
//!
//! CRUD over Hydra's `/clients` admin endpoints. Every call is
//! bearer-authenticated with a default-scope token from the shared
//! [`TokenCache`].

use crate::error::HydraError;
use crate::secret::{ExposeSecret, SecretString};
use crate::token_cache::TokenCache;
use crate::transport::Transport;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const CLIENTS_PATH: &str = "/clients";

/// A registered OAuth2 client.
///
/// Unset fields are omitted on the wire. `scopes` travels as the
/// space-separated `scope` string.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct OAuthClient {
    /// Client identifier; generated by Hydra when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Owner of the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Human-readable name.
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Client secret; only returned on create.
    #[serde(
        default,
        alias = "secret",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_secret"
    )]
    pub client_secret: Option<SecretString>,
    /// Client homepage.
    #[serde(default, alias = "uri", skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,
    /// Privacy policy URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_uri: Option<String>,
    /// Terms of service URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tos_uri: Option<String>,
    /// Logo URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    /// Contact addresses for the client's owners.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<String>>,
    /// Scopes the client may request.
    #[serde(
        rename = "scope",
        default,
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "join_scopes",
        deserialize_with = "split_scopes"
    )]
    pub scopes: Vec<String>,
    /// Allowed redirect URIs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uris: Option<Vec<String>>,
    /// Allowed grant types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types: Option<Vec<String>>,
    /// Allowed response types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types: Option<Vec<String>>,
    /// Secret expiry, seconds since the epoch; 0 means never.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<i64>,
    /// URL listing redirect URIs for pairwise subjects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector_identifier_uri: Option<String>,
    /// `public` or `pairwise`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_type: Option<String>,
    /// How the client authenticates at the token endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,
    /// Signing algorithm for userinfo responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_signed_response_alg: Option<String>,
    /// Fields this type does not model, kept so updates do not drop them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .field("client_name", &self.client_name)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("scopes", &self.scopes)
            .field("grant_types", &self.grant_types)
            .field("redirect_uris", &self.redirect_uris)
            .finish_non_exhaustive()
    }
}

impl OAuthClient {
    /// Create a client description with an id and name.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_name: Some(client_name.into()),
            ..Self::default()
        }
    }
}

fn serialize_secret<S: Serializer>(
    secret: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn join_scopes<S: Serializer>(scopes: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&scopes.join(" "))
}

fn split_scopes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let scope = Option::<String>::deserialize(deserializer)?;
    Ok(scope
        .map(|s| s.split_whitespace().map(ToString::to_string).collect())
        .unwrap_or_default())
}

/// Admin client for `/clients`.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    transport: Transport,
    tokens: Arc<TokenCache>,
}

impl ClientRegistry {
    /// Create a registry sharing `transport` and `tokens`.
    #[must_use]
    pub fn new(transport: Transport, tokens: Arc<TokenCache>) -> Self {
        Self { transport, tokens }
    }

    /// Register a client; Hydra fills in generated fields such as the secret.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::Transport` if Hydra rejects the client,
    /// `HydraError::TokenAcquisition` if no admin token could be obtained and
    /// `HydraError::InvalidResponse` if the body cannot be parsed.
    #[instrument(skip_all)]
    pub async fn create(&self, client: &OAuthClient) -> Result<OAuthClient, HydraError> {
        let request = self
            .transport
            .http_client()
            .post(self.transport.admin_url(CLIENTS_PATH))
            .json(client);
        let created: OAuthClient = self.call(request).await?;

        info!(target: "hydra.clients", client_id = ?created.client_id, "Client created");
        Ok(created)
    }

    /// Fetch a client; `None` if Hydra does not know it.
    ///
    /// # Errors
    ///
    /// See [`ClientRegistry::create`]. A 404 is not an error.
    #[instrument(skip(self))]
    pub async fn get(&self, client_id: &str) -> Result<Option<OAuthClient>, HydraError> {
        let request = self.transport.http_client().get(self.client_url(client_id)?);
        match self.call(request).await {
            Ok(client) => Ok(Some(client)),
            Err(e) if e.status() == Some(404) => {
                debug!(target: "hydra.clients", "Client not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Replace the stored description of `client_id`.
    ///
    /// # Errors
    ///
    /// See [`ClientRegistry::create`].
    #[instrument(skip(self, client))]
    pub async fn update(
        &self,
        client_id: &str,
        client: &OAuthClient,
    ) -> Result<OAuthClient, HydraError> {
        let request = self
            .transport
            .http_client()
            .put(self.client_url(client_id)?)
            .json(client);
        let updated = self.call(request).await?;

        info!(target: "hydra.clients", "Client updated");
        Ok(updated)
    }

    /// Delete a client.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::Transport` if Hydra rejects the call and
    /// `HydraError::TokenAcquisition` if no admin token could be obtained.
    #[instrument(skip(self))]
    pub async fn delete(&self, client_id: &str) -> Result<(), HydraError> {
        let request = self.transport.http_client().delete(self.client_url(client_id)?);
        self.send(request).await?;

        info!(target: "hydra.clients", "Client deleted");
        Ok(())
    }

    /// List every registered client.
    ///
    /// # Errors
    ///
    /// See [`ClientRegistry::create`].
    #[instrument(skip_all)]
    pub async fn list(&self) -> Result<Vec<OAuthClient>, HydraError> {
        let request = self
            .transport
            .http_client()
            .get(self.transport.admin_url(CLIENTS_PATH));
        self.call(request).await
    }

    fn client_url(&self, client_id: &str) -> Result<Url, HydraError> {
        self.transport.admin_endpoint(&["clients", client_id])
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, HydraError> {
        let token = self.tokens.get_token(None).await?;
        self.transport
            .send(Transport::authorize(request, &token)?)
            .await
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, HydraError> {
        let response = self.send(request).await?;
        Transport::json(response).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{AdminApiStyle, HydraConfig};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_hydra() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "admin-token",
                "token_type": "bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;
        server
    }

    fn registry(base_url: &str) -> ClientRegistry {
        let config = HydraConfig::new(
            base_url,
            "client",
            SecretString::from("secret"),
            AdminApiStyle::PathSegment,
        );
        let transport = Transport::new(&config).unwrap();
        let tokens = Arc::new(TokenCache::with_transport(
            &config,
            transport.clone(),
            Arc::new(ManualClock::starting_now()),
        ));
        ClientRegistry::new(transport, tokens)
    }

    fn stored_client() -> serde_json::Value {
        serde_json::json!({
            "client_id": "app",
            "client_name": "My App",
            "client_secret": "generated-secret",
            "scope": "openid offline",
            "grant_types": ["authorization_code", "refresh_token"],
            "redirect_uris": ["https://app.example.com/cb"],
            "public": false
        })
    }

    // =========================================================================
    // Serialization Tests
    // =========================================================================

    #[test]
    fn test_serialize_omits_unset_fields_and_joins_scopes() {
        let client = OAuthClient {
            scopes: vec!["openid".to_string(), "offline".to_string()],
            client_secret: Some(SecretString::from("s3cret")),
            ..OAuthClient::new("app", "My App")
        };

        let value = serde_json::to_value(&client).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "client_id": "app",
                "client_name": "My App",
                "client_secret": "s3cret",
                "scope": "openid offline"
            })
        );
    }

    #[test]
    fn test_deserialize_splits_scopes_and_accepts_short_names() {
        let client: OAuthClient = serde_json::from_value(serde_json::json!({
            "id": "ignored-unknown",
            "name": "Legacy",
            "secret": "legacy-secret",
            "uri": "https://legacy.example.com",
            "scope": "  core  hydra "
        }))
        .unwrap();

        assert_eq!(client.client_name.as_deref(), Some("Legacy"));
        assert_eq!(
            client.client_secret.as_ref().map(ExposeSecret::expose_secret),
            Some("legacy-secret")
        );
        assert_eq!(client.client_uri.as_deref(), Some("https://legacy.example.com"));
        assert_eq!(client.scopes, vec!["core", "hydra"]);
        assert!(client.extra.contains_key("id"));
    }

    #[test]
    fn test_deserialize_null_scope() {
        let client: OAuthClient =
            serde_json::from_value(serde_json::json!({"client_id": "app", "scope": null})).unwrap();
        assert!(client.scopes.is_empty());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let client = OAuthClient {
            client_secret: Some(SecretString::from("s3cret")),
            ..OAuthClient::new("app", "My App")
        };
        let debug_str = format!("{client:?}");

        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("s3cret"));
    }

    // =========================================================================
    // Registry Tests
    // =========================================================================

    #[tokio::test]
    async fn test_create_client() {
        let server = mock_hydra().await;

        Mock::given(method("POST"))
            .and(path("/clients"))
            .and(header("authorization", "bearer admin-token"))
            .and(body_json(serde_json::json!({
                "client_id": "app",
                "client_name": "My App",
                "scope": "openid offline"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(stored_client()))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuthClient {
            scopes: vec!["openid".to_string(), "offline".to_string()],
            ..OAuthClient::new("app", "My App")
        };
        let created = registry(&server.uri()).create(&client).await.unwrap();

        assert_eq!(created.client_id.as_deref(), Some("app"));
        assert!(created.client_secret.is_some());
        assert_eq!(created.extra.get("public"), Some(&Value::Bool(false)));
    }

    #[tokio::test]
    async fn test_get_client_found_and_missing() {
        let server = mock_hydra().await;

        Mock::given(method("GET"))
            .and(path("/clients/app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored_client()))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/clients/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let registry = registry(&server.uri());

        let found = registry.get("app").await.unwrap().unwrap();
        assert_eq!(found.scopes, vec!["openid", "offline"]);
        assert!(registry.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_client_server_error_is_not_none() {
        let server = mock_hydra().await;

        Mock::given(method("GET"))
            .and(path("/clients/app"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = registry(&server.uri()).get("app").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_update_delete_and_list() {
        let server = mock_hydra().await;

        Mock::given(method("PUT"))
            .and(path("/clients/app"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stored_client()))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/clients/app"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/clients"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([stored_client()])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry(&server.uri());

        let updated = registry
            .update("app", &OAuthClient::new("app", "Renamed"))
            .await
            .unwrap();
        assert_eq!(updated.client_name.as_deref(), Some("My App"));

        registry.delete("app").await.unwrap();

        let all = registry.list().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_client_id_is_encoded_as_one_segment() {
        let server = mock_hydra().await;

        Mock::given(method("DELETE"))
            .and(path("/clients/app%23x"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/clients/app"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/clients/..%2Fkeys%2Fhydra.consent.response%2Fprivate"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry(&server.uri());
        registry.delete("app#x").await.unwrap();

        let found = registry
            .get("../keys/hydra.consent.response/private")
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
