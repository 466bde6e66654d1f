//! Wiremock stand-in for a Hydra server
//!
//! Mounts the token and key-set endpoints the client needs before any admin
//! call, and builds clients pointed at the mock.

use crate::crypto_fixtures::TestRsaKey;
use hydra_client::challenge::{CHALLENGE_KEY_NAME, RESPONSE_KEY_NAME};
use hydra_client::secret::SecretString;
use hydra_client::{AdminApiStyle, Hydra, HydraConfig, KeyUsage};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Client id used by [`MockHydra::config`].
pub const TEST_CLIENT_ID: &str = "client";

/// Client secret used by [`MockHydra::config`].
pub const TEST_CLIENT_SECRET: &str = "secret";

/// Access token served by [`MockHydra::mount_token_endpoint`].
pub const TEST_ACCESS_TOKEN: &str = "test-access-token";

/// Mock Hydra server
pub struct MockHydra {
    server: MockServer,
}

impl MockHydra {
    /// Start an empty mock server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL of the mock
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// The underlying server, for mounting extra mocks
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Serve [`TEST_ACCESS_TOKEN`] from `POST /oauth2/token` for any scope
    pub async fn mount_token_endpoint(&self) {
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": TEST_ACCESS_TOKEN,
                "token_type": "bearer",
                "expires_in": 3600,
            })))
            .mount(&self.server)
            .await;
    }

    /// Serve `GET /keys/{name}/{usage}` with a key set containing `jwk`
    pub async fn mount_key_set(&self, name: &str, usage: KeyUsage, jwk: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/keys/{name}/{}", usage.as_str())))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [jwk] })))
            .mount(&self.server)
            .await;
    }

    /// Serve the public challenge key and the private response key
    pub async fn mount_consent_keys(&self, challenge: &TestRsaKey, response: &TestRsaKey) {
        self.mount_key_set(CHALLENGE_KEY_NAME, KeyUsage::Public, challenge.public_jwk())
            .await;
        self.mount_key_set(RESPONSE_KEY_NAME, KeyUsage::Private, response.private_jwk())
            .await;
    }

    /// Configuration pointing both URLs at the mock
    pub fn config(&self, style: AdminApiStyle) -> HydraConfig {
        HydraConfig::new(
            self.uri(),
            TEST_CLIENT_ID,
            SecretString::from(TEST_CLIENT_SECRET),
            style,
        )
    }

    /// Fully wired client using the system clock
    pub fn hydra(&self, style: AdminApiStyle) -> Hydra {
        Hydra::new(self.config(style)).expect("failed to build Hydra client")
    }

    /// Fully wired client using `clock`
    pub fn hydra_with_clock(
        &self,
        style: AdminApiStyle,
        clock: Arc<crate::ManualClock>,
    ) -> Hydra {
        Hydra::with_clock(self.config(style), clock).expect("failed to build Hydra client")
    }
}
