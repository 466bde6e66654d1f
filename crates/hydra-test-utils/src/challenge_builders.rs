//! Builder patterns for consent challenges
//!
//! Produces challenge JWTs shaped like the ones Hydra hands to a consent app.

use crate::crypto_fixtures::{FixtureError, TestRsaKey};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, Header};
use serde_json::{json, Map, Value};

/// Builder for signed consent challenges
///
/// # Example
/// ```rust,ignore
/// let challenge = TestChallengeBuilder::new()
///     .with_jti("abc")
///     .for_client("client1")
///     .with_scopes(&["core", "hydra"])
///     .sign(rfc7517_key())?;
/// ```
pub struct TestChallengeBuilder {
    jti: String,
    aud: Value,
    scp: Vec<String>,
    exp: Option<i64>,
    iat: i64,
    extra: Map<String, Value>,
}

impl TestChallengeBuilder {
    /// Create a new challenge builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            jti: "test-challenge".to_string(),
            aud: json!("test-client"),
            scp: vec!["openid".to_string()],
            exp: Some((now + Duration::seconds(600)).timestamp()),
            iat: now.timestamp(),
            extra: Map::new(),
        }
    }

    /// Set the challenge id
    pub fn with_jti(mut self, jti: &str) -> Self {
        self.jti = jti.to_string();
        self
    }

    /// Set the audience (client id)
    pub fn for_client(mut self, aud: &str) -> Self {
        self.aud = json!(aud);
        self
    }

    /// Set the audience as a JSON array of client ids
    pub fn for_clients(mut self, auds: &[&str]) -> Self {
        self.aud = json!(auds);
        self
    }

    /// Set the requested scopes
    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scp = scopes.iter().map(ToString::to_string).collect();
        self
    }

    /// Set expiration in seconds from now (negative for an expired challenge)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Omit the `exp` claim
    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }

    /// Add an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = json!({
            "jti": self.jti,
            "aud": self.aud,
            "scp": self.scp,
            "iat": self.iat,
        });
        if let Some(fields) = claims.as_object_mut() {
            if let Some(exp) = self.exp {
                fields.insert("exp".to_string(), json!(exp));
            }
            fields.extend(self.extra);
        }
        claims
    }

    /// Build and sign the claims with RS256
    pub fn sign(self, key: &TestRsaKey) -> Result<String, FixtureError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key.kid().to_string());
        jsonwebtoken::encode(&header, &self.build(), &key.encoding_key()?)
            .map_err(|e| FixtureError::Crypto(format!("failed to sign challenge: {e}")))
    }
}

impl Default for TestChallengeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
