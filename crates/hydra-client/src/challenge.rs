//! Consent challenge decoding and response encoding.
//!
//! Hydra hands the relying application a signed challenge JWT; the
//! application verifies it with the `hydra.consent.challenge` public key,
//! collects the user's decision and answers with a response JWT signed by
//! the `hydra.consent.response` private key. The two keys belong to different
//! signing contexts and are not a pair.
//!
//! # Security
//!
//! - Challenges larger than [`MAX_JWT_SIZE_BYTES`] are rejected before any
//!   key fetch or parsing
//! - Only RS256 is accepted
//! - `exp` and `nbf` are checked against the injected clock with no leeway
//!   when present; a challenge without `exp` does not expire. The audience is
//!   not checked: it names the relying client itself and is asserted by the
//!   challenge, not enforced here
//! - Decode errors carry no token content

use crate::clock::Clock;
use crate::error::HydraError;
use crate::jwk::{KeyResolver, KeyUsage};
use jsonwebtoken::{Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Key set used to verify inbound challenges.
pub const CHALLENGE_KEY_NAME: &str = "hydra.consent.challenge";

/// Key set used to sign outbound responses.
pub const RESPONSE_KEY_NAME: &str = "hydra.consent.response";

/// Lifetime of a signed response, in seconds.
pub const RESPONSE_VALIDITY_SECS: i64 = 600;

/// Maximum accepted challenge size (8KB).
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// The `aud` claim, which JWTs allow as a single string or an array.
///
/// The form is kept as received so a response echoes it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "client"`
    Single(String),
    /// `"aud": ["client", ...]`
    Multiple(Vec<String>),
}

impl Audience {
    /// Whether `client` is one of the audiences.
    #[must_use]
    pub fn contains(&self, client: &str) -> bool {
        match self {
            Self::Single(aud) => aud == client,
            Self::Multiple(auds) => auds.iter().any(|aud| aud == client),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Single(aud) => Value::from(aud.as_str()),
            Self::Multiple(auds) => Value::from(auds.clone()),
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(aud) => f.write_str(aud),
            Self::Multiple(auds) => f.write_str(&auds.join(" ")),
        }
    }
}

impl PartialEq<str> for Audience {
    fn eq(&self, other: &str) -> bool {
        matches!(self, Self::Single(aud) if aud == other)
    }
}

impl PartialEq<&str> for Audience {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl From<&str> for Audience {
    fn from(aud: &str) -> Self {
        Self::Single(aud.to_string())
    }
}

impl From<String> for Audience {
    fn from(aud: String) -> Self {
        Self::Single(aud)
    }
}

impl From<Vec<String>> for Audience {
    fn from(auds: Vec<String>) -> Self {
        Self::Multiple(auds)
    }
}

/// Claims of a verified consent challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    /// Unique challenge identifier.
    pub jti: String,
    /// Client the challenge was issued for.
    pub aud: Audience,
    /// Requested scopes, in server order.
    pub scp: Vec<String>,
    /// Every other claim in the payload (`exp`, `iat`, `redir`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Challenge {
    /// Create a challenge with no additional claims.
    #[must_use]
    pub fn new(jti: impl Into<String>, aud: impl Into<Audience>, scp: Vec<String>) -> Self {
        Self {
            jti: jti.into(),
            aud: aud.into(),
            scp,
            extra: Map::new(),
        }
    }

    /// Look up an additional claim.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// Verifies challenges and signs responses with keys resolved per call.
#[derive(Debug, Clone)]
pub struct ChallengeCodec {
    keys: KeyResolver,
    clock: Arc<dyn Clock>,
}

impl ChallengeCodec {
    /// Create a codec resolving keys through `keys` and reading time from `clock`.
    #[must_use]
    pub fn new(keys: KeyResolver, clock: Arc<dyn Clock>) -> Self {
        Self { keys, clock }
    }

    /// Verify a challenge token and return its claims.
    ///
    /// # Errors
    ///
    /// - `HydraError::ChallengeDecode` if the token is oversized, malformed,
    ///   expired or signed by another key
    /// - `HydraError::KeyRequest` / `HydraError::KeyResponse` if the
    ///   verification key cannot be resolved
    #[instrument(skip_all)]
    pub async fn decode(&self, token: &str) -> Result<Challenge, HydraError> {
        if token.len() > MAX_JWT_SIZE_BYTES {
            warn!(
                target: "hydra.challenge",
                token_size = token.len(),
                max_size = MAX_JWT_SIZE_BYTES,
                "Challenge rejected: size exceeds maximum"
            );
            return Err(HydraError::ChallengeDecode(
                "challenge exceeds maximum size".to_string(),
            ));
        }

        let key = self
            .keys
            .get_key(CHALLENGE_KEY_NAME, KeyUsage::Public)
            .await?;
        let decoding_key = key.decoding_key()?;

        // Time claims are checked below against the injected clock
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<Challenge>(token, &decoding_key, &validation).map_err(
            |e| {
                debug!(target: "hydra.challenge", error = %e, "Challenge verification failed");
                HydraError::ChallengeDecode(e.to_string())
            },
        )?;
        self.check_time_claims(&data.claims)?;

        debug!(target: "hydra.challenge", jti = %data.claims.jti, "Challenge verified");
        Ok(data.claims)
    }

    /// Valid while `nbf <= now <= exp`; absent claims are not checked.
    fn check_time_claims(&self, challenge: &Challenge) -> Result<(), HydraError> {
        let now = self.clock.now().timestamp();

        if let Some(exp) = time_claim(challenge, "exp")? {
            if now > exp {
                debug!(target: "hydra.challenge", exp, now, "Challenge expired");
                return Err(HydraError::ChallengeDecode(
                    "challenge has expired".to_string(),
                ));
            }
        }

        if let Some(nbf) = time_claim(challenge, "nbf")? {
            if now < nbf {
                debug!(target: "hydra.challenge", nbf, now, "Challenge not yet valid");
                return Err(HydraError::ChallengeDecode(
                    "challenge is not yet valid".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Sign a response to `challenge` on behalf of `subject`.
    ///
    /// The response carries `sub`, `iat`, `exp` (`iat` plus
    /// [`RESPONSE_VALIDITY_SECS`]) and the challenge's `jti`, `aud` and `scp`.
    /// `extra` is merged last, so its entries replace any of those claims.
    ///
    /// # Errors
    ///
    /// - `HydraError::KeyRequest` / `HydraError::KeyResponse` if the signing
    ///   key cannot be resolved
    /// - `HydraError::ChallengeEncode` if the signing library rejects the key
    #[instrument(skip_all, fields(jti = %challenge.jti))]
    pub async fn encode(
        &self,
        challenge: &Challenge,
        subject: &str,
        extra: Map<String, Value>,
    ) -> Result<String, HydraError> {
        let key = self
            .keys
            .get_key(RESPONSE_KEY_NAME, KeyUsage::Private)
            .await?;
        let encoding_key = key.encoding_key()?;

        let iat = self.clock.now().timestamp();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), Value::from(subject));
        claims.insert("exp".to_string(), Value::from(iat + RESPONSE_VALIDITY_SECS));
        claims.insert("iat".to_string(), Value::from(iat));
        claims.insert("jti".to_string(), Value::from(challenge.jti.as_str()));
        claims.insert("aud".to_string(), challenge.aud.to_value());
        claims.insert("scp".to_string(), Value::from(challenge.scp.clone()));
        claims.extend(extra);

        let mut header = Header::new(Algorithm::RS256);
        header.kid = key.key_id().map(ToString::to_string);

        let token = jsonwebtoken::encode(&header, &claims, &encoding_key).map_err(|e| {
            warn!(target: "hydra.challenge", error = %e, "Failed to sign challenge response");
            HydraError::ChallengeEncode(e.to_string())
        })?;

        debug!(target: "hydra.challenge", "Challenge response signed");
        Ok(token)
    }
}

/// NumericDate claim in whole seconds; fractional values are truncated.
#[allow(clippy::cast_possible_truncation)]
fn time_claim(challenge: &Challenge, name: &str) -> Result<Option<i64>, HydraError> {
    challenge
        .claim(name)
        .map(|value| {
            value
                .as_i64()
                .or_else(|| value.as_f64().map(|secs| secs as i64))
                .ok_or_else(|| HydraError::ChallengeDecode(format!("'{name}' is not a number")))
        })
        .transpose()
}
