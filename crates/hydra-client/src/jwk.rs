//! JSON Web Key resolution.
//!
//! Hydra stores named key sets and serves them over the admin API at
//! `/keys/{name}/{public|private}`. [`KeyResolver`] fetches a set, picks its
//! first key and turns it into [`KeyMaterial`], which in turn produces
//! `jsonwebtoken` signing and verification keys.
//!
//! Keys are never cached: every call fetches the current set so that key
//! rotation on the server is picked up immediately.
//!
//! # Security
//!
//! - The private exponent is redacted in `Debug` output
//! - A key requested as public never carries a private exponent, even when the
//!   server returned one

use crate::error::HydraError;
use crate::token_cache::TokenCache;
use crate::transport::Transport;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// URL-safe base64 that accepts both padded and unpadded input.
///
/// JWK numbers are sent without `=` padding.
const JWK_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Which half of a key pair to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyUsage {
    /// Modulus and public exponent only.
    Public,
    /// Modulus, public exponent and private exponent.
    Private,
}

impl KeyUsage {
    /// Path segment used by the key-set endpoint.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode an unpadded URL-safe base64 string as a big-endian unsigned integer.
///
/// # Errors
///
/// Returns `HydraError::KeyResponse` if the input is not valid base64.
pub fn b64_to_int(data: &str) -> Result<BigUint, HydraError> {
    JWK_BASE64
        .decode(data)
        .map(|bytes| BigUint::from_bytes_be(&bytes))
        .map_err(|e| HydraError::KeyResponse(format!("invalid base64 integer: {e}")))
}

// =============================================================================
// Wire Types
// =============================================================================

/// A single key as served by Hydra.
///
/// `kty` and `n`/`e` are needed to build any key; `d` only for private keys.
#[derive(Clone, Deserialize)]
pub struct JsonWebKey {
    /// Key type, `RSA` for every key this client can use.
    pub kty: String,
    /// Algorithm the key is intended for.
    #[serde(default)]
    pub alg: Option<String>,
    /// Key identifier.
    #[serde(default)]
    pub kid: Option<String>,
    /// Modulus.
    #[serde(default)]
    pub n: Option<String>,
    /// Public exponent.
    #[serde(default)]
    pub e: Option<String>,
    /// Private exponent.
    #[serde(default)]
    pub d: Option<String>,
}

impl fmt::Debug for JsonWebKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonWebKey")
            .field("kty", &self.kty)
            .field("alg", &self.alg)
            .field("kid", &self.kid)
            .field("n", &self.n)
            .field("e", &self.e)
            .field("d", &self.d.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Key set response, `{"keys": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonWebKeySet {
    /// Keys in server order.
    pub keys: Vec<JsonWebKey>,
}

// =============================================================================
// Key Material
// =============================================================================

/// Decoded RSA key numbers.
///
/// Public when only the modulus and public exponent are present, private when
/// the private exponent is present too.
#[derive(Clone)]
pub struct KeyMaterial {
    key_id: Option<String>,
    algorithm: Option<String>,
    key_type: String,
    modulus: BigUint,
    public_exponent: BigUint,
    private_exponent: Option<BigUint>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .field("key_type", &self.key_type)
            .field("modulus_bits", &self.modulus.bits())
            .field("public_exponent", &self.public_exponent)
            .field(
                "private_exponent",
                &self.private_exponent.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl KeyMaterial {
    /// Build key material from a wire key for the requested usage.
    ///
    /// The private exponent is decoded only for [`KeyUsage::Private`].
    ///
    /// # Errors
    ///
    /// Returns `HydraError::KeyResponse` if `n` or `e` is missing, a number is
    /// not valid base64, or a private key lacks `d`.
    pub fn from_jwk(jwk: &JsonWebKey, usage: KeyUsage) -> Result<Self, HydraError> {
        let required = |field: &Option<String>, name: &str| {
            field
                .as_deref()
                .ok_or_else(|| HydraError::KeyResponse(format!("key is missing '{name}'")))
                .and_then(b64_to_int)
        };

        let modulus = required(&jwk.n, "n")?;
        let public_exponent = required(&jwk.e, "e")?;
        let private_exponent = match usage {
            KeyUsage::Public => None,
            KeyUsage::Private => Some(required(&jwk.d, "d")?),
        };

        Ok(Self {
            key_id: jwk.kid.clone(),
            algorithm: jwk.alg.clone(),
            key_type: jwk.kty.clone(),
            modulus,
            public_exponent,
            private_exponent,
        })
    }

    /// Key identifier, if the server sent one.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Declared algorithm, if the server sent one.
    #[must_use]
    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    /// Declared key type.
    #[must_use]
    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    /// RSA modulus `n`.
    #[must_use]
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// RSA public exponent `e`.
    #[must_use]
    pub fn public_exponent(&self) -> &BigUint {
        &self.public_exponent
    }

    /// Private when the private exponent is present.
    #[must_use]
    pub fn usage(&self) -> KeyUsage {
        if self.private_exponent.is_some() {
            KeyUsage::Private
        } else {
            KeyUsage::Public
        }
    }

    /// Verification key for RS256 signatures.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::KeyResponse` if the numbers do not form a valid
    /// RSA public key.
    pub fn decoding_key(&self) -> Result<DecodingKey, HydraError> {
        let public_key = RsaPublicKey::new(self.modulus.clone(), self.public_exponent.clone())
            .map_err(|e| HydraError::KeyResponse(format!("invalid RSA public key: {e}")))?;
        let der = public_key
            .to_pkcs1_der()
            .map_err(|e| HydraError::KeyResponse(format!("failed to encode public key: {e}")))?;
        Ok(DecodingKey::from_rsa_der(der.as_bytes()))
    }

    /// Signing key for RS256 signatures.
    ///
    /// The prime factors are recovered from `n`, `e` and `d`.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::KeyResponse` if this is a public key or the
    /// numbers do not form a valid RSA private key.
    pub fn encoding_key(&self) -> Result<EncodingKey, HydraError> {
        let private_exponent = self.private_exponent.clone().ok_or_else(|| {
            HydraError::KeyResponse("signing requires a private key".to_string())
        })?;
        let private_key = RsaPrivateKey::from_components(
            self.modulus.clone(),
            self.public_exponent.clone(),
            private_exponent,
            Vec::new(),
        )
        .map_err(|e| HydraError::KeyResponse(format!("invalid RSA private key: {e}")))?;
        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| HydraError::KeyResponse(format!("failed to encode private key: {e}")))?;
        Ok(EncodingKey::from_rsa_der(der.as_bytes()))
    }
}

// =============================================================================
// Key Resolver
// =============================================================================

/// Fetches named keys from the admin key-set endpoint.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    transport: Transport,
    tokens: Arc<TokenCache>,
    scope: Option<String>,
}

impl KeyResolver {
    /// Create a resolver that authenticates with tokens for `scope`.
    #[must_use]
    pub fn new(transport: Transport, tokens: Arc<TokenCache>, scope: Option<String>) -> Self {
        Self {
            transport,
            tokens,
            scope,
        }
    }

    /// Fetch key `name` and build its material for `usage`.
    ///
    /// # Errors
    ///
    /// - `HydraError::KeyRequest` if no token could be acquired or the request
    ///   did not succeed
    /// - `HydraError::KeyResponse` if the body is not a non-empty key set or
    ///   its first key is unusable
    /// - `HydraError::InvalidArgument` if `name` is `.` or `..`
    #[instrument(skip(self), fields(usage = %usage))]
    pub async fn get_key(&self, name: &str, usage: KeyUsage) -> Result<KeyMaterial, HydraError> {
        let token = self
            .tokens
            .get_token(self.scope.as_deref())
            .await
            .map_err(|e| HydraError::KeyRequest(e.to_string()))?;

        let url = self
            .transport
            .admin_endpoint(&["keys", name, usage.as_str()])?;
        let request = Transport::authorize(self.transport.http_client().get(url), &token)
            .map_err(|e| HydraError::KeyRequest(e.to_string()))?;

        let response = self.transport.send(request).await.map_err(|e| {
            warn!(target: "hydra.jwk", key = %name, error = %e, "Key request failed");
            HydraError::KeyRequest(e.to_string())
        })?;

        let body = response.text().await.map_err(|e| {
            warn!(target: "hydra.jwk", key = %name, error = %e, "Failed to read key response");
            HydraError::KeyRequest(e.to_string())
        })?;

        let key_set: JsonWebKeySet = serde_json::from_str(&body).map_err(|e| {
            warn!(target: "hydra.jwk", key = %name, error = %e, "Key response is not a key set");
            HydraError::KeyResponse(format!("invalid key set: {e}"))
        })?;

        let jwk = key_set.keys.first().ok_or_else(|| {
            warn!(target: "hydra.jwk", key = %name, "Key set is empty");
            HydraError::KeyResponse(format!("key set '{name}' is empty"))
        })?;

        let material = KeyMaterial::from_jwk(jwk, usage)?;

        debug!(
            target: "hydra.jwk",
            key = %name,
            kid = ?material.key_id(),
            "Key resolved"
        );

        Ok(material)
    }
}
