//! RSA fixtures for testing
//!
//! Two unrelated 2048-bit keys:
//! - [`rfc7517_key`]: the example key from RFC 7517 Appendix A.2, fixed
//! - [`other_key`]: generated once per test process, used wherever a token
//!   must be signed by "some other key"

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::EncodingKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use serde_json::{json, Value};
use std::sync::OnceLock;
use thiserror::Error;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// An RSA key pair with its JWK representation.
#[derive(Debug, Clone)]
pub struct TestRsaKey {
    kid: String,
    n: String,
    e: String,
    d: String,
}

impl TestRsaKey {
    fn from_private_key(kid: &str, key: &RsaPrivateKey) -> Self {
        let encode = |value: &BigUint| URL_SAFE_NO_PAD.encode(value.to_bytes_be());
        Self {
            kid: kid.to_string(),
            n: encode(key.n()),
            e: encode(key.e()),
            d: encode(key.d()),
        }
    }

    /// Key identifier placed in the JWK.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Public JWK (`kty`, `alg`, `kid`, `n`, `e`).
    pub fn public_jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "kid": self.kid,
            "n": self.n,
            "e": self.e,
        })
    }

    /// Private JWK: the public JWK plus `d`.
    pub fn private_jwk(&self) -> Value {
        let mut jwk = self.public_jwk();
        if let Some(fields) = jwk.as_object_mut() {
            fields.insert("d".to_string(), json!(self.d));
        }
        jwk
    }

    /// Signing key for `jsonwebtoken`.
    pub fn encoding_key(&self) -> Result<EncodingKey, FixtureError> {
        let decode = |value: &str| {
            URL_SAFE_NO_PAD
                .decode(value)
                .map(|bytes| BigUint::from_bytes_be(&bytes))
                .map_err(|e| FixtureError::Crypto(format!("invalid fixture number: {e}")))
        };
        let key = RsaPrivateKey::from_components(
            decode(&self.n)?,
            decode(&self.e)?,
            decode(&self.d)?,
            Vec::new(),
        )
        .map_err(|e| FixtureError::Crypto(format!("invalid fixture key: {e}")))?;
        let der = key
            .to_pkcs1_der()
            .map_err(|e| FixtureError::Crypto(format!("failed to encode fixture key: {e}")))?;
        Ok(EncodingKey::from_rsa_der(der.as_bytes()))
    }
}

/// The RSA example key from RFC 7517 Appendix A.2 (`kid` "2011-04-29").
pub fn rfc7517_key() -> &'static TestRsaKey {
    static KEY: OnceLock<TestRsaKey> = OnceLock::new();
    KEY.get_or_init(|| TestRsaKey {
        kid: "2011-04-29".to_string(),
        n: "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw".to_string(),
        e: "AQAB".to_string(),
        d: "X4cTteJY_gn4FYPsXB8rdXix5vwsg1FLN5E3EaG6RJoVH-HLLKD9M7dx5oo7GURknchnrRweUkC7hT5fJLM0WbFAKNLWY2vv7B6NqXSzUvxT0_YSfqijwp3RTzlBaCxWp4doFk5N2o8Gy_nHNKroADIkJ46pRUohsXywbReAdYaMwFs9tv8d_cPVY3i07a3t8MN6TNwm0dSawm9v47UiCl3Sk5ZiG7xojPLu4sbg1U2jx4IBTNBznbJSzFHK66jT8bgkuqsk0GjskDJk19Z4qwjwbsnn4j2WBii3RL-Us2lGVkY8fkFzme1z0HbIkfz0Y6mqnOYtqc0X4jfcKoAC8Q".to_string(),
    })
}

/// A second 2048-bit key, generated on first use and shared by the process.
pub fn other_key() -> &'static TestRsaKey {
    static KEY: OnceLock<TestRsaKey> = OnceLock::new();
    KEY.get_or_init(|| {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048)
            .expect("failed to generate test RSA key");
        TestRsaKey::from_private_key("generated-test-key", &key)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc_key_jwk_shape() {
        let key = rfc7517_key();

        assert_eq!(key.public_jwk()["kid"], "2011-04-29");
        assert_eq!(key.public_jwk()["e"], "AQAB");
        assert!(key.public_jwk().get("d").is_none());
        assert!(key.private_jwk()["d"].as_str().is_some());
    }

    #[test]
    fn test_keys_produce_encoding_keys() {
        assert!(rfc7517_key().encoding_key().is_ok());
        assert!(other_key().encoding_key().is_ok());
    }

    #[test]
    fn test_keys_are_distinct() {
        assert_ne!(rfc7517_key().public_jwk()["n"], other_key().public_jwk()["n"]);
        assert_eq!(other_key().public_jwk()["e"], "AQAB");
    }
}
