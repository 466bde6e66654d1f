//! Client for the ORY Hydra OAuth2/OpenID authorization server.
//!
//! Covers the consumer side of Hydra:
//! - client-credentials token acquisition with a per-scope cache
//! - JSON Web Key resolution into RSA signing/verification keys
//! - consent challenge decoding and response encoding
//! - the login/consent admin API, token introspection and client registry

#![warn(clippy::pedantic)]

/// Module for the crate-wide error type
pub mod error;

/// Module for client configuration
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for the injectable time source
pub mod clock;

/// Module for the HTTP transport shared by all components
pub mod transport;

/// Module for OAuth 2.0 client-credentials tokens and their cache
pub mod token_cache;

/// Module for JSON Web Keys and the key resolver
pub mod jwk;

/// Module for consent challenge decoding and response encoding
pub mod challenge;

/// Module for the login/consent admin API
pub mod consent;

/// Module for the OAuth2 client registry
pub mod clients;

/// Module for the facade wiring every component from one configuration
pub mod hydra;

pub use challenge::{Audience, Challenge, ChallengeCodec};
pub use clients::{ClientRegistry, OAuthClient};
pub use clock::{Clock, SystemClock};
pub use config::{AdminApiStyle, HydraConfig};
pub use consent::ConsentFlowClient;
pub use error::{HydraError, Result};
pub use hydra::Hydra;
pub use jwk::{KeyMaterial, KeyResolver, KeyUsage};
pub use token_cache::{Token, TokenCache};
