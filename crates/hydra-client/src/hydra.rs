//! Facade wiring every component from one [`HydraConfig`].
//!
//! All components share one HTTP client and one [`TokenCache`], so a token
//! acquired for the registry is reused by the consent client and vice versa.
//!
//! # Example
//!
//! ```rust,ignore
//! use hydra_client::{Hydra, HydraConfig};
//!
//! let hydra = Hydra::new(HydraConfig::from_env()?)?;
//!
//! let challenge = hydra.challenges().decode(&challenge_jwt).await?;
//! let response = hydra
//!     .challenges()
//!     .encode(&challenge, "user-42", serde_json::Map::new())
//!     .await?;
//! ```

use crate::challenge::ChallengeCodec;
use crate::clients::ClientRegistry;
use crate::clock::{Clock, SystemClock};
use crate::config::HydraConfig;
use crate::consent::ConsentFlowClient;
use crate::error::HydraError;
use crate::jwk::KeyResolver;
use crate::token_cache::TokenCache;
use crate::transport::Transport;
use std::sync::Arc;
use tracing::info;

/// Entry point bundling the Hydra components.
#[derive(Debug)]
pub struct Hydra {
    tokens: Arc<TokenCache>,
    keys: KeyResolver,
    challenges: ChallengeCodec,
    consent: ConsentFlowClient,
    clients: ClientRegistry,
}

impl Hydra {
    /// Build every component with the system clock.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: HydraConfig) -> Result<Self, HydraError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build every component with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns `HydraError::Configuration` if the HTTP client cannot be built.
    pub fn with_clock(config: HydraConfig, clock: Arc<dyn Clock>) -> Result<Self, HydraError> {
        let transport = Transport::new(&config)?;
        let tokens = Arc::new(TokenCache::with_transport(
            &config,
            transport.clone(),
            Arc::clone(&clock),
        ));
        let keys = KeyResolver::new(
            transport.clone(),
            Arc::clone(&tokens),
            config.keys_scope.clone(),
        );

        info!(
            target: "hydra.client",
            public_url = %config.public_url,
            admin_url = %config.admin_url,
            client_id = %config.client_id,
            admin_api_style = ?config.admin_api_style,
            "Hydra client initialized"
        );

        Ok(Self {
            challenges: ChallengeCodec::new(keys.clone(), clock),
            consent: ConsentFlowClient::new(&config, transport.clone(), Arc::clone(&tokens)),
            clients: ClientRegistry::new(transport, Arc::clone(&tokens)),
            keys,
            tokens,
        })
    }

    /// Shared token cache.
    #[must_use]
    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Key-set resolver.
    #[must_use]
    pub fn keys(&self) -> &KeyResolver {
        &self.keys
    }

    /// Challenge decoder and response signer.
    #[must_use]
    pub fn challenges(&self) -> &ChallengeCodec {
        &self.challenges
    }

    /// Login/consent flow client.
    #[must_use]
    pub fn consent(&self) -> &ConsentFlowClient {
        &self.consent
    }

    /// OAuth2 client registry.
    #[must_use]
    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }
}
