//! # Hydra Test Utilities
//!
//! Shared test utilities for the Hydra client.
//!
//! This crate provides:
//! - RSA crypto fixtures (the RFC 7517 example key plus a generated second key)
//! - Challenge builders that sign consent challenges like Hydra does
//! - A wiremock-backed Hydra stand-in with the token and key-set endpoints
//! - A manually driven clock
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hydra_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let hydra = MockHydra::start().await;
//!     hydra.mount_token_endpoint().await;
//!     hydra.mount_consent_keys(rfc7517_key(), rfc7517_key()).await;
//!
//!     let challenge = TestChallengeBuilder::new()
//!         .with_jti("abc")
//!         .sign(rfc7517_key())
//!         .unwrap();
//! }
//! ```

pub mod challenge_builders;
pub mod crypto_fixtures;
pub mod mock_hydra;

// Re-export commonly used items
pub use challenge_builders::*;
pub use crypto_fixtures::*;
pub use hydra_client::clock::ManualClock;
pub use mock_hydra::*;
