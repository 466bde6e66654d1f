//! Error types for the Hydra client.

use thiserror::Error;

/// Errors surfaced by every Hydra client operation.
///
/// Messages never include secrets: access tokens, client secrets and JWT
/// bodies are kept out of both `Display` and `Debug`.
#[derive(Error, Debug, Clone)]
pub enum HydraError {
    /// The HTTP call did not complete or returned a non-success status.
    #[error("Transport error: {message}")]
    Transport {
        /// HTTP status when a response was received.
        status: Option<u16>,
        /// Description of the failure (sanitized, truncated body or reqwest error).
        message: String,
    },

    /// The client-credentials grant failed.
    #[error("Token acquisition failed: {0}")]
    TokenAcquisition(String),

    /// The key-set request did not succeed.
    #[error("Key request failed: {0}")]
    KeyRequest(String),

    /// The key-set response could not be turned into key material.
    #[error("Invalid key response: {0}")]
    KeyResponse(String),

    /// The challenge token failed signature or structural verification.
    #[error("Challenge decode failed: {0}")]
    ChallengeDecode(String),

    /// The signing library rejected the response key.
    #[error("Challenge encode failed: {0}")]
    ChallengeEncode(String),

    /// A successful response carried a body that could not be parsed.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A caller-supplied value cannot be used, e.g. as a URL path segment.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl HydraError {
    /// HTTP status carried by a transport failure, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

/// Result type alias using `HydraError`
pub type Result<T> = std::result::Result<T, HydraError>;
