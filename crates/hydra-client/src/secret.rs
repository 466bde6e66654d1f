//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. The client secret
//! and every access token handled by this crate are held as [`SecretString`],
//! whose `Debug` output is redacted and whose memory is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use hydra_client::secret::{ExposeSecret, SecretString};
//!
//! let secret = SecretString::from("hunter2");
//! assert!(!format!("{secret:?}").contains("hunter2"));
//! assert_eq!(secret.expose_secret(), "hunter2");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("hunter2");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_deserialize_credentials() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct Credentials {
            client_id: String,
            client_secret: SecretString,
        }

        let json = r#"{"client_id": "consent-app", "client_secret": "my-secret-value"}"#;
        let creds: Credentials = serde_json::from_str(json).expect("deserialize");

        assert_eq!(creds.client_secret.expose_secret(), "my-secret-value");

        let debug = format!("{creds:?}");
        assert!(!debug.contains("my-secret-value"));
        assert!(debug.contains("consent-app"));
    }
}
