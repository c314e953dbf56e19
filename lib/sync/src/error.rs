//! Error types for the sync crate.
//!
//! Sync passes never fail; category failures degrade to empty sets and are
//! only logged. The errors here come from resolving secrets and applying
//! configuration updates, where a failure rejects the whole update.

use std::fmt;

/// Errors from resolving a value held in a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    /// The secret could not be fetched.
    Unavailable { name: String, reason: String },
    /// The store did not answer in time.
    Timeout { name: String },
    /// The secret has no entry under the requested key.
    MissingKey { name: String, key: String },
    /// The entry is not valid base64.
    Decode { name: String, key: String },
}

impl fmt::Display for SecretError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { name, reason } => {
                write!(f, "secret '{name}' unavailable: {reason}")
            }
            Self::Timeout { name } => write!(f, "timed out fetching secret '{name}'"),
            Self::MissingKey { name, key } => {
                write!(f, "secret '{name}' has no key '{key}'")
            }
            Self::Decode { name, key } => {
                write!(f, "secret '{name}' key '{key}' is not valid base64")
            }
        }
    }
}

impl std::error::Error for SecretError {}

/// Reasons a configuration update is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The resource body does not decode into a configuration.
    Decode { reason: String },
    UnknownMode { mode: String },
    /// The resource asks for a different mode than the process runs in.
    ModeMismatch { expected: String, found: String },
    /// A reference required by the mode is absent.
    MissingField { field: &'static str },
    /// A referenced secret could not be resolved.
    Secret { field: &'static str },
    /// The resolved encryption key is not 32 bytes.
    EncryptionKeyLength { len: usize },
    /// The signing key pair could not be loaded.
    SigningKeys,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode { reason } => write!(f, "cannot decode configuration: {reason}"),
            Self::UnknownMode { mode } => write!(f, "unknown mode: {mode}"),
            Self::ModeMismatch { expected, found } => {
                write!(f, "configuration mode {found} does not match process mode {expected}")
            }
            Self::MissingField { field } => write!(f, "configuration is missing {field}"),
            Self::Secret { field } => write!(f, "cannot resolve secret for {field}"),
            Self::EncryptionKeyLength { len } => {
                write!(f, "encryption key must be 32 bytes, got {len}")
            }
            Self::SigningKeys => write!(f, "cannot load signing keys"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_error_names_secret_and_key() {
        let err = SecretError::MissingKey {
            name: "backbone-keys".to_string(),
            key: "private.key".to_string(),
        };
        assert_eq!(err.to_string(), "secret 'backbone-keys' has no key 'private.key'");
    }

    #[test]
    fn mode_mismatch_display() {
        let err = ConfigError::ModeMismatch {
            expected: "SESSIONS".to_string(),
            found: "OIDC_BROKER".to_string(),
        };
        assert!(err.to_string().contains("OIDC_BROKER"));
        assert!(err.to_string().contains("SESSIONS"));
    }
}
