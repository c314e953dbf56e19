//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `SessionError`: session cookie validation failures
//! - `StateError`: OIDC state encryption failures
//! - `KeyError`: signing key parsing and token signing failures
//! - `ProviderError`: identity provider exchange and verification failures
//! - `BrokerError`: OIDC broker protocol failures, one per client-facing outcome
//! - `LookupError`: identity lookups against the RBAC snapshot

use std::fmt;

/// Errors from validating a session carried in a cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No session token was presented.
    NotLoggedIn,
    /// The session's expiry is in the past.
    Expired,
    /// The session is present but its contents are unusable.
    CannotExtract { reason: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLoggedIn => write!(f, "user not logged in"),
            Self::Expired => write!(f, "session expired"),
            Self::CannotExtract { reason } => {
                write!(f, "cannot extract info from session: {reason}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Errors from encrypting or decrypting OIDC state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The key is not exactly 32 bytes.
    InvalidKeyLength { len: usize },
    /// The ciphertext is not valid base64url or too short to hold a nonce.
    Malformed,
    /// The cipher refused to encrypt.
    Encrypt,
    /// Authentication of the ciphertext failed.
    Decrypt,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyLength { len } => {
                write!(f, "state key must be 32 bytes, got {len}")
            }
            Self::Malformed => write!(f, "encrypted state is malformed"),
            Self::Encrypt => write!(f, "failed to encrypt state"),
            Self::Decrypt => write!(f, "failed to decrypt state"),
        }
    }
}

impl std::error::Error for StateError {}

/// Errors from loading signing keys or signing tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    InvalidPrivateKey { reason: String },
    InvalidPublicKey { reason: String },
    /// The public key does not belong to the private key.
    Mismatch,
    Sign { reason: String },
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPrivateKey { reason } => {
                write!(f, "invalid signing private key: {reason}")
            }
            Self::InvalidPublicKey { reason } => {
                write!(f, "invalid signing public key: {reason}")
            }
            Self::Mismatch => write!(f, "signing public key does not match private key"),
            Self::Sign { reason } => write!(f, "failed to sign token: {reason}"),
        }
    }
}

impl std::error::Error for KeyError {}

/// Errors reported by an identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider metadata could not be discovered.
    Discovery { provider: String, reason: String },
    /// The authorization code could not be exchanged.
    TokenExchange { provider: String, reason: String },
    /// The token response carried no ID token.
    IdTokenMissing { provider: String },
    /// The ID token signature or claims did not verify.
    VerifyToken { provider: String, reason: String },
    /// A required identity claim is absent.
    ExtractClaims { provider: String, claim: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovery { provider, reason } => {
                write!(f, "OIDC provider '{provider}' discovery failed: {reason}")
            }
            Self::TokenExchange { provider, reason } => {
                write!(f, "OIDC provider '{provider}' token exchange failed: {reason}")
            }
            Self::IdTokenMissing { provider } => {
                write!(f, "OIDC provider '{provider}' returned no ID token")
            }
            Self::VerifyToken { provider, reason } => {
                write!(f, "ID token from '{provider}' failed verification: {reason}")
            }
            Self::ExtractClaims { provider, claim } => {
                write!(f, "ID token from '{provider}' is missing claim: {claim}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Failures of the OIDC broker protocol.
///
/// Each variant corresponds to exactly one client-facing error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    ProviderNotFound { provider: String },
    ProviderUnavailable { provider: String },
    EncryptState,
    DecryptState,
    ExtractStateFromCookie,
    StateMismatch,
    TokenExchange,
    IdTokenMissing,
    VerifyToken,
    ExtractClaims,
    TokenSign,
    UserRoles { email: String },
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderNotFound { provider } => write!(f, "provider not found: {provider}"),
            Self::ProviderUnavailable { provider } => {
                write!(f, "identity provider unavailable: {provider}")
            }
            Self::EncryptState => write!(f, "cannot encrypt state"),
            Self::DecryptState => write!(f, "cannot decrypt state"),
            Self::ExtractStateFromCookie => write!(f, "cannot extract state from cookie"),
            Self::StateMismatch => {
                write!(f, "state from cookie not equal to state from query param")
            }
            Self::TokenExchange => write!(f, "failed to exchange token"),
            Self::IdTokenMissing => write!(f, "failed to extract ID token from response"),
            Self::VerifyToken => write!(f, "failed to verify ID token"),
            Self::ExtractClaims => write!(f, "failed to extract claims from token"),
            Self::TokenSign => write!(f, "failed to sign new Backbone ID token"),
            Self::UserRoles { email } => write!(f, "failed to get mapped user roles for {email}"),
        }
    }
}

impl std::error::Error for BrokerError {}

impl From<&ProviderError> for BrokerError {
    fn from(error: &ProviderError) -> Self {
        match error {
            ProviderError::Discovery { provider, .. } => Self::ProviderUnavailable {
                provider: provider.clone(),
            },
            ProviderError::TokenExchange { .. } => Self::TokenExchange,
            ProviderError::IdTokenMissing { .. } => Self::IdTokenMissing,
            ProviderError::VerifyToken { .. } => Self::VerifyToken,
            ProviderError::ExtractClaims { .. } => Self::ExtractClaims,
        }
    }
}

/// Errors from identity lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    NotFound { email: String },
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { email } => write!(f, "user not found: {email}"),
        }
    }
}

impl std::error::Error for LookupError {}
