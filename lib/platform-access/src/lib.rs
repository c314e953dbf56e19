//! Authentication and authorization primitives for backbone.
//!
//! This crate provides:
//! - Identity types (`UserRecord`, `PasswordProtectedUser`, `RoleRecord`, `RoleBinding`)
//! - The `RoleDirectory` seam the brokers resolve roles through
//! - Cookie sessions (`Session`, `SessionPayload`) and the per-request `AuthContext`
//! - The OIDC broker: state encryption, provider interface, local token
//!   signing and JWKS publication
//!
//! # Example
//!
//! ```
//! use backbone_access::{AuthContext, RoleRecord, Session};
//!
//! let admin = RoleRecord::new("admin", vec!["read".to_string(), "write".to_string()]);
//! let session = Session::issue("alice@example.com", vec![admin]);
//!
//! // What the session middleware does with the decrypted cookie.
//! let payload = session.to_payload().unwrap();
//! let context = payload.validate(chrono::Utc::now().timestamp_millis()).unwrap();
//!
//! let auth = AuthContext::from_session(&context).unwrap();
//! assert_eq!(auth.username(), "alice@example.com");
//! assert_eq!(auth.roles()["admin"], ["read", "write"]);
//! ```

pub mod auth;
pub mod broker;
pub mod error;
pub mod jwks;
pub mod keys;
pub mod provider;
pub mod role;
pub mod session;
pub mod state;
pub mod token;
pub mod user;

// Re-export main types at crate root
pub use auth::AuthContext;
pub use broker::{LoginRedirect, OidcBroker, TOKEN_AUDIENCE};
pub use error::{BrokerError, KeyError, LookupError, ProviderError, SessionError, StateError};
pub use jwks::{Jwk, Jwks};
pub use keys::SigningKeys;
pub use provider::{AuthorizationRequest, IdentityProvider, ProviderConfig, VerifiedIdentity};
pub use role::{RoleBinding, RoleDirectory, RoleRecord, RoleSnapshot};
pub use session::{SESSION_COOKIE, SESSION_TTL_HOURS, Session, SessionContext, SessionPayload};
pub use state::{decrypt_state, encrypt_state};
pub use token::{IssuedToken, LocalClaims, TOKEN_COOKIE, TOKEN_TTL_HOURS};
pub use user::{PasswordProtectedUser, UserRecord};
